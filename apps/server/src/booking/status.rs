//! Closed status sets for bookings and disputes, and the tables of legal
//! transitions between them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Confirmed, Completed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }

    /// Validates `self -> next` against the table.
    pub fn transition(self, next: BookingStatus) -> Result<BookingStatus, AppError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::InvalidTransition(format!(
                "booking cannot go from {} to {}",
                self, next
            )))
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    /// A refund dispute can only be raised once the agency has accepted the booking.
    pub fn is_disputable(self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Completed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    AgencyResponded,
    Resolved,
}

impl DisputeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::AgencyResponded => "agency_responded",
            DisputeStatus::Resolved => "resolved",
        }
    }

    pub fn can_transition_to(self, next: DisputeStatus) -> bool {
        use DisputeStatus::*;
        matches!(
            (self, next),
            (Open, AgencyResponded) | (Open, Resolved) | (AgencyResponded, Resolved)
        )
    }

    pub fn transition(self, next: DisputeStatus) -> Result<DisputeStatus, AppError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::InvalidTransition(format!(
                "dispute cannot go from {} to {}",
                self, next
            )))
        }
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingStatus::*;

    const ALL: [BookingStatus; 4] = [Pending, Confirmed, Cancelled, Completed];

    #[test]
    fn test_booking_edges() {
        let legal = [
            (Pending, Confirmed),
            (Confirmed, Completed),
            (Pending, Cancelled),
            (Confirmed, Cancelled),
        ];
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in [Cancelled, Completed] {
            assert!(from.is_terminal());
            assert!(ALL.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn test_confirm_cancelled_is_rejected() {
        let err = Cancelled.transition(Confirmed).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert_eq!(
            err.to_string(),
            "invalid transition: booking cannot go from cancelled to confirmed"
        );
    }

    #[test]
    fn test_disputable() {
        assert!(!Pending.is_disputable());
        assert!(Confirmed.is_disputable());
        assert!(Completed.is_disputable());
        assert!(!Cancelled.is_disputable());
    }

    #[test]
    fn test_dispute_edges() {
        use DisputeStatus::*;
        assert!(Open.can_transition_to(AgencyResponded));
        assert!(Open.can_transition_to(Resolved));
        assert!(AgencyResponded.can_transition_to(Resolved));
        assert!(!AgencyResponded.can_transition_to(AgencyResponded));
        assert!(!Resolved.can_transition_to(Resolved));
        assert!(!Resolved.can_transition_to(Open));
        assert!(Resolved.transition(Resolved).is_err());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&DisputeStatus::AgencyResponded).unwrap(),
            "\"agency_responded\""
        );
        assert_eq!(serde_json::to_string(&Pending).unwrap(), "\"pending\"");
    }
}
