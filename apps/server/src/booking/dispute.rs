//! Refund disputes: opened by the booking's customer, answered once by the
//! owning agency, closed by an admin verdict. The verdict is advisory; no
//! payment is reversed here.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::access::{self, Relation};
use super::lifecycle;
use super::status::{BookingStatus, DisputeStatus};
use crate::{
    auth::Actor,
    error::AppError,
    models::{OpenDisputeRequest, RefundDispute, Role},
};

const DISPUTE_SELECT: &str =
    "SELECT id, booking_id, payment_id, opened_by, status, reason, customer_explanation,
            agency_response, admin_verdict, opened_at, resolved_at, resolved_by
     FROM refund_disputes";

async fn find_dispute(db: &SqlitePool, id: i64) -> Result<RefundDispute, AppError> {
    sqlx::query_as::<_, RefundDispute>(&format!("{} WHERE id = ?", DISPUTE_SELECT))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("refund dispute"))
}

fn non_empty(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

pub async fn open(
    db: &SqlitePool,
    booking_id: i64,
    actor: &Actor,
    req: &OpenDisputeRequest,
    now: DateTime<Utc>,
) -> Result<RefundDispute, AppError> {
    let booking = lifecycle::find_booking(db, booking_id).await?;
    access::authorize(
        db,
        actor,
        Relation::BookingCustomer {
            owner_id: booking.user_id,
        },
    )
    .await?;

    if !booking.status.is_disputable() {
        return Err(AppError::InvalidTransition(format!(
            "refunds can only be requested for confirmed or completed bookings (booking {} is {})",
            booking.id, booking.status
        )));
    }

    let reason = non_empty(&req.reason, "reason")?;

    if let Some(payment_id) = req.payment_id {
        let belongs: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM payments WHERE id = ? AND booking_id = ?")
                .bind(payment_id)
                .bind(booking_id)
                .fetch_one(db)
                .await?;
        if !belongs {
            return Err(AppError::NotFound("payment"));
        }
    }

    let id = insert_if_disputable(db, booking_id, actor.user_id, req, &reason, now).await?;

    tracing::info!(dispute_id = id, booking_id, user_id = actor.user_id, "refund dispute opened");
    find_dispute(db, id).await
}

/// Insert an `open` dispute only while the booking is still confirmed or
/// completed; a booking cancelled since it was read inserts nothing.
async fn insert_if_disputable(
    db: &SqlitePool,
    booking_id: i64,
    opened_by: i64,
    req: &OpenDisputeRequest,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<i64, AppError> {
    let result = sqlx::query(
        "INSERT INTO refund_disputes (booking_id, payment_id, opened_by, status, reason, customer_explanation, opened_at)
         SELECT ?, ?, ?, ?, ?, ?, ?
         WHERE EXISTS (SELECT 1 FROM bookings WHERE id = ? AND status IN (?, ?))",
    )
    .bind(booking_id)
    .bind(req.payment_id)
    .bind(opened_by)
    .bind(DisputeStatus::Open)
    .bind(reason)
    .bind(req.customer_explanation.as_deref())
    .bind(now)
    .bind(booking_id)
    .bind(BookingStatus::Confirmed)
    .bind(BookingStatus::Completed)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::InvalidTransition(format!(
            "booking {} is no longer confirmed or completed",
            booking_id
        )));
    }
    Ok(result.last_insert_rowid())
}

/// open → agency_responded. The response is written once.
pub async fn agency_respond(
    db: &SqlitePool,
    dispute_id: i64,
    actor: &Actor,
    response: &str,
) -> Result<RefundDispute, AppError> {
    let dispute = find_dispute(db, dispute_id).await?;
    let booking = lifecycle::find_booking(db, dispute.booking_id).await?;
    access::authorize(
        db,
        actor,
        Relation::ServiceAgency {
            service_id: booking.service_id,
        },
    )
    .await?;

    dispute.status.transition(DisputeStatus::AgencyResponded)?;
    let response = non_empty(response, "response")?;

    let updated = sqlx::query(
        "UPDATE refund_disputes SET status = ?, agency_response = ?
         WHERE id = ? AND status = ? AND agency_response IS NULL",
    )
    .bind(DisputeStatus::AgencyResponded)
    .bind(&response)
    .bind(dispute_id)
    .bind(DisputeStatus::Open)
    .execute(db)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::InvalidTransition(format!(
            "dispute {} was answered concurrently",
            dispute_id
        )));
    }

    tracing::info!(dispute_id, booking_id = booking.id, "agency responded to dispute");
    find_dispute(db, dispute_id).await
}

/// open | agency_responded → resolved, by an admin.
pub async fn admin_resolve(
    db: &SqlitePool,
    dispute_id: i64,
    actor: &Actor,
    verdict: &str,
    now: DateTime<Utc>,
) -> Result<RefundDispute, AppError> {
    let dispute = find_dispute(db, dispute_id).await?;
    access::authorize(db, actor, Relation::HasRole(Role::WebAdmin)).await?;
    dispute.status.transition(DisputeStatus::Resolved)?;
    let verdict = non_empty(verdict, "verdict")?;

    let updated = sqlx::query(
        "UPDATE refund_disputes SET status = ?, admin_verdict = ?, resolved_by = ?, resolved_at = ?
         WHERE id = ? AND status = ?",
    )
    .bind(DisputeStatus::Resolved)
    .bind(&verdict)
    .bind(actor.user_id)
    .bind(now)
    .bind(dispute_id)
    .bind(dispute.status)
    .execute(db)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::InvalidTransition(format!(
            "dispute {} changed status concurrently",
            dispute_id
        )));
    }

    tracing::info!(dispute_id, admin_id = actor.user_id, "refund dispute resolved");
    find_dispute(db, dispute_id).await
}

pub async fn get(db: &SqlitePool, dispute_id: i64, actor: &Actor) -> Result<RefundDispute, AppError> {
    let dispute = find_dispute(db, dispute_id).await?;
    let booking = lifecycle::find_booking(db, dispute.booking_id).await?;
    access::authorize(
        db,
        actor,
        Relation::BookingViewer {
            owner_id: booking.user_id,
            service_id: booking.service_id,
        },
    )
    .await?;
    Ok(dispute)
}

pub async fn list_for_booking(
    db: &SqlitePool,
    booking_id: i64,
    actor: &Actor,
) -> Result<Vec<RefundDispute>, AppError> {
    let booking = lifecycle::find_booking(db, booking_id).await?;
    access::authorize(
        db,
        actor,
        Relation::BookingViewer {
            owner_id: booking.user_id,
            service_id: booking.service_id,
        },
    )
    .await?;

    let disputes = sqlx::query_as::<_, RefundDispute>(&format!(
        "{} WHERE booking_id = ? ORDER BY id ASC",
        DISPUTE_SELECT
    ))
    .bind(booking_id)
    .fetch_all(db)
    .await?;
    Ok(disputes)
}
