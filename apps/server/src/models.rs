use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::status::{BookingStatus, DisputeStatus};

// ── Database models ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Agency,
    WebAdmin,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: i64,
    pub agency_id: i64,
    pub title: String,
    pub price: f64,
    pub location: String,
    pub duration: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AvailabilityWindow {
    pub id: i64,
    pub service_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub capacity: i64,
    pub remaining_spots: i64,
}

impl AvailabilityWindow {
    /// Inclusive on both ends.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start_date <= at && at <= self.end_date
    }

    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        self.remaining_spots > 0 && self.contains(at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub service_id: i64,
    /// Window the hold was taken from; cleared if that window is deleted.
    pub window_id: Option<i64>,
    pub booking_date: DateTime<Utc>,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ETicket {
    pub id: i64,
    pub booking_id: i64,
    pub ticket_code: String,
    pub issued_at: DateTime<Utc>,
    pub qr_code_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefundDispute {
    pub id: i64,
    pub booking_id: i64,
    pub payment_id: Option<i64>,
    pub opened_by: i64,
    pub status: DisputeStatus,
    pub reason: String,
    pub customer_explanation: Option<String>,
    pub agency_response: Option<String>,
    pub admin_verdict: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<i64>,
}

// ── API request/response types ──

#[derive(Debug, Deserialize)]
pub struct CreateWindowRequest {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub capacity: i64,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleWindowRequest {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct OpenDisputeRequest {
    pub reason: String,
    pub customer_explanation: Option<String>,
    pub payment_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AgencyResponseRequest {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct VerdictRequest {
    pub verdict: String,
}

/// Catalog filters for `GET /api/services`. Every filter is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceQuery {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Case-insensitive substring of the service location.
    pub location: Option<String>,
    pub duration: Option<i64>,
    pub agency_id: Option<i64>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ServicePage {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    pub id: i64,
    pub agency_id: i64,
    pub title: String,
    pub price: f64,
    pub location: String,
    pub duration: Option<i64>,
}

/// Who made a booking, as shown to its viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub service: ServiceSummary,
    pub customer: CustomerSummary,
    pub eticket: Option<ETicket>,
}

#[derive(Debug, Serialize)]
pub struct CreateBookingResponse {
    pub booking: Booking,
    pub eticket: ETicket,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
