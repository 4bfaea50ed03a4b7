//! Booking lifecycle: creation against the availability ledger, status
//! transitions, e-ticket issue and role-scoped reads.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use super::access::{self, Relation};
use super::catalog;
use super::ledger;
use super::status::BookingStatus;
use crate::{
    auth::Actor,
    error::AppError,
    models::{
        Booking, BookingDetail, CreateBookingResponse, CustomerSummary, ETicket, Role,
        ServiceSummary,
    },
};

const BOOKING_SELECT: &str =
    "SELECT id, user_id, service_id, window_id, booking_date, status FROM bookings";

/// Booking joined with its service, customer and (optional) e-ticket, one row per booking.
const BOOKING_DETAIL_SELECT: &str =
    "SELECT b.id, b.user_id, b.service_id, b.window_id, b.booking_date, b.status,
            s.agency_id, s.title, s.price, s.location, s.duration,
            u.username, u.email,
            t.id AS ticket_id, t.ticket_code, t.issued_at, t.qr_code_url
     FROM bookings b
     JOIN services s ON s.id = b.service_id
     JOIN users u ON u.id = b.user_id
     LEFT JOIN e_tickets t ON t.booking_id = b.id";

#[derive(sqlx::FromRow)]
struct BookingDetailRow {
    id: i64,
    user_id: i64,
    service_id: i64,
    window_id: Option<i64>,
    booking_date: DateTime<Utc>,
    status: BookingStatus,
    agency_id: i64,
    title: String,
    price: f64,
    location: String,
    duration: Option<i64>,
    username: String,
    email: String,
    ticket_id: Option<i64>,
    ticket_code: Option<String>,
    issued_at: Option<DateTime<Utc>>,
    qr_code_url: Option<String>,
}

impl From<BookingDetailRow> for BookingDetail {
    fn from(row: BookingDetailRow) -> Self {
        let eticket = match (row.ticket_id, row.ticket_code, row.issued_at) {
            (Some(id), Some(ticket_code), Some(issued_at)) => Some(ETicket {
                id,
                booking_id: row.id,
                ticket_code,
                issued_at,
                qr_code_url: row.qr_code_url,
            }),
            _ => None,
        };

        BookingDetail {
            booking: Booking {
                id: row.id,
                user_id: row.user_id,
                service_id: row.service_id,
                window_id: row.window_id,
                booking_date: row.booking_date,
                status: row.status,
            },
            service: ServiceSummary {
                id: row.service_id,
                agency_id: row.agency_id,
                title: row.title,
                price: row.price,
                location: row.location,
                duration: row.duration,
            },
            customer: CustomerSummary {
                id: row.user_id,
                username: row.username,
                email: row.email,
            },
            eticket,
        }
    }
}

/// `TKT-<bookingId>-<8 uppercase hex chars>`
pub fn ticket_code(booking_id: i64) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("TKT-{}-{}", booking_id, random[..8].to_uppercase())
}

pub async fn find_booking(db: &SqlitePool, id: i64) -> Result<Booking, AppError> {
    sqlx::query_as::<_, Booking>(&format!("{} WHERE id = ?", BOOKING_SELECT))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("booking"))
}

/// Hold a spot in the open window covering `at`, insert the booking as
/// `pending` and issue its e-ticket, all in one transaction.
pub async fn create(
    db: &SqlitePool,
    actor: &Actor,
    service_id: i64,
    at: DateTime<Utc>,
) -> Result<CreateBookingResponse, AppError> {
    catalog::find_service(db, service_id).await?;
    access::authorize(db, actor, Relation::HasRole(Role::Customer)).await?;

    let window = ledger::find_open_window(db, service_id, at)
        .await?
        .ok_or(AppError::NoAvailability)?;

    let mut tx = db.begin().await?;

    // Conditional decrement first: takes the write lock and re-checks the spot
    ledger::reserve(&mut tx, window.id).await?;

    let booking_id = sqlx::query(
        "INSERT INTO bookings (user_id, service_id, window_id, booking_date, status)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(actor.user_id)
    .bind(service_id)
    .bind(window.id)
    .bind(at)
    .bind(BookingStatus::Pending)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let eticket = issue_eticket(&mut tx, booking_id, at).await?;

    tx.commit().await?;

    tracing::info!(
        booking_id,
        service_id,
        window_id = window.id,
        user_id = actor.user_id,
        ticket = %eticket.ticket_code,
        "booking created"
    );

    Ok(CreateBookingResponse {
        booking: Booking {
            id: booking_id,
            user_id: actor.user_id,
            service_id,
            window_id: Some(window.id),
            booking_date: at,
            status: BookingStatus::Pending,
        },
        eticket,
    })
}

async fn issue_eticket(
    conn: &mut SqliteConnection,
    booking_id: i64,
    issued_at: DateTime<Utc>,
) -> Result<ETicket, AppError> {
    let code = ticket_code(booking_id);
    let id = sqlx::query(
        "INSERT INTO e_tickets (booking_id, ticket_code, issued_at) VALUES (?, ?, ?)",
    )
    .bind(booking_id)
    .bind(&code)
    .bind(issued_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::from_unique(e, "e-ticket"))?
    .last_insert_rowid();

    Ok(ETicket {
        id,
        booking_id,
        ticket_code: code,
        issued_at,
        qr_code_url: None,
    })
}

/// Write `next` only if the row still holds the status we validated against.
async fn apply_transition(
    conn: &mut SqliteConnection,
    booking: &Booking,
    next: BookingStatus,
) -> Result<Booking, AppError> {
    booking.status.transition(next)?;

    let updated = sqlx::query("UPDATE bookings SET status = ? WHERE id = ? AND status = ?")
        .bind(next)
        .bind(booking.id)
        .bind(booking.status)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::InvalidTransition(format!(
            "booking {} changed status concurrently",
            booking.id
        )));
    }

    Ok(Booking {
        status: next,
        ..booking.clone()
    })
}

async fn agency_transition(
    db: &SqlitePool,
    booking_id: i64,
    actor: &Actor,
    next: BookingStatus,
) -> Result<Booking, AppError> {
    let booking = find_booking(db, booking_id).await?;
    access::authorize(
        db,
        actor,
        Relation::ServiceAgency {
            service_id: booking.service_id,
        },
    )
    .await?;

    let mut conn = db.acquire().await?;
    let updated = apply_transition(&mut conn, &booking, next).await?;

    tracing::info!(
        booking_id,
        from = %booking.status,
        to = %next,
        terminal = next.is_terminal(),
        "booking transitioned"
    );
    Ok(updated)
}

/// pending → confirmed, by the agency owning the service.
pub async fn confirm(db: &SqlitePool, booking_id: i64, actor: &Actor) -> Result<Booking, AppError> {
    agency_transition(db, booking_id, actor, BookingStatus::Confirmed).await
}

/// confirmed → completed, by the agency owning the service.
pub async fn complete(db: &SqlitePool, booking_id: i64, actor: &Actor) -> Result<Booking, AppError> {
    agency_transition(db, booking_id, actor, BookingStatus::Completed).await
}

/// pending/confirmed → cancelled, by the booking's customer. The held spot
/// goes back to its window in the same transaction.
pub async fn cancel(db: &SqlitePool, booking_id: i64, actor: &Actor) -> Result<Booking, AppError> {
    let booking = find_booking(db, booking_id).await?;
    access::authorize(
        db,
        actor,
        Relation::BookingCustomer {
            owner_id: booking.user_id,
        },
    )
    .await?;

    let mut tx = db.begin().await?;
    let cancelled = apply_transition(&mut tx, &booking, BookingStatus::Cancelled).await?;

    match booking.window_id {
        Some(window_id) => {
            if !ledger::release(&mut tx, window_id).await? {
                tracing::warn!(booking_id, window_id, "window vanished before release");
            }
        }
        None => tracing::warn!(booking_id, "booking has no window to release into"),
    }

    tx.commit().await?;

    tracing::info!(booking_id, from = %booking.status, "booking cancelled");
    Ok(cancelled)
}

/// Booking with service summary and e-ticket, for its customer, its agency or an admin.
pub async fn get(db: &SqlitePool, booking_id: i64, actor: &Actor) -> Result<BookingDetail, AppError> {
    let row = sqlx::query_as::<_, BookingDetailRow>(&format!("{} WHERE b.id = ?", BOOKING_DETAIL_SELECT))
        .bind(booking_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("booking"))?;

    access::authorize(
        db,
        actor,
        Relation::BookingViewer {
            owner_id: row.user_id,
            service_id: row.service_id,
        },
    )
    .await?;

    Ok(row.into())
}

pub async fn eticket(db: &SqlitePool, booking_id: i64, actor: &Actor) -> Result<ETicket, AppError> {
    get(db, booking_id, actor)
        .await?
        .eticket
        .ok_or(AppError::NotFound("e-ticket"))
}

async fn list_details(
    db: &SqlitePool,
    filter: &str,
    bind: Option<i64>,
) -> Result<Vec<BookingDetail>, AppError> {
    let query = format!("{} {} ORDER BY b.id DESC", BOOKING_DETAIL_SELECT, filter);
    let mut q = sqlx::query_as::<_, BookingDetailRow>(&query);
    if let Some(value) = bind {
        q = q.bind(value);
    }
    let rows = q.fetch_all(db).await?;
    Ok(rows.into_iter().map(BookingDetail::from).collect())
}

/// The actor's own bookings, newest first.
pub async fn list_for_customer(db: &SqlitePool, actor: &Actor) -> Result<Vec<BookingDetail>, AppError> {
    access::authorize(db, actor, Relation::HasRole(Role::Customer)).await?;
    list_details(db, "WHERE b.user_id = ?", Some(actor.user_id)).await
}

/// Bookings across every service of the actor's agency.
pub async fn list_for_agency(db: &SqlitePool, actor: &Actor) -> Result<Vec<BookingDetail>, AppError> {
    access::authorize(db, actor, Relation::HasRole(Role::Agency)).await?;
    let agency_id = access::agency_id_for(db, actor.user_id)
        .await?
        .ok_or(AppError::NotFound("agency"))?;
    list_details(db, "WHERE s.agency_id = ?", Some(agency_id)).await
}

pub async fn list_all(db: &SqlitePool, actor: &Actor) -> Result<Vec<BookingDetail>, AppError> {
    access::authorize(db, actor, Relation::HasRole(Role::WebAdmin)).await?;
    list_details(db, "", None).await
}
