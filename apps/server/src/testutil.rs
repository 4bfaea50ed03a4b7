//! Shared fixtures for unit tests: an in-memory database with migrations
//! applied and a small marketplace seeded into it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::{auth::Actor, db, models::Role, AppState};

/// Single connection: every connection to `sqlite::memory:` is its own database.
pub async fn pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

/// File-backed database shared by `connections` connections, for tests that
/// need transactions to really overlap. Dropping the `TempDir` removes it.
pub async fn file_pool(connections: u32) -> (SqlitePool, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("getlost.db"))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10));
    let pool = SqlitePoolOptions::new()
        .max_connections(connections)
        .connect_with(options)
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    (pool, dir)
}

pub fn state(pool: SqlitePool) -> Arc<AppState> {
    Arc::new(AppState {
        db: pool,
        session_max_age: None,
        started_at: Instant::now(),
    })
}

/// Midnight UTC on the given day.
pub fn ts(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub async fn insert_user(pool: &SqlitePool, username: &str, role: Role) -> Actor {
    let id = sqlx::query("INSERT INTO users (username, email, role) VALUES (?, ?, ?)")
        .bind(username)
        .bind(format!("{}@example.com", username))
        .bind(role)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid();
    Actor::new(id, role)
}

pub async fn insert_session(pool: &SqlitePool, user_id: i64, token: &str, created_at: DateTime<Utc>) {
    sqlx::query("INSERT INTO user_sessions (user_id, token_hash, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(crate::auth::hash_token(token))
        .bind(created_at)
        .execute(pool)
        .await
        .unwrap();
}

async fn insert_agency(pool: &SqlitePool, user_id: i64, name: &str) -> i64 {
    sqlx::query("INSERT INTO agencies (user_id, name) VALUES (?, ?)")
        .bind(user_id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn insert_service(
    pool: &SqlitePool,
    agency_id: i64,
    title: &str,
    price: f64,
    location: &str,
    duration: i64,
) -> i64 {
    sqlx::query("INSERT INTO services (agency_id, title, price, location, duration) VALUES (?, ?, ?, ?, ?)")
    .bind(agency_id)
    .bind(title)
    .bind(price)
    .bind(location)
    .bind(duration)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn insert_window(
    pool: &SqlitePool,
    service_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    capacity: i64,
) -> i64 {
    sqlx::query(
        "INSERT INTO availability_windows (service_id, start_date, end_date, capacity, remaining_spots)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(service_id)
    .bind(start)
    .bind(end)
    .bind(capacity)
    .bind(capacity)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn insert_payment(pool: &SqlitePool, booking_id: i64, amount: f64) -> i64 {
    sqlx::query("INSERT INTO payments (booking_id, amount, payment_date, status) VALUES (?, ?, ?, 'paid')")
        .bind(booking_id)
        .bind(amount)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

/// Two customers, two agencies with one service each, and an admin.
pub struct Fixture {
    pub customer: Actor,
    pub other_customer: Actor,
    pub agency: Actor,
    pub other_agency: Actor,
    pub admin: Actor,
    pub agency_id: i64,
    pub other_agency_id: i64,
    pub service_id: i64,
    pub other_service_id: i64,
}

impl Fixture {
    pub async fn seed(pool: &SqlitePool) -> Self {
        let customer = insert_user(pool, "ana", Role::Customer).await;
        let other_customer = insert_user(pool, "bruno", Role::Customer).await;
        let agency = insert_user(pool, "sunway", Role::Agency).await;
        let other_agency = insert_user(pool, "northtrail", Role::Agency).await;
        let admin = insert_user(pool, "root", Role::WebAdmin).await;

        let agency_id = insert_agency(pool, agency.user_id, "Sunway Tours").await;
        let other_agency_id = insert_agency(pool, other_agency.user_id, "North Trail").await;
        let service_id = insert_service(pool, agency_id, "Douro Valley Wine Trip", 450.0, "Lisbon", 3).await;
        let other_service_id = insert_service(pool, other_agency_id, "Fjord Kayaking", 450.0, "Lisbon", 3).await;

        Self {
            customer,
            other_customer,
            agency,
            other_agency,
            admin,
            agency_id,
            other_agency_id,
            service_id,
            other_service_id,
        }
    }
}
