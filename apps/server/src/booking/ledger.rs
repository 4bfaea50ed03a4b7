//! Availability ledger: the authoritative remaining-capacity counter per
//! service window.
//!
//! `reserve` and `release` are single conditional UPDATEs so they can run
//! inside a caller's transaction and never push `remaining_spots` outside
//! `0..=capacity`, whatever the interleaving of concurrent requests.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use super::access::{self, Relation};
use super::catalog;
use crate::{
    auth::Actor,
    error::AppError,
    models::{AvailabilityWindow, CreateWindowRequest, RescheduleWindowRequest},
};

const WINDOW_SELECT: &str =
    "SELECT id, service_id, start_date, end_date, capacity, remaining_spots FROM availability_windows";

/// All windows of a service, earliest start first.
pub async fn list_windows(db: &SqlitePool, service_id: i64) -> Result<Vec<AvailabilityWindow>, AppError> {
    let mut windows = sqlx::query_as::<_, AvailabilityWindow>(&format!(
        "{} WHERE service_id = ?",
        WINDOW_SELECT
    ))
    .bind(service_id)
    .fetch_all(db)
    .await?;

    windows.sort_by_key(|w| (w.start_date, w.id));
    Ok(windows)
}

pub async fn get_window(db: &SqlitePool, id: i64) -> Result<AvailabilityWindow, AppError> {
    sqlx::query_as::<_, AvailabilityWindow>(&format!("{} WHERE id = ?", WINDOW_SELECT))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("availability window"))
}

/// The window covering `at` that still has spots. Earliest start wins, then lowest id.
pub async fn find_open_window(
    db: &SqlitePool,
    service_id: i64,
    at: DateTime<Utc>,
) -> Result<Option<AvailabilityWindow>, AppError> {
    let candidates = sqlx::query_as::<_, AvailabilityWindow>(&format!(
        "{} WHERE service_id = ? AND remaining_spots > 0",
        WINDOW_SELECT
    ))
    .bind(service_id)
    .fetch_all(db)
    .await?;

    Ok(select_open_window(candidates, at))
}

fn select_open_window(
    candidates: Vec<AvailabilityWindow>,
    at: DateTime<Utc>,
) -> Option<AvailabilityWindow> {
    candidates
        .into_iter()
        .filter(|w| w.is_open_at(at))
        .min_by_key(|w| (w.start_date, w.id))
}

/// Take one spot. The `remaining_spots > 0` guard is evaluated atomically with the decrement.
pub async fn reserve(conn: &mut SqliteConnection, window_id: i64) -> Result<(), AppError> {
    let updated = sqlx::query(
        "UPDATE availability_windows SET remaining_spots = remaining_spots - 1
         WHERE id = ? AND remaining_spots > 0",
    )
    .bind(window_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if updated == 1 {
        return Ok(());
    }

    let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM availability_windows WHERE id = ?")
        .bind(window_id)
        .fetch_one(&mut *conn)
        .await?;

    if exists {
        Err(AppError::CapacityExhausted(window_id))
    } else {
        Err(AppError::NotFound("availability window"))
    }
}

/// Give one spot back, never above capacity. Returns false if the window no longer exists.
pub async fn release(conn: &mut SqliteConnection, window_id: i64) -> Result<bool, AppError> {
    let updated = sqlx::query(
        "UPDATE availability_windows SET remaining_spots = MIN(remaining_spots + 1, capacity)
         WHERE id = ?",
    )
    .bind(window_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(updated == 1)
}

fn validate_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
    if start > end {
        return Err(AppError::Validation("start_date must not be after end_date".into()));
    }
    Ok(())
}

pub async fn create_window(
    db: &SqlitePool,
    actor: &Actor,
    service_id: i64,
    req: &CreateWindowRequest,
) -> Result<AvailabilityWindow, AppError> {
    catalog::find_service(db, service_id).await?;
    access::authorize(db, actor, Relation::ServiceManager { service_id }).await?;

    validate_range(req.start_date, req.end_date)?;
    if req.capacity < 1 {
        return Err(AppError::Validation("capacity must be at least 1".into()));
    }

    let id = sqlx::query(
        "INSERT INTO availability_windows (service_id, start_date, end_date, capacity, remaining_spots)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(service_id)
    .bind(req.start_date)
    .bind(req.end_date)
    .bind(req.capacity)
    .bind(req.capacity)
    .execute(db)
    .await?
    .last_insert_rowid();

    tracing::info!(window_id = id, service_id, capacity = req.capacity, "availability window created");
    get_window(db, id).await
}

async fn window_of_service(
    db: &SqlitePool,
    service_id: i64,
    window_id: i64,
) -> Result<AvailabilityWindow, AppError> {
    let window = get_window(db, window_id).await?;
    if window.service_id != service_id {
        return Err(AppError::NotFound("availability window"));
    }
    Ok(window)
}

/// Move a window's date range. Capacity is fixed once the window exists.
pub async fn reschedule_window(
    db: &SqlitePool,
    actor: &Actor,
    service_id: i64,
    window_id: i64,
    req: &RescheduleWindowRequest,
) -> Result<AvailabilityWindow, AppError> {
    window_of_service(db, service_id, window_id).await?;
    access::authorize(db, actor, Relation::ServiceManager { service_id }).await?;
    validate_range(req.start_date, req.end_date)?;

    sqlx::query("UPDATE availability_windows SET start_date = ?, end_date = ? WHERE id = ?")
        .bind(req.start_date)
        .bind(req.end_date)
        .bind(window_id)
        .execute(db)
        .await?;

    tracing::info!(window_id, service_id, "availability window rescheduled");
    get_window(db, window_id).await
}

/// Delete a window. Refused while any of its spots is held.
pub async fn delete_window(
    db: &SqlitePool,
    actor: &Actor,
    service_id: i64,
    window_id: i64,
) -> Result<(), AppError> {
    let window = window_of_service(db, service_id, window_id).await?;
    access::authorize(db, actor, Relation::ServiceManager { service_id }).await?;

    let held = window.capacity - window.remaining_spots;
    if held > 0 {
        return Err(AppError::Conflict(format!(
            "window has {} held spot(s); cancel those bookings first",
            held
        )));
    }

    let deleted = sqlx::query(
        "DELETE FROM availability_windows WHERE id = ? AND remaining_spots = capacity",
    )
    .bind(window_id)
    .execute(db)
    .await?
    .rows_affected();

    if deleted == 0 {
        return Err(AppError::Conflict("window was booked concurrently".into()));
    }

    tracing::info!(window_id, service_id, "availability window deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{self, ts, Fixture};

    fn make_window(id: i64, start_day: u32, end_day: u32, remaining: i64) -> AvailabilityWindow {
        AvailabilityWindow {
            id,
            service_id: 1,
            start_date: ts(2025, 6, start_day),
            end_date: ts(2025, 6, end_day),
            capacity: 5,
            remaining_spots: remaining,
        }
    }

    // ── select_open_window ──

    #[test]
    fn test_select_prefers_earliest_start() {
        let candidates = vec![
            make_window(1, 3, 20, 1),
            make_window(2, 1, 20, 1),
            make_window(3, 2, 20, 1),
        ];
        let chosen = select_open_window(candidates, ts(2025, 6, 5)).unwrap();
        assert_eq!(chosen.id, 2);
    }

    #[test]
    fn test_select_tie_breaks_on_id() {
        let candidates = vec![make_window(9, 1, 20, 1), make_window(4, 1, 20, 1)];
        assert_eq!(select_open_window(candidates, ts(2025, 6, 5)).unwrap().id, 4);
    }

    #[test]
    fn test_select_skips_full_and_out_of_range() {
        let candidates = vec![
            make_window(1, 1, 10, 0),
            make_window(2, 11, 20, 3),
            make_window(3, 4, 8, 2),
        ];
        assert_eq!(select_open_window(candidates, ts(2025, 6, 5)).unwrap().id, 3);
    }

    #[test]
    fn test_select_none() {
        assert!(select_open_window(vec![], ts(2025, 6, 5)).is_none());
        let candidates = vec![make_window(1, 1, 4, 2)];
        assert!(select_open_window(candidates, ts(2025, 6, 5)).is_none());
    }

    // ── reserve / release ──

    #[tokio::test]
    async fn test_reserve_until_exhausted() {
        let pool = testutil::pool().await;
        let fx = Fixture::seed(&pool).await;
        let id = testutil::insert_window(&pool, fx.service_id, ts(2025, 6, 1), ts(2025, 6, 10), 2).await;
        let mut conn = pool.acquire().await.unwrap();

        reserve(&mut conn, id).await.unwrap();
        reserve(&mut conn, id).await.unwrap();
        let err = reserve(&mut conn, id).await.unwrap_err();
        assert!(matches!(err, AppError::CapacityExhausted(w) if w == id));
        drop(conn);

        assert_eq!(get_window(&pool, id).await.unwrap().remaining_spots, 0);
    }

    #[tokio::test]
    async fn test_reserve_missing_window() {
        let pool = testutil::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let err = reserve(&mut conn, 42).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_release_caps_at_capacity() {
        let pool = testutil::pool().await;
        let fx = Fixture::seed(&pool).await;
        let id = testutil::insert_window(&pool, fx.service_id, ts(2025, 6, 1), ts(2025, 6, 10), 2).await;
        let mut conn = pool.acquire().await.unwrap();

        reserve(&mut conn, id).await.unwrap();
        assert!(release(&mut conn, id).await.unwrap());
        assert!(release(&mut conn, id).await.unwrap());
        assert!(!release(&mut conn, 9999).await.unwrap());
        drop(conn);

        let window = get_window(&pool, id).await.unwrap();
        assert_eq!(window.remaining_spots, 2);
        assert_eq!(window.capacity, 2);
    }

    #[tokio::test]
    async fn test_reserve_from_many_tasks_never_oversells() {
        let pool = testutil::pool().await;
        let fx = Fixture::seed(&pool).await;
        let id = testutil::insert_window(&pool, fx.service_id, ts(2025, 6, 1), ts(2025, 6, 10), 1).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let mut conn = pool.acquire().await.unwrap();
                reserve(&mut conn, id).await
            }));
        }

        let mut won = 0;
        let mut exhausted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => won += 1,
                Err(AppError::CapacityExhausted(_)) => exhausted += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(won, 1);
        assert_eq!(exhausted, 7);
        assert_eq!(get_window(&pool, id).await.unwrap().remaining_spots, 0);
    }

    #[tokio::test]
    async fn test_find_open_window_from_store() {
        let pool = testutil::pool().await;
        let fx = Fixture::seed(&pool).await;
        let later = testutil::insert_window(&pool, fx.service_id, ts(2025, 6, 3), ts(2025, 6, 30), 1).await;
        let earlier = testutil::insert_window(&pool, fx.service_id, ts(2025, 6, 1), ts(2025, 6, 10), 1).await;

        let found = find_open_window(&pool, fx.service_id, ts(2025, 6, 5)).await.unwrap();
        assert_eq!(found.map(|w| w.id), Some(earlier));

        let found = find_open_window(&pool, fx.service_id, ts(2025, 6, 20)).await.unwrap();
        assert_eq!(found.map(|w| w.id), Some(later));

        let found = find_open_window(&pool, fx.other_service_id, ts(2025, 6, 5)).await.unwrap();
        assert!(found.is_none());
    }

    // ── window management ──

    #[tokio::test]
    async fn test_create_window_by_owner() {
        let pool = testutil::pool().await;
        let fx = Fixture::seed(&pool).await;
        let req = CreateWindowRequest {
            start_date: ts(2025, 6, 1),
            end_date: ts(2025, 6, 10),
            capacity: 3,
        };

        let window = create_window(&pool, &fx.agency, fx.service_id, &req).await.unwrap();
        assert_eq!(window.capacity, 3);
        assert_eq!(window.remaining_spots, 3);

        let err = create_window(&pool, &fx.other_agency, fx.service_id, &req).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(create_window(&pool, &fx.admin, fx.service_id, &req).await.is_ok());
        let err = create_window(&pool, &fx.agency, 9999, &req).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_window_validation() {
        let pool = testutil::pool().await;
        let fx = Fixture::seed(&pool).await;

        let inverted = CreateWindowRequest {
            start_date: ts(2025, 6, 10),
            end_date: ts(2025, 6, 1),
            capacity: 3,
        };
        let err = create_window(&pool, &fx.agency, fx.service_id, &inverted).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let empty = CreateWindowRequest {
            start_date: ts(2025, 6, 1),
            end_date: ts(2025, 6, 10),
            capacity: 0,
        };
        let err = create_window(&pool, &fx.agency, fx.service_id, &empty).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reschedule_window_keeps_counters() {
        let pool = testutil::pool().await;
        let fx = Fixture::seed(&pool).await;
        let id = testutil::insert_window(&pool, fx.service_id, ts(2025, 6, 1), ts(2025, 6, 10), 2).await;
        let req = RescheduleWindowRequest {
            start_date: ts(2025, 7, 1),
            end_date: ts(2025, 7, 10),
        };

        let window = reschedule_window(&pool, &fx.agency, fx.service_id, id, &req).await.unwrap();
        assert_eq!(window.start_date, ts(2025, 7, 1));
        assert_eq!(window.capacity, 2);
        assert_eq!(window.remaining_spots, 2);

        // Window must belong to the service in the path
        let err = reschedule_window(&pool, &fx.admin, fx.other_service_id, id, &req)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_window_refused_while_held() {
        let pool = testutil::pool().await;
        let fx = Fixture::seed(&pool).await;
        let id = testutil::insert_window(&pool, fx.service_id, ts(2025, 6, 1), ts(2025, 6, 10), 2).await;

        let mut conn = pool.acquire().await.unwrap();
        reserve(&mut conn, id).await.unwrap();
        drop(conn);

        let err = delete_window(&pool, &fx.agency, fx.service_id, id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let mut conn = pool.acquire().await.unwrap();
        release(&mut conn, id).await.unwrap();
        drop(conn);

        delete_window(&pool, &fx.agency, fx.service_id, id).await.unwrap();
        assert!(list_windows(&pool, fx.service_id).await.unwrap().is_empty());
    }
}
