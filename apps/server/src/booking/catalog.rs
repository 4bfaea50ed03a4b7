use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    error::AppError,
    models::{Service, ServicePage, ServiceQuery},
};

const SERVICE_SELECT: &str =
    "SELECT id, agency_id, title, price, location, duration, description FROM services";

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &ServiceQuery) {
    qb.push(" WHERE 1 = 1");
    if let Some(min) = query.min_price {
        qb.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = query.max_price {
        qb.push(" AND price <= ").push_bind(max);
    }
    if let Some(location) = query.location.as_deref().filter(|l| !l.trim().is_empty()) {
        qb.push(" AND LOWER(location) LIKE '%' || LOWER(")
            .push_bind(location.trim().to_string())
            .push(") || '%'");
    }
    if let Some(duration) = query.duration {
        qb.push(" AND duration = ").push_bind(duration);
    }
    if let Some(agency_id) = query.agency_id {
        qb.push(" AND agency_id = ").push_bind(agency_id);
    }
}

/// One page of the catalog, ordered by title, with the total match count.
pub async fn list_services(db: &SqlitePool, query: &ServiceQuery) -> Result<ServicePage, AppError> {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page < 1 {
        return Err(AppError::Validation("page must be at least 1".into()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(AppError::Validation(format!(
            "page_size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
        if min > max {
            return Err(AppError::Validation("min_price must not exceed max_price".into()));
        }
    }

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM services");
    push_filters(&mut count, query);
    let total: i64 = count.build_query_scalar().fetch_one(db).await?;

    let mut select = QueryBuilder::<Sqlite>::new(SERVICE_SELECT);
    push_filters(&mut select, query);
    select
        .push(" ORDER BY title ASC, id ASC LIMIT ")
        .push_bind(page_size)
        .push(" OFFSET ")
        .push_bind((page - 1) * page_size);
    let services = select.build_query_as::<Service>().fetch_all(db).await?;

    Ok(ServicePage {
        total,
        page,
        page_size,
        services,
    })
}

pub async fn find_service(db: &SqlitePool, id: i64) -> Result<Service, AppError> {
    sqlx::query_as::<_, Service>(&format!("{} WHERE id = ?", SERVICE_SELECT))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("service"))
}
