//! The single ownership check used by every booking, availability and
//! dispute operation. Role alone never grants a mutation; the actor must
//! also stand in the right relation to the resource.

use sqlx::SqlitePool;

use crate::{auth::Actor, error::AppError, models::Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Any actor holding this role.
    HasRole(Role),
    /// The customer who created the booking.
    BookingCustomer { owner_id: i64 },
    /// The agency that publishes the service.
    ServiceAgency { service_id: i64 },
    /// The owning agency, or any webadmin.
    ServiceManager { service_id: i64 },
    /// The booking's customer, the service's agency, or any webadmin.
    BookingViewer { owner_id: i64, service_id: i64 },
}

pub async fn authorize(db: &SqlitePool, actor: &Actor, relation: Relation) -> Result<(), AppError> {
    let allowed = match relation {
        Relation::HasRole(role) => actor.role == role,
        Relation::BookingCustomer { owner_id } => {
            actor.role == Role::Customer && actor.user_id == owner_id
        }
        Relation::ServiceAgency { service_id } => owns_service(db, actor, service_id).await?,
        Relation::ServiceManager { service_id } => {
            actor.role == Role::WebAdmin || owns_service(db, actor, service_id).await?
        }
        Relation::BookingViewer {
            owner_id,
            service_id,
        } => match actor.role {
            Role::WebAdmin => true,
            Role::Customer => actor.user_id == owner_id,
            Role::Agency => owns_service(db, actor, service_id).await?,
        },
    };

    if allowed {
        Ok(())
    } else {
        tracing::debug!(user_id = actor.user_id, ?relation, "authorization denied");
        Err(AppError::Forbidden(denial_reason(relation)))
    }
}

/// The agency profile belonging to an agency user, if any.
pub async fn agency_id_for(db: &SqlitePool, user_id: i64) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM agencies WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(db)
        .await
}

async fn owns_service(db: &SqlitePool, actor: &Actor, service_id: i64) -> Result<bool, sqlx::Error> {
    if actor.role != Role::Agency {
        return Ok(false);
    }
    sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM services s
         JOIN agencies a ON a.id = s.agency_id
         WHERE s.id = ? AND a.user_id = ?",
    )
    .bind(service_id)
    .bind(actor.user_id)
    .fetch_one(db)
    .await
}

fn denial_reason(relation: Relation) -> &'static str {
    match relation {
        Relation::HasRole(Role::Customer) => "customers only",
        Relation::HasRole(Role::Agency) => "agencies only",
        Relation::HasRole(Role::WebAdmin) => "administrators only",
        Relation::BookingCustomer { .. } => "not the booking's customer",
        Relation::ServiceAgency { .. } => "not the service's agency",
        Relation::ServiceManager { .. } => "not allowed to manage this service",
        Relation::BookingViewer { .. } => "not allowed to view this booking",
    }
}
