//! Error type for store operations.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::RouteId;

/// Error from a store or collaborator call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The requested record does not exist (or is soft-deleted).
    #[error("not found: {0}")]
    NotFound(String),

    /// Insert violated the trip uniqueness constraint on
    /// `(route, service date, planned start)` for non-deleted rows.
    #[error("duplicate trip for route {route_id} on {service_date} at {planned_start_at}")]
    DuplicateTrip {
        route_id: RouteId,
        service_date: NaiveDate,
        planned_start_at: DateTime<Utc>,
    },

    /// The row changed since it was read. Callers reread and retry.
    #[error("stale write: {0}")]
    Stale(String),

    /// The backing store rejected or failed the operation.
    #[error("store failure: {0}")]
    Backend(String),
}
