//! Collaborator traits consumed by the engine.
//!
//! These are synchronous seams: generation is a request-driven
//! computation that walks its window sequentially, and cancellation or
//! timeout semantics belong to the caller's execution context, not to
//! these interfaces. Implementations must be `Send + Sync`.

use chrono::{DateTime, NaiveDate, Utc};

use super::StoreError;
use crate::domain::{
    BindingId, PickupPointId, RouteBinding, RouteId, Schedule, ScheduleId, Trip, TripId,
};

/// A pickup point on a route, as supplied by the route provider.
#[derive(Debug, Clone)]
pub struct PickupPoint {
    pub id: PickupPointId,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

/// A route as seen by the generation engine.
#[derive(Debug, Clone)]
pub struct Route {
    pub id: RouteId,
    pub active: bool,
    /// Pickup points in service order.
    pub pickup_points: Vec<PickupPoint>,
}

/// Supplies route data (owned by the routing subsystem, external to
/// this engine).
pub trait RouteProvider: Send + Sync {
    /// Fetch a route by id; `None` when the route is unknown.
    fn route(&self, route_id: RouteId) -> Result<Option<Route>, StoreError>;
}

/// Storage for schedule templates.
pub trait ScheduleStore: Send + Sync {
    /// Insert a new schedule, returning its assigned id.
    fn insert_schedule(&self, schedule: Schedule) -> Result<ScheduleId, StoreError>;

    /// Replace a stored schedule.
    fn update_schedule(&self, schedule: &Schedule) -> Result<(), StoreError>;

    /// Fetch a non-deleted schedule by id.
    fn schedule(&self, id: ScheduleId) -> Result<Option<Schedule>, StoreError>;

    /// Non-deleted schedules matching the duplicate-detection signature
    /// (name, start, end, timezone, rule). Window intersection is
    /// checked by the caller.
    fn schedules_by_signature(&self, candidate: &Schedule) -> Result<Vec<Schedule>, StoreError>;
}

/// Storage for route-to-schedule bindings.
pub trait BindingStore: Send + Sync {
    /// Insert a new binding, returning its assigned id.
    fn insert_binding(&self, binding: RouteBinding) -> Result<BindingId, StoreError>;

    /// All active bindings referencing a schedule.
    fn active_bindings_for_schedule(
        &self,
        schedule_id: ScheduleId,
    ) -> Result<Vec<RouteBinding>, StoreError>;
}

/// Storage for generated trips.
pub trait TripStore: Send + Sync {
    /// Look up a non-deleted trip by its idempotency key.
    fn trip_by_key(
        &self,
        route_id: RouteId,
        service_date: NaiveDate,
        planned_start_at: DateTime<Utc>,
    ) -> Result<Option<Trip>, StoreError>;

    /// Fetch a non-deleted trip by id.
    fn trip(&self, id: TripId) -> Result<Option<Trip>, StoreError>;

    /// Insert a new trip, returning it with its assigned id.
    ///
    /// Fails with [`StoreError::DuplicateTrip`] when a non-deleted trip
    /// already holds the same `(route, service date, planned start)`
    /// key. This constraint, not the caller's existence check, is what
    /// makes generation idempotent under concurrency.
    fn insert_trip(&self, trip: Trip) -> Result<Trip, StoreError>;

    /// Replace a stored trip, expecting the caller's copy to carry the
    /// current version.
    ///
    /// Returns the stored trip with its version bumped, or
    /// [`StoreError::Stale`] when a concurrent writer updated the row
    /// after the caller read it. This version check is what serializes
    /// concurrent read-check-write sequences on one trip.
    fn update_trip(&self, trip: &Trip) -> Result<Trip, StoreError>;

    /// Non-deleted trips for a route.
    fn trips_by_route(&self, route_id: RouteId) -> Result<Vec<Trip>, StoreError>;

    /// Non-deleted trips generated from a schedule for a service date.
    fn trips_by_schedule_and_date(
        &self,
        schedule_id: ScheduleId,
        date: NaiveDate,
    ) -> Result<Vec<Trip>, StoreError>;

    /// Soft-delete a trip.
    fn soft_delete_trip(&self, id: TripId) -> Result<(), StoreError>;
}

/// A schedule change event, delivered fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum ScheduleEvent {
    /// A schedule's name, times, or rule changed.
    Updated {
        schedule_id: ScheduleId,
        name: String,
    },
}

/// Outbound notification sink.
///
/// Delivery failures must never fail the triggering operation; callers
/// log and move on.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: ScheduleEvent) -> Result<(), StoreError>;
}
