//! In-memory store implementation.
//!
//! Backs tests and local development: all data lives in maps behind a
//! single lock, ids are assigned from counters, and queries are
//! soft-delete aware. The trip uniqueness constraint is enforced here
//! on insert, mirroring what a relational backend would enforce with a
//! partial unique index.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDate, Utc};

use super::error::StoreError;
use super::traits::{
    BindingStore, NotificationSink, Route, RouteProvider, ScheduleEvent, ScheduleStore, TripStore,
};
use crate::domain::{BindingId, RouteBinding, RouteId, Schedule, ScheduleId, Trip, TripId};

/// In-memory implementation of every collaborator trait.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    routes: HashMap<RouteId, Route>,
    schedules: HashMap<ScheduleId, Schedule>,
    bindings: HashMap<BindingId, RouteBinding>,
    trips: HashMap<TripId, Trip>,

    /// Captured outbound payloads, inspectable from tests.
    notifications: Vec<String>,
    /// When set, `notify` fails; exercises the swallow-and-log path.
    notifications_fail: bool,

    next_schedule_id: i64,
    next_binding_id: i64,
    next_trip_id: i64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            schedules: HashMap::new(),
            bindings: HashMap::new(),
            trips: HashMap::new(),
            notifications: Vec::new(),
            notifications_fail: false,
            next_schedule_id: 1,
            next_binding_id: 1,
            next_trip_id: 1,
        }
    }
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Register a route the provider should know about.
    pub fn put_route(&self, route: Route) {
        let mut inner = self.inner.write().unwrap();
        inner.routes.insert(route.id, route);
    }

    /// Flip a registered route's active flag.
    ///
    /// Returns `false` when the route is unknown.
    pub fn set_route_active(&self, route_id: RouteId, active: bool) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.routes.get_mut(&route_id) {
            Some(route) => {
                route.active = active;
                true
            }
            None => false,
        }
    }

    /// Make subsequent `notify` calls fail (for testing the
    /// fire-and-forget path).
    pub fn set_notifications_fail(&self, fail: bool) {
        self.inner.write().unwrap().notifications_fail = fail;
    }

    /// JSON payloads captured so far, in delivery order.
    pub fn notifications(&self) -> Vec<String> {
        self.inner.read().unwrap().notifications.clone()
    }

    /// Number of non-deleted trips currently stored.
    pub fn live_trip_count(&self) -> usize {
        self.inner
            .read()
            .unwrap()
            .trips
            .values()
            .filter(|t| !t.deleted)
            .count()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteProvider for MemoryStore {
    fn route(&self, route_id: RouteId) -> Result<Option<Route>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.routes.get(&route_id).cloned())
    }
}

impl ScheduleStore for MemoryStore {
    fn insert_schedule(&self, mut schedule: Schedule) -> Result<ScheduleId, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let id = ScheduleId(inner.next_schedule_id);
        inner.next_schedule_id += 1;
        schedule.id = id;
        inner.schedules.insert(id, schedule);
        Ok(id)
    }

    fn update_schedule(&self, schedule: &Schedule) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.schedules.contains_key(&schedule.id) {
            return Err(StoreError::NotFound(format!(
                "schedule {} not found",
                schedule.id
            )));
        }
        inner.schedules.insert(schedule.id, schedule.clone());
        Ok(())
    }

    fn schedule(&self, id: ScheduleId) -> Result<Option<Schedule>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.schedules.get(&id).filter(|s| !s.deleted).cloned())
    }

    fn schedules_by_signature(&self, candidate: &Schedule) -> Result<Vec<Schedule>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .schedules
            .values()
            .filter(|s| !s.deleted && s.signature_matches(candidate))
            .cloned()
            .collect())
    }
}

impl BindingStore for MemoryStore {
    fn insert_binding(&self, mut binding: RouteBinding) -> Result<BindingId, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let id = BindingId(inner.next_binding_id);
        inner.next_binding_id += 1;
        binding.id = id;
        inner.bindings.insert(id, binding);
        Ok(id)
    }

    fn active_bindings_for_schedule(
        &self,
        schedule_id: ScheduleId,
    ) -> Result<Vec<RouteBinding>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut bindings: Vec<RouteBinding> = inner
            .bindings
            .values()
            .filter(|b| b.active && b.schedule_id == schedule_id)
            .cloned()
            .collect();
        bindings.sort_by_key(|b| b.id);
        Ok(bindings)
    }
}

impl TripStore for MemoryStore {
    fn trip_by_key(
        &self,
        route_id: RouteId,
        service_date: NaiveDate,
        planned_start_at: DateTime<Utc>,
    ) -> Result<Option<Trip>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .trips
            .values()
            .find(|t| {
                !t.deleted && t.key() == (route_id, service_date, planned_start_at)
            })
            .cloned())
    }

    fn trip(&self, id: TripId) -> Result<Option<Trip>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.trips.get(&id).filter(|t| !t.deleted).cloned())
    }

    fn insert_trip(&self, mut trip: Trip) -> Result<Trip, StoreError> {
        let mut inner = self.inner.write().unwrap();

        // The uniqueness constraint on (route, service date, planned
        // start) over non-deleted rows.
        if inner
            .trips
            .values()
            .any(|t| !t.deleted && t.key() == trip.key())
        {
            return Err(StoreError::DuplicateTrip {
                route_id: trip.route_id,
                service_date: trip.service_date,
                planned_start_at: trip.planned_start_at,
            });
        }

        let id = TripId(inner.next_trip_id);
        inner.next_trip_id += 1;
        trip.id = id;
        inner.trips.insert(id, trip.clone());
        Ok(trip)
    }

    fn update_trip(&self, trip: &Trip) -> Result<Trip, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let stored = inner
            .trips
            .get_mut(&trip.id)
            .ok_or_else(|| StoreError::NotFound(format!("trip {} not found", trip.id)))?;

        if stored.version != trip.version {
            return Err(StoreError::Stale(format!("trip {}", trip.id)));
        }

        let mut updated = trip.clone();
        updated.version = trip.version + 1;
        *stored = updated.clone();
        Ok(updated)
    }

    fn trips_by_route(&self, route_id: RouteId) -> Result<Vec<Trip>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut trips: Vec<Trip> = inner
            .trips
            .values()
            .filter(|t| !t.deleted && t.route_id == route_id)
            .cloned()
            .collect();
        trips.sort_by_key(|t| t.id);
        Ok(trips)
    }

    fn trips_by_schedule_and_date(
        &self,
        schedule_id: ScheduleId,
        date: NaiveDate,
    ) -> Result<Vec<Trip>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut trips: Vec<Trip> = inner
            .trips
            .values()
            .filter(|t| {
                !t.deleted
                    && t.service_date == date
                    && t.snapshot.schedule_id == schedule_id
            })
            .cloned()
            .collect();
        trips.sort_by_key(|t| t.id);
        Ok(trips)
    }

    fn soft_delete_trip(&self, id: TripId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        match inner.trips.get_mut(&id) {
            Some(trip) => {
                trip.deleted = true;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("trip {id} not found"))),
        }
    }
}

impl NotificationSink for MemoryStore {
    /// Encodes the event as the JSON payload a real sink would put on
    /// the wire, then captures it.
    fn notify(&self, event: ScheduleEvent) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&event)
            .map_err(|e| StoreError::Backend(format!("encode notification: {e}")))?;
        let mut inner = self.inner.write().unwrap();
        if inner.notifications_fail {
            return Err(StoreError::Backend("notification sink unavailable".into()));
        }
        inner.notifications.push(payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RecurrenceRule, ScheduleSnapshot, TimeOfDay, TripStatus};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn schedule() -> Schedule {
        Schedule {
            id: ScheduleId(0),
            name: "Morning run".into(),
            start: TimeOfDay::parse("07:00").unwrap(),
            end: TimeOfDay::parse("08:30").unwrap(),
            timezone: "Asia/Ho_Chi_Minh".parse().unwrap(),
            rule: RecurrenceRule::Daily,
            effective_from: date(2024, 3, 1),
            effective_to: None,
            exceptions: Vec::new(),
            overrides: Vec::new(),
            active: true,
            deleted: false,
            created_at: Utc::now(),
        }
    }

    fn trip(route: i64, day: NaiveDate, start: DateTime<Utc>) -> Trip {
        Trip {
            id: TripId(0),
            route_id: RouteId(route),
            service_date: day,
            planned_start_at: start,
            planned_end_at: start + chrono::Duration::hours(1),
            started_at: None,
            ended_at: None,
            status: TripStatus::Scheduled,
            snapshot: ScheduleSnapshot {
                schedule_id: ScheduleId(1),
                name: "Morning run".into(),
                start: TimeOfDay::parse("07:00").unwrap(),
                end: TimeOfDay::parse("08:30").unwrap(),
                rule: "FREQ=DAILY".into(),
                timezone: "Asia/Ho_Chi_Minh".into(),
            },
            is_override: false,
            override_reason: None,
            override_author: None,
            override_recorded_at: None,
            deleted: false,
            version: 0,
            stops: Vec::new(),
        }
    }

    fn instant(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn schedule_insert_assigns_ids() {
        let store = MemoryStore::new();

        let a = store.insert_schedule(schedule()).unwrap();
        let b = store.insert_schedule(schedule()).unwrap();
        assert_ne!(a, b);

        assert!(store.schedule(a).unwrap().is_some());
        assert!(store.schedule(ScheduleId(999)).unwrap().is_none());
    }

    #[test]
    fn deleted_schedules_are_invisible() {
        let store = MemoryStore::new();
        let id = store.insert_schedule(schedule()).unwrap();

        let mut s = store.schedule(id).unwrap().unwrap();
        s.deleted = true;
        store.update_schedule(&s).unwrap();

        assert!(store.schedule(id).unwrap().is_none());
        assert!(store.schedules_by_signature(&schedule()).unwrap().is_empty());
    }

    #[test]
    fn trip_uniqueness_constraint() {
        let store = MemoryStore::new();
        let day = date(2024, 3, 4);
        let start = instant("2024-03-04T00:00:00Z");

        store.insert_trip(trip(1, day, start)).unwrap();

        let err = store.insert_trip(trip(1, day, start)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTrip { .. }));

        // Different key components are fine.
        store.insert_trip(trip(2, day, start)).unwrap();
        store
            .insert_trip(trip(1, day, instant("2024-03-04T01:00:00Z")))
            .unwrap();

        assert_eq!(store.live_trip_count(), 3);
    }

    #[test]
    fn soft_deleted_trip_frees_its_key() {
        let store = MemoryStore::new();
        let day = date(2024, 3, 4);
        let start = instant("2024-03-04T00:00:00Z");

        let stored = store.insert_trip(trip(1, day, start)).unwrap();
        store.soft_delete_trip(stored.id).unwrap();

        assert!(store.trip_by_key(RouteId(1), day, start).unwrap().is_none());
        assert!(store.trip(stored.id).unwrap().is_none());

        // The key is reusable once the holder is soft-deleted.
        store.insert_trip(trip(1, day, start)).unwrap();
    }

    #[test]
    fn stale_trip_write_is_rejected() {
        let store = MemoryStore::new();
        let stored = store
            .insert_trip(trip(1, date(2024, 3, 4), instant("2024-03-04T00:00:00Z")))
            .unwrap();

        // Two readers take copies at the same version.
        let mut first = store.trip(stored.id).unwrap().unwrap();
        let mut second = store.trip(stored.id).unwrap().unwrap();

        first.status = TripStatus::Cancelled;
        let written = store.update_trip(&first).unwrap();
        assert_eq!(written.version, first.version + 1);

        // The second copy is now stale and must not overwrite.
        second.status = TripStatus::InProgress;
        let err = store.update_trip(&second).unwrap_err();
        assert!(matches!(err, StoreError::Stale(_)));
        assert_eq!(
            store.trip(stored.id).unwrap().unwrap().status,
            TripStatus::Cancelled
        );

        // Rereading picks up the bumped version and the write goes in.
        let mut reread = store.trip(stored.id).unwrap().unwrap();
        reread.deleted = false;
        store.update_trip(&reread).unwrap();
    }

    #[test]
    fn trips_by_schedule_and_date_filters_on_snapshot() {
        let store = MemoryStore::new();
        let day = date(2024, 3, 4);

        let mut other = trip(1, day, instant("2024-03-04T00:00:00Z"));
        other.snapshot.schedule_id = ScheduleId(2);
        store.insert_trip(other).unwrap();
        store
            .insert_trip(trip(2, day, instant("2024-03-04T00:00:00Z")))
            .unwrap();

        let found = store
            .trips_by_schedule_and_date(ScheduleId(1), day)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].route_id, RouteId(2));
    }

    #[test]
    fn notification_capture_and_failure() {
        let store = MemoryStore::new();

        store
            .notify(ScheduleEvent::Updated {
                schedule_id: ScheduleId(1),
                name: "Morning run".into(),
            })
            .unwrap();
        assert_eq!(
            store.notifications(),
            vec![r#"{"Updated":{"schedule_id":1,"name":"Morning run"}}"#.to_string()]
        );

        store.set_notifications_fail(true);
        assert!(store
            .notify(ScheduleEvent::Updated {
                schedule_id: ScheduleId(1),
                name: "Morning run".into(),
            })
            .is_err());
        assert_eq!(store.notifications().len(), 1);
    }
}
