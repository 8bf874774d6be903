//! Trip status transitions and attendance recording.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::error::{ConflictError, EngineError};
use crate::domain::{
    Attendance, AttendanceState, PickupPointId, RouteId, StudentId, TransitionTable, Trip, TripId,
    TripStatus,
};
use crate::store::{StoreError, TripStore};

/// Drives trips through their status machine and records per-stop
/// attendance.
pub struct TripLifecycle<'a, S> {
    store: &'a S,
    table: TransitionTable,
}

impl<'a, S> TripLifecycle<'a, S>
where
    S: TripStore,
{
    pub fn new(store: &'a S, table: TransitionTable) -> Self {
        Self { store, table }
    }

    /// Transition a trip to a new status, stamping actuals as of now.
    pub fn transition(&self, trip_id: TripId, to: TripStatus) -> Result<Trip, EngineError> {
        self.transition_at(trip_id, to, Utc::now())
    }

    /// Transition a trip to a new status at an explicit instant.
    ///
    /// Moving into InProgress stamps `started_at`; moving into
    /// Completed stamps `ended_at`. A stamp already present is left
    /// untouched, so replaying a transition request cannot rewrite the
    /// recorded actuals.
    ///
    /// Concurrent transitions on one trip serialize: the write carries
    /// the version the trip was read at, and a stale write makes the
    /// whole read-check-write repeat against the winner's result. The
    /// loser of a race therefore re-validates against the new status
    /// instead of silently overwriting it.
    pub fn transition_at(
        &self,
        trip_id: TripId,
        to: TripStatus,
        at: DateTime<Utc>,
    ) -> Result<Trip, EngineError> {
        loop {
            let mut trip = self
                .store
                .trip(trip_id)?
                .ok_or_else(|| EngineError::NotFound(format!("trip {trip_id}")))?;

            if !self.table.allows(trip.status, to) {
                return Err(ConflictError::IllegalTransition {
                    from: trip.status,
                    to,
                }
                .into());
            }

            let from = trip.status;
            trip.status = to;
            match to {
                TripStatus::InProgress if trip.started_at.is_none() => trip.started_at = Some(at),
                TripStatus::Completed if trip.ended_at.is_none() => trip.ended_at = Some(at),
                _ => {}
            }

            match self.store.update_trip(&trip) {
                Ok(stored) => {
                    info!(trip_id = %trip_id, %from, %to, "trip transitioned");
                    return Ok(stored);
                }
                Err(StoreError::Stale(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Record a student's attendance state at a stop, as of now.
    pub fn record_attendance(
        &self,
        trip_id: TripId,
        pickup: PickupPointId,
        student: StudentId,
        state: AttendanceState,
    ) -> Result<Trip, EngineError> {
        self.record_attendance_at(trip_id, pickup, student, state, Utc::now())
    }

    /// Record a student's attendance state at a stop.
    ///
    /// Upserts by student within the stop: a repeated report replaces
    /// the state rather than appending a second record. Any state that
    /// denotes presence stamps the boarding instant, and alighting
    /// stamps the alighting instant, once each; a direct Alighted
    /// report with no prior Boarded therefore records both. Writes are
    /// version-checked and retried like status transitions.
    pub fn record_attendance_at(
        &self,
        trip_id: TripId,
        pickup: PickupPointId,
        student: StudentId,
        state: AttendanceState,
        at: DateTime<Utc>,
    ) -> Result<Trip, EngineError> {
        loop {
            let mut trip = self
                .store
                .trip(trip_id)?
                .ok_or_else(|| EngineError::NotFound(format!("trip {trip_id}")))?;

            let stop = trip.stop_by_pickup_mut(pickup).ok_or_else(|| {
                EngineError::NotFound(format!("pickup point {pickup} on trip {trip_id}"))
            })?;

            match stop.attendance.iter_mut().find(|a| a.student_id == student) {
                Some(record) => {
                    record.state = state;
                    if state.denotes_presence() && record.boarded_at.is_none() {
                        record.boarded_at = Some(at);
                    }
                    if state == AttendanceState::Alighted && record.alighted_at.is_none() {
                        record.alighted_at = Some(at);
                    }
                }
                None => {
                    stop.attendance.push(Attendance {
                        student_id: student,
                        state,
                        boarded_at: state.denotes_presence().then_some(at),
                        alighted_at: (state == AttendanceState::Alighted).then_some(at),
                    });
                }
            }

            match self.store.update_trip(&trip) {
                Ok(stored) => return Ok(stored),
                Err(StoreError::Stale(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Cancel every still-scheduled trip on a route, best-effort.
    ///
    /// Used when a route is deactivated or removed. Trips already in
    /// progress or finished are left alone; a store failure on one trip
    /// is logged and the sweep continues. Returns how many trips were
    /// cancelled.
    pub fn cancel_route_trips(&self, route_id: RouteId) -> Result<usize, EngineError> {
        let trips = self.store.trips_by_route(route_id)?;
        let mut cancelled = 0;
        for trip in trips {
            if trip.status != TripStatus::Scheduled {
                continue;
            }
            match self.transition(trip.id, TripStatus::Cancelled) {
                Ok(_) => cancelled += 1,
                Err(e) => {
                    warn!(trip_id = %trip.id, error = %e, "failed to cancel trip, continuing");
                }
            }
        }
        info!(route_id = %route_id, cancelled, "cancelled scheduled trips for route");
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RecurrenceRule, Schedule, ScheduleId, TimeOfDay};
    use crate::engine::{GeneratorConfig, TripGenerator};
    use crate::store::{BindingStore, MemoryStore, PickupPoint, Route, ScheduleStore};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Generate one real trip to exercise the lifecycle against.
    fn seeded_trip(store: &MemoryStore) -> Trip {
        let schedule_id = store
            .insert_schedule(Schedule {
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
            })
            .unwrap();
        store.put_route(Route {
            id: RouteId(1),
            active: true,
            pickup_points: vec![
                PickupPoint {
                    id: PickupPointId(11),
                    latitude: 10.76,
                    longitude: 106.66,
                    address: "Stop A".into(),
                },
                PickupPoint {
                    id: PickupPointId(12),
                    latitude: 10.77,
                    longitude: 106.67,
                    address: "Stop B".into(),
                },
            ],
        });
        store
            .insert_binding(crate::domain::RouteBinding {
                id: crate::domain::BindingId(0),
                route_id: RouteId(1),
                schedule_id,
                effective_from: date(2024, 3, 1),
                effective_to: None,
                priority: 1,
                active: true,
                created_at: Utc::now(),
            })
            .unwrap();

        let generator = TripGenerator::new(store, GeneratorConfig::default());
        generator
            .generate(schedule_id, date(2024, 3, 4), date(2024, 3, 4))
            .unwrap()
            .remove(0)
    }

    #[test]
    fn full_forward_lifecycle_stamps_actuals() {
        let store = MemoryStore::new();
        let trip = seeded_trip(&store);
        let lifecycle = TripLifecycle::new(&store, TransitionTable::default());

        let started = Utc::now();
        let trip = lifecycle
            .transition_at(trip.id, TripStatus::InProgress, started)
            .unwrap();
        assert_eq!(trip.status, TripStatus::InProgress);
        assert_eq!(trip.started_at, Some(started));
        assert!(trip.ended_at.is_none());

        let ended = started + chrono::Duration::minutes(80);
        let trip = lifecycle
            .transition_at(trip.id, TripStatus::Completed, ended)
            .unwrap();
        assert_eq!(trip.status, TripStatus::Completed);
        assert_eq!(trip.started_at, Some(started));
        assert_eq!(trip.ended_at, Some(ended));
    }

    #[test]
    fn illegal_transitions_are_conflicts() {
        let store = MemoryStore::new();
        let trip = seeded_trip(&store);
        let lifecycle = TripLifecycle::new(&store, TransitionTable::default());

        let err = lifecycle
            .transition(trip.id, TripStatus::Completed)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Conflict(ConflictError::IllegalTransition {
                from: TripStatus::Scheduled,
                to: TripStatus::Completed,
            })
        ));

        // Terminal states admit nothing.
        lifecycle.transition(trip.id, TripStatus::Cancelled).unwrap();
        let err = lifecycle
            .transition(trip.id, TripStatus::InProgress)
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    /// Forwards to a [`MemoryStore`] but holds the first two readers at
    /// a barrier, so both observe the same trip version before either
    /// writes.
    struct RendezvousStore {
        inner: MemoryStore,
        gate: std::sync::Barrier,
        reads: std::sync::atomic::AtomicUsize,
    }

    impl TripStore for RendezvousStore {
        fn trip_by_key(
            &self,
            route_id: RouteId,
            service_date: NaiveDate,
            planned_start_at: DateTime<Utc>,
        ) -> Result<Option<Trip>, StoreError> {
            self.inner.trip_by_key(route_id, service_date, planned_start_at)
        }

        fn trip(&self, id: TripId) -> Result<Option<Trip>, StoreError> {
            let trip = self.inner.trip(id)?;
            if self
                .reads
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                < 2
            {
                self.gate.wait();
            }
            Ok(trip)
        }

        fn insert_trip(&self, trip: Trip) -> Result<Trip, StoreError> {
            self.inner.insert_trip(trip)
        }

        fn update_trip(&self, trip: &Trip) -> Result<Trip, StoreError> {
            self.inner.update_trip(trip)
        }

        fn trips_by_route(&self, route_id: RouteId) -> Result<Vec<Trip>, StoreError> {
            self.inner.trips_by_route(route_id)
        }

        fn trips_by_schedule_and_date(
            &self,
            schedule_id: ScheduleId,
            date: NaiveDate,
        ) -> Result<Vec<Trip>, StoreError> {
            self.inner.trips_by_schedule_and_date(schedule_id, date)
        }

        fn soft_delete_trip(&self, id: TripId) -> Result<(), StoreError> {
            self.inner.soft_delete_trip(id)
        }
    }

    #[test]
    fn racing_transitions_leave_exactly_one_winner() {
        let store = MemoryStore::new();
        let trip = seeded_trip(&store);
        let lifecycle = TripLifecycle::new(&store, TransitionTable::default());
        lifecycle
            .transition(trip.id, TripStatus::InProgress)
            .unwrap();

        let store = RendezvousStore {
            inner: store,
            gate: std::sync::Barrier::new(2),
            reads: std::sync::atomic::AtomicUsize::new(0),
        };
        let lifecycle = TripLifecycle::new(&store, TransitionTable::default());

        let (completed, cancelled) = std::thread::scope(|s| {
            let complete = s.spawn(|| lifecycle.transition(trip.id, TripStatus::Completed));
            let cancel = s.spawn(|| lifecycle.transition(trip.id, TripStatus::Cancelled));
            (complete.join().unwrap(), cancel.join().unwrap())
        });

        // Exactly one write lands; the loser rereads the terminal
        // status and is turned away instead of overwriting it.
        assert_eq!(
            completed.is_ok() as usize + cancelled.is_ok() as usize,
            1,
            "completed: {completed:?}, cancelled: {cancelled:?}"
        );
        let (winner, loser) = if completed.is_ok() {
            (TripStatus::Completed, cancelled)
        } else {
            (TripStatus::Cancelled, completed)
        };
        assert!(matches!(
            loser.unwrap_err(),
            EngineError::Conflict(ConflictError::IllegalTransition { .. })
        ));

        let stored = store.inner.trip(trip.id).unwrap().unwrap();
        assert_eq!(stored.status, winner);
    }

    #[test]
    fn missing_trip_is_not_found() {
        let store = MemoryStore::new();
        let lifecycle = TripLifecycle::new(&store, TransitionTable::default());

        let err = lifecycle
            .transition(TripId(99), TripStatus::InProgress)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn attendance_upserts_by_student() {
        let store = MemoryStore::new();
        let trip = seeded_trip(&store);
        let lifecycle = TripLifecycle::new(&store, TransitionTable::default());

        let t0 = Utc::now();
        lifecycle
            .record_attendance_at(
                trip.id,
                PickupPointId(11),
                StudentId(7),
                AttendanceState::Expected,
                t0,
            )
            .unwrap();
        let updated = lifecycle
            .record_attendance_at(
                trip.id,
                PickupPointId(11),
                StudentId(7),
                AttendanceState::Boarded,
                t0 + chrono::Duration::minutes(2),
            )
            .unwrap();

        let stop = &updated.stops[0];
        assert_eq!(stop.attendance.len(), 1);
        let record = &stop.attendance[0];
        assert_eq!(record.state, AttendanceState::Boarded);
        assert_eq!(record.boarded_at, Some(t0 + chrono::Duration::minutes(2)));
        assert!(record.alighted_at.is_none());
    }

    #[test]
    fn boarding_stamp_survives_later_states() {
        let store = MemoryStore::new();
        let trip = seeded_trip(&store);
        let lifecycle = TripLifecycle::new(&store, TransitionTable::default());

        let boarded = Utc::now();
        lifecycle
            .record_attendance_at(
                trip.id,
                PickupPointId(11),
                StudentId(7),
                AttendanceState::Boarded,
                boarded,
            )
            .unwrap();
        let updated = lifecycle
            .record_attendance_at(
                trip.id,
                PickupPointId(11),
                StudentId(7),
                AttendanceState::Alighted,
                boarded + chrono::Duration::minutes(30),
            )
            .unwrap();

        let record = &updated.stops[0].attendance[0];
        assert_eq!(record.state, AttendanceState::Alighted);
        assert_eq!(record.boarded_at, Some(boarded));
        assert_eq!(
            record.alighted_at,
            Some(boarded + chrono::Duration::minutes(30))
        );
    }

    #[test]
    fn direct_alighted_report_stamps_boarding_too() {
        let store = MemoryStore::new();
        let trip = seeded_trip(&store);
        let lifecycle = TripLifecycle::new(&store, TransitionTable::default());

        // The boarding report was missed; the alighting report alone
        // still proves the student was aboard.
        let at = Utc::now();
        let updated = lifecycle
            .record_attendance_at(
                trip.id,
                PickupPointId(12),
                StudentId(3),
                AttendanceState::Alighted,
                at,
            )
            .unwrap();

        let record = &updated.stops[1].attendance[0];
        assert_eq!(record.state, AttendanceState::Alighted);
        assert_eq!(record.boarded_at, Some(at));
        assert_eq!(record.alighted_at, Some(at));
    }

    #[test]
    fn attendance_on_unknown_stop_is_not_found() {
        let store = MemoryStore::new();
        let trip = seeded_trip(&store);
        let lifecycle = TripLifecycle::new(&store, TransitionTable::default());

        let err = lifecycle
            .record_attendance(
                trip.id,
                PickupPointId(999),
                StudentId(7),
                AttendanceState::Boarded,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn cancel_route_trips_only_touches_scheduled() {
        let store = MemoryStore::new();
        let trip = seeded_trip(&store);
        let lifecycle = TripLifecycle::new(&store, TransitionTable::default());

        // Generate a second day and start one of the two trips.
        let generator = TripGenerator::new(&store, GeneratorConfig::default());
        let more = generator
            .generate(trip.snapshot.schedule_id, date(2024, 3, 5), date(2024, 3, 5))
            .unwrap();
        lifecycle
            .transition(more[0].id, TripStatus::InProgress)
            .unwrap();

        let cancelled = lifecycle.cancel_route_trips(RouteId(1)).unwrap();
        assert_eq!(cancelled, 1);

        let running = store.trip(more[0].id).unwrap().unwrap();
        assert_eq!(running.status, TripStatus::InProgress);
        let swept = store.trip(trip.id).unwrap().unwrap();
        assert_eq!(swept.status, TripStatus::Cancelled);
    }

    #[test]
    fn cancel_route_trips_with_no_trips_is_zero() {
        let store = MemoryStore::new();
        let lifecycle = TripLifecycle::new(&store, TransitionTable::default());
        assert_eq!(lifecycle.cancel_route_trips(RouteId(5)).unwrap(), 0);
    }
}
