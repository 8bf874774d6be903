//! Expansion of schedules into concrete trips over a date window.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use tracing::{debug, warn};

use super::binder::BindingResolver;
use super::config::GeneratorConfig;
use super::error::{EngineError, ValidationError};
use crate::domain::{RouteId, Schedule, ScheduleId, Trip, TripId, TripStatus, TripStop, zoned_window};
use crate::store::{
    BindingStore, Route, RouteProvider, ScheduleStore, StoreError, TripStore,
};

/// Expands a schedule over a date window into persisted trips.
///
/// Generation is idempotent: re-running the same window creates no
/// duplicates, because every candidate is checked against the trip
/// store's `(route, service date, planned start)` uniqueness key. Dates
/// and routes that cannot produce a trip are skipped with a log line,
/// never an error; only malformed input, a missing schedule, or a
/// failing store aborts the run.
pub struct TripGenerator<'a, S> {
    store: &'a S,
    config: GeneratorConfig,
}

impl<'a, S> TripGenerator<'a, S>
where
    S: ScheduleStore + BindingStore + TripStore + RouteProvider,
{
    pub fn new(store: &'a S, config: GeneratorConfig) -> Self {
        Self { store, config }
    }

    /// Generate trips for a schedule across `[start, end]` (inclusive).
    ///
    /// Returns only the trips created by this run; occurrences that
    /// already existed are not included.
    pub fn generate(
        &self,
        schedule_id: ScheduleId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Trip>, EngineError> {
        if start > end {
            return Err(ValidationError::InvertedWindow { start, end }.into());
        }

        let schedule = self
            .store
            .schedule(schedule_id)?
            .ok_or_else(|| EngineError::NotFound(format!("schedule {schedule_id}")))?;

        if !schedule.active {
            debug!(schedule_id = %schedule_id, "schedule inactive, nothing to generate");
            return Ok(Vec::new());
        }

        let Some((start, end)) = schedule.clip_window(start, end) else {
            debug!(
                schedule_id = %schedule_id,
                "window lies outside the schedule's effective range"
            );
            return Ok(Vec::new());
        };

        let resolver = BindingResolver::new(self.store.active_bindings_for_schedule(schedule_id)?);
        let routes = self.load_routes(&resolver)?;

        let mut created = Vec::new();
        let mut date = start;
        while date <= end {
            self.generate_date(&schedule, date, &resolver, &routes, &mut created)?;
            date = date
                .checked_add_days(Days::new(1))
                .ok_or_else(|| EngineError::NotFound(format!("date after {date}")))?;
        }

        Ok(created)
    }

    /// Fetch each bound route once for the whole run. Unknown and
    /// inactive routes are dropped here, with a warning, so the per-date
    /// loop only sees routes that can carry trips.
    fn load_routes(
        &self,
        resolver: &BindingResolver,
    ) -> Result<HashMap<RouteId, Route>, EngineError> {
        let mut routes = HashMap::new();
        for route_id in resolver.route_ids() {
            match self.store.route(route_id)? {
                Some(route) if route.active => {
                    routes.insert(route_id, route);
                }
                Some(_) => {
                    warn!(route_id = %route_id, "route inactive, skipping its bindings");
                }
                None => {
                    warn!(route_id = %route_id, "bound route does not exist, skipping");
                }
            }
        }
        Ok(routes)
    }

    fn generate_date(
        &self,
        schedule: &Schedule,
        date: NaiveDate,
        resolver: &BindingResolver,
        routes: &HashMap<RouteId, Route>,
        created: &mut Vec<Trip>,
    ) -> Result<(), EngineError> {
        if schedule.is_exception(date) {
            debug!(schedule_id = %schedule.id, %date, "exception date, skipping");
            return Ok(());
        }
        if !schedule.rule.matches(date) {
            return Ok(());
        }

        let time_override = schedule.override_for(date);
        if let Some(o) = time_override {
            if o.cancelled {
                debug!(schedule_id = %schedule.id, %date, "cancelled by override, skipping");
                return Ok(());
            }
        }
        let start_time = time_override
            .and_then(|o| o.start)
            .unwrap_or(schedule.start);
        let end_time = time_override.and_then(|o| o.end).unwrap_or(schedule.end);

        let (planned_start_at, planned_end_at) =
            zoned_window(date, start_time, end_time, schedule.timezone)
                .map_err(ValidationError::from)?;

        for route_id in resolver.route_ids() {
            let Some(route) = routes.get(&route_id) else {
                continue;
            };
            if resolver.winning(route_id, date).is_none() {
                continue;
            }

            // Fast path; the insert below still enforces uniqueness.
            if self
                .store
                .trip_by_key(route_id, date, planned_start_at)?
                .is_some()
            {
                continue;
            }

            if route.pickup_points.is_empty() {
                warn!(route_id = %route_id, %date, "route has no pickup points, trip has no stops");
            }

            let stops = route
                .pickup_points
                .iter()
                .enumerate()
                .map(|(i, p)| TripStop {
                    sequence: i as u32,
                    pickup_point_id: p.id,
                    planned_arrival_at: planned_start_at + self.config.stop_interval() * i as i32,
                    latitude: p.latitude,
                    longitude: p.longitude,
                    address: p.address.clone(),
                    attendance: Vec::new(),
                })
                .collect();

            let trip = Trip {
                id: TripId(0),
                route_id,
                service_date: date,
                planned_start_at,
                planned_end_at,
                started_at: None,
                ended_at: None,
                status: TripStatus::Scheduled,
                snapshot: schedule.snapshot(),
                is_override: time_override.is_some(),
                override_reason: time_override.map(|o| o.reason.clone()),
                override_author: time_override.map(|o| o.author.clone()),
                override_recorded_at: time_override.map(|o| o.created_at),
                deleted: false,
                version: 0,
                stops,
            };

            match self.store.insert_trip(trip) {
                Ok(inserted) => created.push(inserted),
                Err(StoreError::DuplicateTrip { .. }) => {
                    debug!(route_id = %route_id, %date, "trip already exists, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}
