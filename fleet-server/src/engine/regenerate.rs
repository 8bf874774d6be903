//! Single-date override application and trip regeneration.

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use super::config::GeneratorConfig;
use super::error::{EngineError, ValidationError};
use super::generator::TripGenerator;
use crate::domain::{ScheduleId, TimeOfDay, TimeOverride, Trip, TripStatus};
use crate::store::{BindingStore, RouteProvider, ScheduleStore, TripStore};

/// Wire-format request to override (or cancel) one service date.
#[derive(Debug, Clone)]
pub struct OverrideRequest {
    pub date: NaiveDate,
    /// Replacement start time, "HH:mm" or "HH:mm:ss"; `None` keeps the
    /// schedule default.
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// When true the date is cancelled outright and the times are
    /// ignored.
    pub cancelled: bool,
    pub reason: String,
    pub author: String,
}

/// Applies a date override to a schedule and replays that date's trips.
///
/// The sequence is: record the override on the schedule, soft-delete
/// the still-scheduled trips previously generated for that date, then
/// regenerate the date so it reflects the override. Trips that have
/// already started or finished are historical record and are left
/// untouched.
pub struct RegenerationCoordinator<'a, S> {
    store: &'a S,
    config: GeneratorConfig,
}

impl<'a, S> RegenerationCoordinator<'a, S>
where
    S: ScheduleStore + BindingStore + TripStore + RouteProvider,
{
    pub fn new(store: &'a S, config: GeneratorConfig) -> Self {
        Self { store, config }
    }

    /// Apply an override and regenerate the affected date.
    ///
    /// Returns the trips created by the regeneration (empty when the
    /// override cancels the date).
    pub fn apply_override(
        &self,
        schedule_id: ScheduleId,
        request: OverrideRequest,
    ) -> Result<Vec<Trip>, EngineError> {
        let mut schedule = self
            .store
            .schedule(schedule_id)?
            .ok_or_else(|| EngineError::NotFound(format!("schedule {schedule_id}")))?;

        let start = request
            .start_time
            .as_deref()
            .map(TimeOfDay::parse)
            .transpose()
            .map_err(|source| ValidationError::InvalidTime {
                field: "start",
                source,
            })?;
        let end = request
            .end_time
            .as_deref()
            .map(TimeOfDay::parse)
            .transpose()
            .map_err(|source| ValidationError::InvalidTime {
                field: "end",
                source,
            })?;

        schedule.overrides.push(TimeOverride {
            date: request.date,
            start,
            end,
            cancelled: request.cancelled,
            reason: request.reason,
            author: request.author,
            created_at: Utc::now(),
        });
        self.store.update_schedule(&schedule)?;
        info!(
            schedule_id = %schedule_id,
            date = %request.date,
            cancelled = request.cancelled,
            "override recorded"
        );

        let removed = self.retire_scheduled_trips(schedule_id, request.date)?;
        debug!(
            schedule_id = %schedule_id,
            date = %request.date,
            removed,
            "retired previously generated trips"
        );

        let generator = TripGenerator::new(self.store, self.config.clone());
        generator.generate(schedule_id, request.date, request.date)
    }

    /// Non-deleted trips generated from a schedule for one date.
    pub fn trips_for(
        &self,
        schedule_id: ScheduleId,
        date: NaiveDate,
    ) -> Result<Vec<Trip>, EngineError> {
        Ok(self.store.trips_by_schedule_and_date(schedule_id, date)?)
    }

    /// Soft-delete the date's trips that are still merely scheduled.
    fn retire_scheduled_trips(
        &self,
        schedule_id: ScheduleId,
        date: NaiveDate,
    ) -> Result<usize, EngineError> {
        let trips = self.store.trips_by_schedule_and_date(schedule_id, date)?;
        let mut removed = 0;
        for trip in trips {
            if trip.status != TripStatus::Scheduled {
                continue;
            }
            self.store.soft_delete_trip(trip.id)?;
            removed += 1;
        }
        Ok(removed)
    }
}
