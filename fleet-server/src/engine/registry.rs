//! Schedule validation and registration.

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::warn;

use super::error::{ConflictError, EngineError, ValidationError};
use crate::domain::{RecurrenceRule, Schedule, ScheduleId, TimeOfDay};
use crate::store::{NotificationSink, ScheduleEvent, ScheduleStore};

/// Wire-format input for creating or updating a schedule.
///
/// Times, timezone, and rule arrive as strings and are validated in
/// full before anything is written.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub name: String,
    /// "HH:mm" or "HH:mm:ss", local to `timezone`.
    pub start_time: String,
    pub end_time: String,
    /// IANA timezone id, e.g. "Asia/Ho_Chi_Minh".
    pub timezone: String,
    /// Recurrence rule string; empty means daily.
    pub recurrence_rule: String,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub active: bool,
}

/// Validates candidate schedules and persists them.
pub struct ScheduleRegistry<'a, S> {
    store: &'a S,
}

impl<'a, S> ScheduleRegistry<'a, S>
where
    S: ScheduleStore + NotificationSink,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Validate and store a new schedule.
    ///
    /// Fails with a ConflictError when another non-deleted schedule
    /// shares the (name, start, end, timezone, rule) signature with an
    /// intersecting effective window.
    pub fn create(&self, new: NewSchedule) -> Result<Schedule, EngineError> {
        let mut candidate = self.validate(&new)?;
        self.check_duplicate(&candidate, None)?;

        let id = self.store.insert_schedule(candidate.clone())?;
        candidate.id = id;
        Ok(candidate)
    }

    /// Validate and apply an update to an existing schedule.
    ///
    /// Exceptions, overrides, and the deletion flag carry over from
    /// the stored schedule; only the template fields are replaced.
    /// When the name, times, or rule changed, a change notification is
    /// emitted fire-and-forget: a sink failure is logged, never
    /// surfaced.
    pub fn update(&self, id: ScheduleId, new: NewSchedule) -> Result<Schedule, EngineError> {
        let existing = self
            .store
            .schedule(id)?
            .ok_or_else(|| EngineError::NotFound(format!("schedule {id}")))?;

        let candidate = self.validate(&new)?;
        self.check_duplicate(&candidate, Some(id))?;

        let materially_changed = existing.name != candidate.name
            || existing.start != candidate.start
            || existing.end != candidate.end
            || existing.rule != candidate.rule;

        let updated = Schedule {
            id,
            exceptions: existing.exceptions,
            overrides: existing.overrides,
            deleted: existing.deleted,
            created_at: existing.created_at,
            ..candidate
        };
        self.store.update_schedule(&updated)?;

        if materially_changed {
            let event = ScheduleEvent::Updated {
                schedule_id: id,
                name: updated.name.clone(),
            };
            if let Err(e) = self.store.notify(event) {
                warn!(schedule_id = %id, error = %e, "schedule change notification failed");
            }
        }

        Ok(updated)
    }

    /// Add a full-day exception date to a schedule.
    pub fn add_exception(&self, id: ScheduleId, date: NaiveDate) -> Result<Schedule, EngineError> {
        let mut schedule = self
            .store
            .schedule(id)?
            .ok_or_else(|| EngineError::NotFound(format!("schedule {id}")))?;

        schedule.add_exception(date);
        self.store.update_schedule(&schedule)?;
        Ok(schedule)
    }

    /// Parse and range-check every wire field; nothing is written.
    fn validate(&self, new: &NewSchedule) -> Result<Schedule, ValidationError> {
        let start = TimeOfDay::parse(&new.start_time)
            .map_err(|source| ValidationError::InvalidTime {
                field: "start",
                source,
            })?;
        let end = TimeOfDay::parse(&new.end_time).map_err(|source| ValidationError::InvalidTime {
            field: "end",
            source,
        })?;
        if start == end {
            return Err(ValidationError::StartEqualsEnd);
        }

        let timezone: Tz = new
            .timezone
            .parse()
            .map_err(|_| ValidationError::UnknownTimezone(new.timezone.clone()))?;

        let rule = RecurrenceRule::parse(&new.recurrence_rule)?;

        if let Some(to) = new.effective_to {
            if to <= new.effective_from {
                return Err(ValidationError::InvertedEffectiveRange {
                    from: new.effective_from,
                    to,
                });
            }
        }

        Ok(Schedule {
            id: ScheduleId(0),
            name: new.name.clone(),
            start,
            end,
            timezone,
            rule,
            effective_from: new.effective_from,
            effective_to: new.effective_to,
            exceptions: Vec::new(),
            overrides: Vec::new(),
            active: new.active,
            deleted: false,
            created_at: Utc::now(),
        })
    }

    /// Reject the candidate when a stored schedule duplicates it.
    fn check_duplicate(
        &self,
        candidate: &Schedule,
        updating: Option<ScheduleId>,
    ) -> Result<(), EngineError> {
        let twins = self.store.schedules_by_signature(candidate)?;
        for twin in twins {
            if Some(twin.id) == updating {
                continue;
            }
            if twin.effective_window_intersects(candidate) {
                return Err(ConflictError::DuplicateSchedule { existing: twin.id }.into());
            }
        }
        Ok(())
    }
}
