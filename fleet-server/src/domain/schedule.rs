//! Schedule templates and their per-date adjustments.
//!
//! A `Schedule` is a reusable recurring time template: a local
//! time-of-day window, a timezone, a recurrence rule, and an effective
//! date range. Exceptions suppress single dates entirely; overrides
//! replace (or cancel) the window on single dates while keeping an
//! audit trail of who changed what.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use super::{RecurrenceRule, ScheduleId, TimeOfDay};

/// A date-scoped replacement or cancellation of a schedule's window.
///
/// Overrides are audit records: they keep the reason, author, and
/// creation instant, and those fields are copied onto any trip
/// generated from the override.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeOverride {
    /// The calendar date this override applies to.
    pub date: NaiveDate,
    /// Replacement start time; falls back to the schedule default.
    pub start: Option<TimeOfDay>,
    /// Replacement end time; falls back to the schedule default.
    pub end: Option<TimeOfDay>,
    /// When set, generation for this date is suppressed entirely.
    pub cancelled: bool,
    /// Why the override was made.
    pub reason: String,
    /// Who made the override.
    pub author: String,
    /// When the override was recorded.
    pub created_at: DateTime<Utc>,
}

/// Schedule fields frozen into a trip at generation time.
///
/// Trips must remain a faithful record of what was planned even if the
/// schedule template is edited afterwards, so generation copies these
/// fields rather than referencing the live schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    pub schedule_id: ScheduleId,
    pub name: String,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    /// Canonical rule string as of generation time.
    pub rule: String,
    /// IANA timezone id as of generation time.
    pub timezone: String,
}

/// A recurring service template.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: String,
    /// Local start of the service window.
    pub start: TimeOfDay,
    /// Local end of the service window. May be "before" `start`, in
    /// which case the window crosses midnight.
    pub end: TimeOfDay,
    pub timezone: Tz,
    pub rule: RecurrenceRule,
    pub effective_from: NaiveDate,
    /// Last effective date, inclusive. `None` means open-ended.
    pub effective_to: Option<NaiveDate>,
    /// Full-day skip dates, kept sorted.
    pub exceptions: Vec<NaiveDate>,
    pub overrides: Vec<TimeOverride>,
    pub active: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    /// Is this date suppressed by an exception?
    pub fn is_exception(&self, date: NaiveDate) -> bool {
        self.exceptions.binary_search(&date).is_ok()
    }

    /// Add an exception date, keeping the list sorted and deduplicated.
    pub fn add_exception(&mut self, date: NaiveDate) {
        if let Err(pos) = self.exceptions.binary_search(&date) {
            self.exceptions.insert(pos, date);
        }
    }

    /// The override applying to this exact date, if any.
    ///
    /// When several overrides exist for one date, the most recently
    /// created wins: a later-arriving override supersedes earlier ones.
    pub fn override_for(&self, date: NaiveDate) -> Option<&TimeOverride> {
        self.overrides
            .iter()
            .filter(|o| o.date == date)
            .max_by_key(|o| o.created_at)
    }

    /// Clip a requested date window to this schedule's effective range.
    ///
    /// Returns `None` when the clipped window is empty.
    pub fn clip_window(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<(NaiveDate, NaiveDate)> {
        let clipped_start = start.max(self.effective_from);
        let clipped_end = match self.effective_to {
            Some(to) => end.min(to),
            None => end,
        };
        if clipped_start > clipped_end {
            None
        } else {
            Some((clipped_start, clipped_end))
        }
    }

    /// Do two schedules share the duplicate-detection signature?
    ///
    /// The signature is (name, start, end, timezone, rule); two
    /// non-deleted schedules with the same signature and intersecting
    /// effective windows are duplicates.
    pub fn signature_matches(&self, other: &Schedule) -> bool {
        self.name == other.name
            && self.start == other.start
            && self.end == other.end
            && self.timezone == other.timezone
            && self.rule == other.rule
    }

    /// Do the effective windows of two schedules intersect?
    pub fn effective_window_intersects(&self, other: &Schedule) -> bool {
        let self_to = self.effective_to.unwrap_or(NaiveDate::MAX);
        let other_to = other.effective_to.unwrap_or(NaiveDate::MAX);
        self.effective_from <= other_to && other.effective_from <= self_to
    }

    /// Freeze the fields a generated trip needs to remember.
    pub fn snapshot(&self) -> ScheduleSnapshot {
        ScheduleSnapshot {
            schedule_id: self.id,
            name: self.name.clone(),
            start: self.start,
            end: self.end,
            rule: self.rule.to_string(),
            timezone: self.timezone.name().to_string(),
        }
    }
}
