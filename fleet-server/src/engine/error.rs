//! Engine error taxonomy.
//!
//! Three caller-visible families plus store passthrough. Validation
//! errors are always raised before any persistence write; conflicts
//! are detected against current persisted state; per-date skips during
//! generation are control flow, never errors.

use chrono::NaiveDate;

use crate::domain::{
    InvalidRecurrenceRule, InvalidTimeOfDay, ScheduleId, TripStatus, ZonedWindowError,
};
use crate::store::StoreError;

/// A structurally invalid input, rejected before any write.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid {field} time: {source}")]
    InvalidTime {
        field: &'static str,
        source: InvalidTimeOfDay,
    },

    #[error("unresolvable timezone id: {0}")]
    UnknownTimezone(String),

    #[error(transparent)]
    InvalidRule(#[from] InvalidRecurrenceRule),

    #[error("start and end time must differ")]
    StartEqualsEnd,

    #[error("effective range is inverted: {from} is not before {to}")]
    InvertedEffectiveRange { from: NaiveDate, to: NaiveDate },

    #[error("generation window is inverted: {start} is after {end}")]
    InvertedWindow { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Window(#[from] ZonedWindowError),
}

/// A request that contradicts current persisted state.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConflictError {
    /// Another non-deleted schedule has the same (name, times,
    /// timezone, rule) signature with an intersecting effective window.
    #[error("duplicate schedule: conflicts with schedule {existing}")]
    DuplicateSchedule { existing: ScheduleId },

    /// The transition is not in the allowed-transition table.
    #[error("illegal status transition: {from} -> {to}")]
    IllegalTransition { from: TripStatus, to: TripStatus },
}

/// Top-level engine error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// A referenced schedule, trip, or stop is missing or inactive.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::UnknownTimezone("Mars/Olympus".into());
        assert_eq!(err.to_string(), "unresolvable timezone id: Mars/Olympus");

        let err = ConflictError::IllegalTransition {
            from: TripStatus::Completed,
            to: TripStatus::Scheduled,
        };
        assert_eq!(
            err.to_string(),
            "illegal status transition: Completed -> Scheduled"
        );

        let err = EngineError::NotFound("schedule 7".into());
        assert_eq!(err.to_string(), "not found: schedule 7");
    }

    #[test]
    fn validation_wraps_transparently() {
        let rule_err = crate::domain::RecurrenceRule::parse("FREQ=YEARLY").unwrap_err();
        let err: EngineError = ValidationError::from(rule_err.clone()).into();
        assert_eq!(err.to_string(), rule_err.to_string());
    }
}
