//! Domain types for schedule-driven trip generation.
//!
//! This module contains the core domain model. All types enforce their
//! invariants at construction time, so code that receives these types
//! can trust their validity: a `TimeOfDay` is always in range, a
//! `RecurrenceRule` is always well-formed, a `Schedule` held by the
//! engine has already passed registry validation.

mod binding;
mod ids;
mod recurrence;
mod schedule;
mod time;
mod trip;

pub use binding::RouteBinding;
pub use ids::{BindingId, PickupPointId, RouteId, ScheduleId, StudentId, TripId};
pub use recurrence::{InvalidRecurrenceRule, RecurrenceRule};
pub use schedule::{Schedule, ScheduleSnapshot, TimeOverride};
pub use time::{InvalidTimeOfDay, TimeOfDay, ZonedWindowError, zoned_window};
pub use trip::{
    Attendance, AttendanceState, TransitionTable, Trip, TripStatus, TripStop,
    UnknownAttendanceState, UnknownStatus,
};
