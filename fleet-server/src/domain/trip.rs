//! Generated trips, their stops, and the trip status state machine.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

use super::{PickupPointId, RouteId, ScheduleSnapshot, StudentId, TripId};

/// Error returned when parsing an unknown trip status token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

/// Lifecycle status of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TripStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    /// Wire token for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Scheduled => "Scheduled",
            TripStatus::InProgress => "InProgress",
            TripStatus::Completed => "Completed",
            TripStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Scheduled" => Ok(TripStatus::Scheduled),
            "InProgress" => Ok(TripStatus::InProgress),
            "Completed" => Ok(TripStatus::Completed),
            "Cancelled" => Ok(TripStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// The allowed-transition table for trip statuses.
///
/// Represented as an explicit `(from, to)` lookup rather than inline
/// conditionals so the state machine is independently testable and can
/// be reconfigured without touching call sites.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    allowed: Vec<(TripStatus, TripStatus)>,
}

impl TransitionTable {
    /// Build a table from explicit `(from, to)` pairs.
    pub fn new(pairs: impl IntoIterator<Item = (TripStatus, TripStatus)>) -> Self {
        Self {
            allowed: pairs.into_iter().collect(),
        }
    }

    /// Is the transition `from -> to` allowed?
    pub fn allows(&self, from: TripStatus, to: TripStatus) -> bool {
        self.allowed.iter().any(|&(f, t)| f == from && t == to)
    }
}

impl Default for TransitionTable {
    /// The standard lifecycle: a scheduled trip starts or is cancelled;
    /// a running trip completes or is cancelled; terminal states stay.
    fn default() -> Self {
        use TripStatus::*;
        Self::new([
            (Scheduled, InProgress),
            (Scheduled, Cancelled),
            (InProgress, Completed),
            (InProgress, Cancelled),
        ])
    }
}

/// Error returned when parsing an unknown attendance state token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown attendance state: {0}")]
pub struct UnknownAttendanceState(pub String);

/// Per-student attendance state at a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceState {
    /// Expected to board but not yet seen.
    Expected,
    Boarded,
    Alighted,
    Absent,
}

impl AttendanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceState::Expected => "Expected",
            AttendanceState::Boarded => "Boarded",
            AttendanceState::Alighted => "Alighted",
            AttendanceState::Absent => "Absent",
        }
    }

    /// Does this state mean the student is (or was) on board?
    pub fn denotes_presence(&self) -> bool {
        matches!(self, AttendanceState::Boarded | AttendanceState::Alighted)
    }
}

impl fmt::Display for AttendanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceState {
    type Err = UnknownAttendanceState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Expected" => Ok(AttendanceState::Expected),
            "Boarded" => Ok(AttendanceState::Boarded),
            "Alighted" => Ok(AttendanceState::Alighted),
            "Absent" => Ok(AttendanceState::Absent),
            other => Err(UnknownAttendanceState(other.to_string())),
        }
    }
}

/// One student's attendance record on a stop.
#[derive(Debug, Clone)]
pub struct Attendance {
    pub student_id: StudentId,
    pub state: AttendanceState,
    pub boarded_at: Option<DateTime<Utc>>,
    pub alighted_at: Option<DateTime<Utc>>,
}

/// One stop on a trip.
///
/// Stops are created once at trip generation from the route's ordered
/// pickup points, with the location frozen at that moment; they are
/// not regenerated when the trip is later updated.
#[derive(Debug, Clone)]
pub struct TripStop {
    /// Position in the route's pickup order, starting at 0.
    pub sequence: u32,
    pub pickup_point_id: PickupPointId,
    pub planned_arrival_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub attendance: Vec<Attendance>,
}

/// One concrete, dated occurrence of a schedule on a route.
#[derive(Debug, Clone)]
pub struct Trip {
    pub id: TripId,
    pub route_id: RouteId,
    pub service_date: NaiveDate,
    pub planned_start_at: DateTime<Utc>,
    pub planned_end_at: DateTime<Utc>,
    /// Actual start, stamped on transition into InProgress.
    pub started_at: Option<DateTime<Utc>>,
    /// Actual end, stamped on transition into Completed.
    pub ended_at: Option<DateTime<Utc>>,
    pub status: TripStatus,
    pub snapshot: ScheduleSnapshot,
    /// Whether this occurrence was produced from a time override.
    pub is_override: bool,
    pub override_reason: Option<String>,
    pub override_author: Option<String>,
    pub override_recorded_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    /// Optimistic-concurrency version. The store bumps it on every
    /// update and rejects writes carrying a stale value, so
    /// read-check-write sequences on one trip serialize.
    pub version: u64,
    /// Stops in route pickup order.
    pub stops: Vec<TripStop>,
}

impl Trip {
    /// The idempotency key: no two non-deleted trips may share it.
    pub fn key(&self) -> (RouteId, NaiveDate, DateTime<Utc>) {
        (self.route_id, self.service_date, self.planned_start_at)
    }

    /// The stop serving a pickup point, if the trip has one.
    pub fn stop_by_pickup_mut(&mut self, pickup: PickupPointId) -> Option<&mut TripStop> {
        self.stops
            .iter_mut()
            .find(|s| s.pickup_point_id == pickup)
    }
}
