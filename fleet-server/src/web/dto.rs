//! Data transfer objects for web requests and responses.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Attendance, Schedule, Trip, TripStop};

/// Request to create or replace a schedule.
#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    /// Display name
    pub name: String,

    /// Local start time, "HH:mm" or "HH:mm:ss"
    pub start_time: String,

    /// Local end time; at or before start means the window crosses
    /// midnight
    pub end_time: String,

    /// IANA timezone id (e.g. "Asia/Ho_Chi_Minh")
    pub timezone: String,

    /// Recurrence rule (e.g. "FREQ=WEEKLY;BYDAY=MO,WE,FR"); empty or
    /// omitted means daily
    #[serde(default)]
    pub recurrence_rule: String,

    /// First effective service date
    pub effective_from: NaiveDate,

    /// Last effective service date, inclusive; omit for open-ended
    pub effective_to: Option<NaiveDate>,

    /// Whether the schedule generates trips (defaults to true)
    pub active: Option<bool>,
}

/// A schedule as returned to clients.
#[derive(Debug, Serialize)]
pub struct ScheduleResult {
    pub id: i64,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub timezone: String,
    pub recurrence_rule: String,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,

    /// Full-day skip dates
    pub exceptions: Vec<NaiveDate>,
    pub active: bool,
}

/// Request to add a full-day exception to a schedule.
#[derive(Debug, Deserialize)]
pub struct ExceptionRequest {
    pub date: NaiveDate,
}

/// Request to override (or cancel) a single service date.
#[derive(Debug, Deserialize)]
pub struct OverrideRequestBody {
    pub date: NaiveDate,

    /// Replacement start time; omit to keep the schedule default
    pub start_time: Option<String>,

    /// Replacement end time; omit to keep the schedule default
    pub end_time: Option<String>,

    /// Cancel the date outright (times are ignored)
    #[serde(default)]
    pub cancelled: bool,

    pub reason: String,
    pub author: String,
}

/// Request to generate trips across a date window.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// First service date, inclusive
    pub start: NaiveDate,

    /// Last service date, inclusive
    pub end: NaiveDate,
}

/// Query for a schedule's trips on one service date.
#[derive(Debug, Deserialize)]
pub struct TripsQuery {
    pub date: NaiveDate,
}

/// Request to register a route with the in-memory provider.
#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub id: i64,
    pub active: Option<bool>,

    /// Pickup points in service order
    pub pickup_points: Vec<PickupPointRequest>,
}

/// One pickup point on a route.
#[derive(Debug, Deserialize)]
pub struct PickupPointRequest {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

/// Request to bind a route to a schedule.
#[derive(Debug, Deserialize)]
pub struct BindingRequest {
    pub route_id: i64,
    pub schedule_id: i64,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,

    /// Higher priority wins when several bindings cover a date
    #[serde(default)]
    pub priority: i32,
    pub active: Option<bool>,
}

/// Request to move a trip to a new status.
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    /// Target status ("Scheduled", "InProgress", "Completed",
    /// "Cancelled")
    pub status: String,
}

/// Request to record a student's attendance at a stop.
#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub pickup_point_id: i64,
    pub student_id: i64,

    /// Attendance state ("Expected", "Boarded", "Alighted", "Absent")
    pub state: String,
}

/// A trip as returned to clients.
#[derive(Debug, Serialize)]
pub struct TripResult {
    pub id: i64,
    pub route_id: i64,
    pub service_date: NaiveDate,
    pub planned_start_at: DateTime<Utc>,
    pub planned_end_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: String,

    /// Schedule fields frozen at generation time
    pub schedule: SnapshotResult,
    pub is_override: bool,
    pub override_reason: Option<String>,
    pub override_author: Option<String>,
    pub stops: Vec<StopResult>,
}

/// The frozen schedule snapshot on a trip.
#[derive(Debug, Serialize)]
pub struct SnapshotResult {
    pub schedule_id: i64,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub recurrence_rule: String,
    pub timezone: String,
}

/// One stop on a trip.
#[derive(Debug, Serialize)]
pub struct StopResult {
    pub sequence: u32,
    pub pickup_point_id: i64,
    pub planned_arrival_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub attendance: Vec<AttendanceResult>,
}

/// One student's attendance record at a stop.
#[derive(Debug, Serialize)]
pub struct AttendanceResult {
    pub student_id: i64,
    pub state: String,
    pub boarded_at: Option<DateTime<Utc>>,
    pub alighted_at: Option<DateTime<Utc>>,
}

/// Response for trip generation and regeneration.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// Trips created by this run
    pub trips: Vec<TripResult>,
}

/// Response listing trips.
#[derive(Debug, Serialize)]
pub struct TripListResponse {
    pub trips: Vec<TripResult>,
}

/// Response for binding creation.
#[derive(Debug, Serialize)]
pub struct BindingResult {
    pub id: i64,
}

/// Response for route deactivation.
#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    /// How many scheduled trips were cancelled
    pub cancelled: usize,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

// Conversion implementations

impl ScheduleResult {
    /// Create from a domain Schedule.
    pub fn from_schedule(schedule: &Schedule) -> Self {
        Self {
            id: schedule.id.0,
            name: schedule.name.clone(),
            start_time: schedule.start.to_string(),
            end_time: schedule.end.to_string(),
            timezone: schedule.timezone.name().to_string(),
            recurrence_rule: schedule.rule.to_string(),
            effective_from: schedule.effective_from,
            effective_to: schedule.effective_to,
            exceptions: schedule.exceptions.clone(),
            active: schedule.active,
        }
    }
}

impl TripResult {
    /// Create from a domain Trip.
    pub fn from_trip(trip: &Trip) -> Self {
        Self {
            id: trip.id.0,
            route_id: trip.route_id.0,
            service_date: trip.service_date,
            planned_start_at: trip.planned_start_at,
            planned_end_at: trip.planned_end_at,
            started_at: trip.started_at,
            ended_at: trip.ended_at,
            status: trip.status.to_string(),
            schedule: SnapshotResult {
                schedule_id: trip.snapshot.schedule_id.0,
                name: trip.snapshot.name.clone(),
                start_time: trip.snapshot.start.to_string(),
                end_time: trip.snapshot.end.to_string(),
                recurrence_rule: trip.snapshot.rule.clone(),
                timezone: trip.snapshot.timezone.clone(),
            },
            is_override: trip.is_override,
            override_reason: trip.override_reason.clone(),
            override_author: trip.override_author.clone(),
            stops: trip.stops.iter().map(StopResult::from_stop).collect(),
        }
    }
}

impl StopResult {
    fn from_stop(stop: &TripStop) -> Self {
        Self {
            sequence: stop.sequence,
            pickup_point_id: stop.pickup_point_id.0,
            planned_arrival_at: stop.planned_arrival_at,
            latitude: stop.latitude,
            longitude: stop.longitude,
            address: stop.address.clone(),
            attendance: stop
                .attendance
                .iter()
                .map(AttendanceResult::from_attendance)
                .collect(),
        }
    }
}

impl AttendanceResult {
    fn from_attendance(record: &Attendance) -> Self {
        Self {
            student_id: record.student_id.0,
            state: record.state.to_string(),
            boarded_at: record.boarded_at,
            alighted_at: record.alighted_at,
        }
    }
}
