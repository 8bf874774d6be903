//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::domain::{
    BindingId, PickupPointId, RouteBinding, RouteId, ScheduleId, StudentId, TripId,
};
use crate::engine::{
    ConflictError, EngineError, NewSchedule, OverrideRequest, RegenerationCoordinator,
    ScheduleRegistry, TripGenerator, TripLifecycle, ValidationError,
};
use crate::store::{
    BindingStore, PickupPoint, Route, RouteProvider, ScheduleStore, StoreError, TripStore,
};

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/schedules", post(create_schedule))
        .route("/schedules/:id", get(get_schedule).put(update_schedule))
        .route("/schedules/:id/exceptions", post(add_exception))
        .route("/schedules/:id/overrides", post(apply_override))
        .route("/schedules/:id/generate", post(generate_trips))
        .route("/schedules/:id/trips", get(list_schedule_trips))
        .route("/routes", post(register_route))
        .route("/routes/:id/deactivate", post(deactivate_route))
        .route("/routes/:id/trips", get(list_route_trips))
        .route("/bindings", post(create_binding))
        .route("/trips/:id", get(get_trip))
        .route("/trips/:id/status", post(transition_trip))
        .route("/trips/:id/attendance", post(record_attendance))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

fn new_schedule(req: ScheduleRequest) -> NewSchedule {
    NewSchedule {
        name: req.name,
        start_time: req.start_time,
        end_time: req.end_time,
        timezone: req.timezone,
        recurrence_rule: req.recurrence_rule,
        effective_from: req.effective_from,
        effective_to: req.effective_to,
        active: req.active.unwrap_or(true),
    }
}

/// Create a schedule.
async fn create_schedule(
    State(state): State<AppState>,
    Json(req): Json<ScheduleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let registry = ScheduleRegistry::new(state.store.as_ref());
    let schedule = registry.create(new_schedule(req))?;
    Ok((
        StatusCode::CREATED,
        Json(ScheduleResult::from_schedule(&schedule)),
    ))
}

/// Fetch a schedule.
async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ScheduleResult>, AppError> {
    let schedule = state
        .store
        .schedule(ScheduleId(id))?
        .ok_or_else(|| AppError::NotFound {
            message: format!("Schedule {id} not found"),
        })?;
    Ok(Json(ScheduleResult::from_schedule(&schedule)))
}

/// Replace a schedule's template fields.
async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResult>, AppError> {
    let registry = ScheduleRegistry::new(state.store.as_ref());
    let schedule = registry.update(ScheduleId(id), new_schedule(req))?;
    Ok(Json(ScheduleResult::from_schedule(&schedule)))
}

/// Add a full-day exception to a schedule.
async fn add_exception(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ExceptionRequest>,
) -> Result<Json<ScheduleResult>, AppError> {
    let registry = ScheduleRegistry::new(state.store.as_ref());
    let schedule = registry.add_exception(ScheduleId(id), req.date)?;
    Ok(Json(ScheduleResult::from_schedule(&schedule)))
}

/// Override (or cancel) a single service date and regenerate it.
async fn apply_override(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<OverrideRequestBody>,
) -> Result<Json<GenerateResponse>, AppError> {
    let coordinator =
        RegenerationCoordinator::new(state.store.as_ref(), state.config.as_ref().clone());
    let trips = coordinator.apply_override(
        ScheduleId(id),
        OverrideRequest {
            date: req.date,
            start_time: req.start_time,
            end_time: req.end_time,
            cancelled: req.cancelled,
            reason: req.reason,
            author: req.author,
        },
    )?;
    Ok(Json(GenerateResponse {
        trips: trips.iter().map(TripResult::from_trip).collect(),
    }))
}

/// Generate trips for a schedule across a date window.
async fn generate_trips(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let generator = TripGenerator::new(state.store.as_ref(), state.config.as_ref().clone());
    let trips = generator.generate(ScheduleId(id), req.start, req.end)?;
    Ok(Json(GenerateResponse {
        trips: trips.iter().map(TripResult::from_trip).collect(),
    }))
}

/// List a schedule's non-deleted trips for one service date.
async fn list_schedule_trips(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<TripsQuery>,
) -> Result<Json<TripListResponse>, AppError> {
    let coordinator =
        RegenerationCoordinator::new(state.store.as_ref(), state.config.as_ref().clone());
    let trips = coordinator.trips_for(ScheduleId(id), query.date)?;
    Ok(Json(TripListResponse {
        trips: trips.iter().map(TripResult::from_trip).collect(),
    }))
}

/// Register (or replace) a route.
async fn register_route(
    State(state): State<AppState>,
    Json(req): Json<RouteRequest>,
) -> StatusCode {
    state.store.put_route(Route {
        id: RouteId(req.id),
        active: req.active.unwrap_or(true),
        pickup_points: req
            .pickup_points
            .into_iter()
            .map(|p| PickupPoint {
                id: PickupPointId(p.id),
                latitude: p.latitude,
                longitude: p.longitude,
                address: p.address,
            })
            .collect(),
    });
    StatusCode::CREATED
}

/// Deactivate a route and cancel its still-scheduled trips.
async fn deactivate_route(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeactivateResponse>, AppError> {
    let route_id = RouteId(id);
    if state.store.route(route_id)?.is_none() {
        return Err(AppError::NotFound {
            message: format!("Route {id} not found"),
        });
    }
    state.store.set_route_active(route_id, false);

    let lifecycle = TripLifecycle::new(state.store.as_ref(), state.transitions.as_ref().clone());
    let cancelled = lifecycle.cancel_route_trips(route_id)?;
    Ok(Json(DeactivateResponse { cancelled }))
}

/// List a route's non-deleted trips.
async fn list_route_trips(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TripListResponse>, AppError> {
    let trips = state.store.trips_by_route(RouteId(id))?;
    Ok(Json(TripListResponse {
        trips: trips.iter().map(TripResult::from_trip).collect(),
    }))
}

/// Bind a route to a schedule.
async fn create_binding(
    State(state): State<AppState>,
    Json(req): Json<BindingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = state.store.insert_binding(RouteBinding {
        id: BindingId(0),
        route_id: RouteId(req.route_id),
        schedule_id: ScheduleId(req.schedule_id),
        effective_from: req.effective_from,
        effective_to: req.effective_to,
        priority: req.priority,
        active: req.active.unwrap_or(true),
        created_at: chrono::Utc::now(),
    })?;
    Ok((StatusCode::CREATED, Json(BindingResult { id: id.0 })))
}

/// Fetch a trip.
async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TripResult>, AppError> {
    let trip = state
        .store
        .trip(TripId(id))?
        .ok_or_else(|| AppError::NotFound {
            message: format!("Trip {id} not found"),
        })?;
    Ok(Json(TripResult::from_trip(&trip)))
}

/// Move a trip to a new status.
async fn transition_trip(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<TripResult>, AppError> {
    let status = req.status.parse().map_err(|_| AppError::BadRequest {
        message: format!("Invalid status: {}", req.status),
    })?;

    let lifecycle = TripLifecycle::new(state.store.as_ref(), state.transitions.as_ref().clone());
    let trip = lifecycle.transition(TripId(id), status)?;
    Ok(Json(TripResult::from_trip(&trip)))
}

/// Record a student's attendance at a stop.
async fn record_attendance(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AttendanceRequest>,
) -> Result<Json<TripResult>, AppError> {
    let attendance = req.state.parse().map_err(|_| AppError::BadRequest {
        message: format!("Invalid attendance state: {}", req.state),
    })?;

    let lifecycle = TripLifecycle::new(state.store.as_ref(), state.transitions.as_ref().clone());
    let trip = lifecycle.record_attendance(
        TripId(id),
        PickupPointId(req.pickup_point_id),
        StudentId(req.student_id),
        attendance,
    )?;
    Ok(Json(TripResult::from_trip(&trip)))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Conflict { message: String },
    Internal { message: String },
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Validation(e) => AppError::BadRequest {
                message: e.to_string(),
            },
            EngineError::Conflict(e) => AppError::Conflict {
                message: e.to_string(),
            },
            EngineError::NotFound(what) => AppError::NotFound {
                message: format!("{what} not found"),
            },
            EngineError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => AppError::NotFound {
                message: format!("{what} not found"),
            },
            StoreError::DuplicateTrip { .. } | StoreError::Stale(_) => AppError::Conflict {
                message: e.to_string(),
            },
            StoreError::Backend(message) => AppError::Internal { message },
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::BadRequest {
            message: e.to_string(),
        }
    }
}

impl From<ConflictError> for AppError {
    fn from(e: ConflictError) -> Self {
        AppError::Conflict {
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Conflict { message } => (StatusCode::CONFLICT, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        tracing::warn!(%status, %message, "request failed");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
