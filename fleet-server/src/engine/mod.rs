//! The schedule-to-trip generation engine.
//!
//! Five cooperating pieces, data flowing one way: the registry
//! validates and stores schedule templates, the binder resolves which
//! binding owns a route on a given date, the generator expands a date
//! window into concrete trips, the lifecycle controller drives those
//! trips through their status machine, and the regeneration
//! coordinator replays a single date when an override arrives.

mod binder;
mod config;
mod error;
mod generator;
mod lifecycle;
mod registry;
mod regenerate;

pub use binder::BindingResolver;
pub use config::GeneratorConfig;
pub use error::{ConflictError, EngineError, ValidationError};
pub use generator::TripGenerator;
pub use lifecycle::TripLifecycle;
pub use registry::{NewSchedule, ScheduleRegistry};
pub use regenerate::{OverrideRequest, RegenerationCoordinator};
