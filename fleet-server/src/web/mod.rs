//! Web layer for the fleet scheduling server.
//!
//! Provides HTTP endpoints for managing schedules, bindings, and the
//! trips generated from them.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::create_router;
pub use state::AppState;
