//! Fleet operations server.
//!
//! Turns recurring service schedules bound to transport routes into
//! concrete, dated, timezone-correct trips, and drives those trips
//! through their lifecycle as they are executed.

pub mod domain;
pub mod engine;
pub mod store;
pub mod web;
