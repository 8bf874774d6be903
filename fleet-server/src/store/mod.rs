//! Persistence and collaborator seams.
//!
//! The engine never talks to a database directly; it goes through the
//! traits in this module. The in-memory implementation backs tests and
//! local development, and is also where the trip uniqueness constraint
//! lives: the application-level existence check during generation is a
//! fast path, the store's constraint is the guarantee.

mod error;
mod memory;
mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use traits::{
    BindingStore, NotificationSink, PickupPoint, Route, RouteProvider, ScheduleEvent,
    ScheduleStore, TripStore,
};
