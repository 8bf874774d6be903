//! Application state for the web layer.

use std::sync::Arc;

use crate::domain::TransitionTable;
use crate::engine::GeneratorConfig;
use crate::store::MemoryStore;

/// Shared application state.
///
/// Contains the store and engine configuration needed to handle
/// requests.
#[derive(Clone)]
pub struct AppState {
    /// Backing store for schedules, bindings, routes, and trips
    pub store: Arc<MemoryStore>,

    /// Trip generation configuration
    pub config: Arc<GeneratorConfig>,

    /// Allowed trip status transitions
    pub transitions: Arc<TransitionTable>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(store: MemoryStore, config: GeneratorConfig, transitions: TransitionTable) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
            transitions: Arc::new(transitions),
        }
    }
}
