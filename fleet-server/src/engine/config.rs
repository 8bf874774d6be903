//! Generation configuration.

use chrono::Duration;

/// Tunable parameters for trip generation.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Minutes between consecutive planned stop arrivals. Stop `i` is
    /// planned at `planned_start + i * stop_interval`.
    pub stop_interval_mins: i64,
}

impl GeneratorConfig {
    /// Returns the per-stop interval as a Duration.
    pub fn stop_interval(&self) -> Duration {
        Duration::minutes(self.stop_interval_mins)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            stop_interval_mins: 5,
        }
    }
}
