use std::time::Duration;

use geokit_location::{DEFAULT_WATCH_INTERVAL, PositionOptions};
use serde::{Deserialize, Serialize};

/// Settings for a [`LocationWidget`](crate::LocationWidget) and its system services.
///
/// Every field has a default, so a partial JSON document such as
/// `{"position": {"timeout_ms": 5000}}` is a valid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Options for one-shot requests and tracking sessions.
    pub position: PositionOptions,
    /// How often the system location service is polled while tracking.
    pub watch_interval_ms: u64,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            position: PositionOptions::default(),
            watch_interval_ms: u64::try_from(DEFAULT_WATCH_INTERVAL.as_millis()).unwrap_or(1000),
        }
    }
}

impl WidgetConfig {
    /// Polling period for tracking sessions.
    #[must_use]
    pub const fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}
