use serde::{Deserialize, Serialize};
use std::time::Duration;
use wordrace::relay::appstate::AppState;

/// Represents the configuration settings for the wordrace server.
///
/// Loaded from the user's config directory through `confy`, then overridden
/// by environment variables and finally by command line flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WordraceConfig {
    /// Possible values are "production", "staging", or "development".
    pub app_environment: String,

    /// The host the relay listens on.
    pub app_host: String,

    /// The port the relay listens on.
    pub app_port: u16,

    /// Seconds an empty room is kept before it is discarded.
    pub room_grace_secs: u64,

    /// Fallback log filter used when `RUST_LOG` is not set.
    pub rust_log: String,
}

impl Default for WordraceConfig {
    fn default() -> Self {
        WordraceConfig {
            app_environment: "production".to_string(),
            app_host: "0.0.0.0".to_string(),
            app_port: 8000,
            room_grace_secs: AppState::ROOM_GRACE_PERIOD.as_secs(),
            rust_log: "info".to_string(),
        }
    }
}

impl WordraceConfig {
    pub fn load() -> Result<WordraceConfig, confy::ConfyError> {
        confy::load("wordrace", "wordrace")
    }

    /// Applies `APP_ENVIRONMENT`, `APP_HOST`, `APP_PORT` and `ROOM_GRACE_SECS`.
    ///
    /// Values that do not parse are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> WordraceConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(environment) = lookup("APP_ENVIRONMENT") {
            self.app_environment = environment;
        }
        if let Some(host) = lookup("APP_HOST") {
            self.app_host = host;
        }
        if let Some(port) = lookup("APP_PORT").and_then(|port| port.parse().ok()) {
            self.app_port = port;
        }
        if let Some(secs) = lookup("ROOM_GRACE_SECS").and_then(|secs| secs.parse().ok()) {
            self.room_grace_secs = secs;
        }
        self
    }

    pub fn room_grace_period(&self) -> Duration {
        Duration::from_secs(self.room_grace_secs)
    }
}
