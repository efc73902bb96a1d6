use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default wait after the last edit before a channel is saved.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(1000);

/// Default wait between intercepting a dirty close and flushing.
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_millis(100);

/// Timing of a document session.
///
/// Stored in the workspace `config.json` as milliseconds:
///
/// ```json
/// { "quiet_period_ms": 1000, "grace_delay_ms": 100 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period applied independently to the title and content channels.
    #[serde(rename = "quiet_period_ms", with = "millis")]
    pub quiet_period: Duration,
    /// Delay before the flush that runs when a dirty view is closed.
    #[serde(rename = "grace_delay_ms", with = "millis")]
    pub grace_delay: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Quiet period must be greater than zero")]
    ZeroQuietPeriod,

    #[error("Grace delay ({grace:?}) must be shorter than the quiet period ({quiet:?})")]
    GraceNotShorter { grace: Duration, quiet: Duration },
}

impl SessionConfig {
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    pub fn with_grace_delay(mut self, grace_delay: Duration) -> Self {
        self.grace_delay = grace_delay;
        self
    }

    /// Checks that the close grace delay is strictly shorter than the edit quiet period.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quiet_period.is_zero() {
            return Err(ConfigError::ZeroQuietPeriod);
        }
        if self.grace_delay >= self.quiet_period {
            return Err(ConfigError::GraceNotShorter {
                grace: self.grace_delay,
                quiet: self.quiet_period,
            });
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            quiet_period: DEFAULT_QUIET_PERIOD,
            grace_delay: DEFAULT_GRACE_DELAY,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
