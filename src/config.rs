//! Provider configuration.
//!
//! Parsed from the provider block passed to
//! [`ProviderService::configure`](crate::provider::ProviderService::configure).
//! Every field is optional; durations are whole seconds.
//!
//! ```
//! use teo_provider::config::ProviderConfig;
//! use serde_json::json;
//!
//! let config = ProviderConfig::from_value(json!({
//!     "timeouts": { "create": 1200, "poll_interval": 5 },
//!     "batch_size": 100
//! }))
//! .unwrap();
//! assert_eq!(config.timeouts.create().as_secs(), 1200);
//! assert_eq!(config.timeouts.delete().as_secs(), 600);
//! assert_eq!(config.batch_size, 100);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::error::ProviderError;
use crate::poller::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};

/// Environment variable consulted when `region` is not configured.
pub const REGION_ENV: &str = "TENCENTCLOUD_REGION";

/// Convergence budgets per lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    create: u64,
    update: u64,
    delete: u64,
    poll_interval: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT.as_secs(),
            update: DEFAULT_TIMEOUT.as_secs(),
            delete: DEFAULT_TIMEOUT.as_secs(),
            poll_interval: DEFAULT_POLL_INTERVAL.as_secs(),
        }
    }
}

impl Timeouts {
    /// Budget for create flows.
    pub fn create(&self) -> Duration {
        Duration::from_secs(self.create)
    }

    /// Budget for update flows.
    pub fn update(&self) -> Duration {
        Duration::from_secs(self.update)
    }

    /// Budget for each step of a delete flow.
    pub fn delete(&self) -> Duration {
        Duration::from_secs(self.delete)
    }

    /// Time between two describe calls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }
}

/// Settings from the provider block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Region the client targets. Informational; the injected client owns
    /// the endpoint.
    pub region: Option<String>,
    /// Convergence budgets.
    pub timeouts: Timeouts,
    /// Targets per batched call.
    pub batch_size: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            region: None,
            timeouts: Timeouts::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ProviderConfig {
    /// Parse and validate a provider block.
    ///
    /// `null` yields the defaults. A missing `region` falls back to
    /// [`REGION_ENV`].
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        let mut config: Self = if value.is_null() {
            Self::default()
        } else {
            serde_json::from_value(value)
                .map_err(|e| ProviderError::Configuration(e.to_string()))?
        };
        if config.region.is_none() {
            config.region = std::env::var(REGION_ENV).ok().filter(|r| !r.is_empty());
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ProviderError> {
        if self.batch_size == 0 || self.batch_size > DEFAULT_BATCH_SIZE {
            return Err(ProviderError::Configuration(format!(
                "batch_size must be between 1 and {}, got {}",
                DEFAULT_BATCH_SIZE, self.batch_size
            )));
        }
        if self.timeouts.poll_interval == 0 {
            return Err(ProviderError::Configuration(
                "timeouts.poll_interval must be at least 1 second".to_string(),
            ));
        }
        for (name, secs) in [
            ("create", self.timeouts.create),
            ("update", self.timeouts.update),
            ("delete", self.timeouts.delete),
        ] {
            if secs < self.timeouts.poll_interval {
                return Err(ProviderError::Configuration(format!(
                    "timeouts.{} ({}s) is shorter than timeouts.poll_interval ({}s)",
                    name, secs, self.timeouts.poll_interval
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::from_value(json!({})).unwrap();
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.timeouts.create(), Duration::from_secs(600));
        assert_eq!(config.timeouts.poll_interval(), Duration::from_secs(3));

        let config = ProviderConfig::from_value(serde_json::Value::Null).unwrap();
        assert_eq!(config.timeouts, Timeouts::default());
    }

    #[test]
    fn test_explicit_region_wins() {
        let config = ProviderConfig::from_value(json!({"region": "ap-guangzhou"})).unwrap();
        assert_eq!(config.region.as_deref(), Some("ap-guangzhou"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = ProviderConfig::from_value(json!({"retries": 3})).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));

        let err = ProviderConfig::from_value(json!({"timeouts": {"read": 3}})).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_batch_size_bounds() {
        assert!(ProviderConfig::from_value(json!({"batch_size": 0})).is_err());
        assert!(ProviderConfig::from_value(json!({"batch_size": 201})).is_err());
        assert!(ProviderConfig::from_value(json!({"batch_size": 1})).is_ok());
    }

    #[test]
    fn test_timeout_shorter_than_interval() {
        let err = ProviderConfig::from_value(json!({
            "timeouts": {"delete": 2, "poll_interval": 5}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("timeouts.delete"));

        let err =
            ProviderConfig::from_value(json!({"timeouts": {"poll_interval": 0}})).unwrap_err();
        assert!(err.to_string().contains("poll_interval"));
    }
}
