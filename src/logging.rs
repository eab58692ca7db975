//! Logging and tracing setup.
//!
//! All logs are written to **stderr**; stdout belongs to the plugin host.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: full `EnvFilter` directives (e.g. `teo_provider=debug`).
//! - `TF_LOG`: consulted when `RUST_LOG` is unset. Accepts the host's level
//!   names (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`, case-insensitive);
//!   `JSON` maps to `trace`.
//!
//! # Examples
//!
//! ```bash
//! # Watch every describe call of a slow apply
//! RUST_LOG=teo_provider::poller=debug ./terraform-provider-teo
//!
//! # Reuse the host's switch
//! TF_LOG=DEBUG terraform apply
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Variable read when `RUST_LOG` is not set.
pub const TF_LOG_ENV: &str = "TF_LOG";

/// Initialize the default logging subscriber.
///
/// The filter comes from `RUST_LOG`, then `TF_LOG`, then defaults to `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level.
///
/// Like [`init_logging`], but `default_level` is used when neither
/// `RUST_LOG` nor `TF_LOG` is set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Unlike [`init_logging`], this does not panic when a subscriber is already
/// installed, which makes it safe to call from tests.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

fn env_filter(default_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = std::env::var(TF_LOG_ENV)
        .ok()
        .and_then(|value| tf_log_level(&value))
        .unwrap_or(default_level);
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Map a `TF_LOG` value onto an `EnvFilter` level.
fn tf_log_level(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRACE" | "JSON" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" => Some("warn"),
        "ERROR" => Some("error"),
        "OFF" => Some("off"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only the
    // filter construction is tested here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("teo_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,teo_provider::poller=debug").is_ok());
    }

    #[test]
    fn test_tf_log_levels() {
        assert_eq!(tf_log_level("DEBUG"), Some("debug"));
        assert_eq!(tf_log_level("warn"), Some("warn"));
        assert_eq!(tf_log_level(" Trace "), Some("trace"));
        assert_eq!(tf_log_level("JSON"), Some("trace"));
        assert_eq!(tf_log_level("verbose"), None);
        assert_eq!(tf_log_level(""), None);
    }

    #[test]
    fn test_try_init_is_idempotent() {
        try_init_logging();
        assert!(!try_init_logging());
    }
}
