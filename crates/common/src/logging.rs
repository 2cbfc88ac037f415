//! Logging setup and configuration

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Build a filter from a level or directive string such as `"debug"` or
/// `"info,usb=trace"`
pub fn level_filter(level: &str) -> crate::Result<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|e| crate::Error::Config(format!("Invalid log filter '{}': {}", level, e)))
}

/// Setup tracing subscriber for the application
///
/// `RUST_LOG` takes precedence over `default_level`. Fails if a global
/// subscriber is already installed.
pub fn setup_logging(default_level: &str) -> crate::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(default_level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .map_err(|e| crate::Error::Config(format!("Logging already initialized: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter_accepts_directives() {
        assert!(level_filter("info").is_ok());
        assert!(level_filter("debug,usb=trace").is_ok());
    }

    #[test]
    fn test_level_filter_rejects_bad_level() {
        let err = level_filter("usb=loud").unwrap_err();
        assert!(err.to_string().contains("Invalid log filter"));
    }
}
