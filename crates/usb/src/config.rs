//! USB layer configuration management

use crate::filter::DeviceFilter;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsbConfig {
    #[serde(default)]
    pub usb: UsbSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsbSettings {
    /// Timeout given to every newly opened handle; 0 means the host default
    #[serde(default, with = "duration_serde")]
    pub default_timeout: Duration,
    /// Let the host detach kernel drivers when an interface is claimed
    #[serde(default)]
    pub auto_detach_kernel_driver: bool,
    /// VID:PID filters, empty allows every device
    #[serde(default)]
    pub filters: Vec<String>,
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            default_timeout: Duration::ZERO,
            auto_detach_kernel_driver: false,
            filters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "LoggingSettings::default_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

impl LoggingSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

/// Durations written as "500ms", "2s", "1m" or a bare number of milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
            Raw::Text(s) => parse_duration(&s).map_err(serde::de::Error::custom),
        }
    }

    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim().to_lowercase();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);

        if digits.is_empty() {
            return Err(format!("Invalid duration format: {}", s));
        }
        let num: u64 = digits
            .parse()
            .map_err(|_| format!("Invalid number in duration: {}", digits))?;

        match unit.trim() {
            "" | "ms" => Ok(Duration::from_millis(num)),
            "s" => Ok(Duration::from_secs(num)),
            "m" => num
                .checked_mul(60)
                .map(Duration::from_secs)
                .ok_or_else(|| format!("Invalid duration, too large: {}", s)),
            other => Err(format!("Invalid duration unit: {}", other)),
        }
    }

    pub fn format_duration(d: Duration) -> String {
        let ms = d.as_millis();
        if ms != 0 && ms % 60_000 == 0 {
            format!("{}m", ms / 60_000)
        } else if ms != 0 && ms % 1000 == 0 {
            format!("{}s", ms / 1000)
        } else {
            format!("{}ms", ms)
        }
    }
}

pub use duration_serde::parse_duration;

impl UsbConfig {
    /// Load configuration from `path`, or from [`UsbConfig::default_path`]
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(Self::default_path);
        if !config_path.exists() {
            return Err(anyhow!(
                "No configuration file found at {}",
                config_path.display()
            ));
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: UsbConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usbkit").join("usb.toml")
        } else {
            PathBuf::from(".config/usbkit/usb.toml")
        }
    }

    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }

        self.device_filters()?;
        Ok(())
    }

    /// Install the global tracing subscriber at `logging.level`
    ///
    /// `RUST_LOG` still takes precedence when set.
    pub fn setup_logging(&self) -> Result<()> {
        common::setup_logging(&self.logging.level).map_err(|e| anyhow!(e))
    }

    /// Parsed form of `usb.filters`
    pub fn device_filters(&self) -> Result<Vec<DeviceFilter>> {
        self.usb
            .filters
            .iter()
            .map(|f| DeviceFilter::parse(f).map_err(|e| anyhow!(e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UsbConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.usb.default_timeout, Duration::ZERO);
        assert!(!config.usb.auto_detach_kernel_driver);
        assert!(config.usb.filters.is_empty());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("2s"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("250"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("0ms"), Ok(Duration::ZERO));
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("5h").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert!(parse_duration("999999999999999999m").is_err());
        assert!(parse_duration("99999999999999999999ms").is_err());
        assert_eq!(parse_duration("1000m"), Ok(Duration::from_secs(60_000)));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(duration_serde::format_duration(Duration::ZERO), "0ms");
        assert_eq!(
            duration_serde::format_duration(Duration::from_millis(1500)),
            "1500ms"
        );
        assert_eq!(duration_serde::format_duration(Duration::from_secs(2)), "2s");
        assert_eq!(
            duration_serde::format_duration(Duration::from_secs(120)),
            "2m"
        );
    }

    #[test]
    fn test_config_serialization() {
        let mut config = UsbConfig::default();
        config.usb.default_timeout = Duration::from_millis(750);
        config.usb.filters = vec!["0x1234:*".to_string()];

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: UsbConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_bare_number_timeout() {
        let config: UsbConfig = toml::from_str("[usb]\ndefault_timeout = 1000\n").unwrap();
        assert_eq!(config.usb.default_timeout, Duration::from_secs(1));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = UsbConfig::default();
        assert!(config.validate().is_ok());

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_filters() {
        let mut config = UsbConfig::default();
        config.usb.filters = vec!["0x1234:0x5678".into(), "*:*".into()];
        assert_eq!(config.device_filters().unwrap().len(), 2);

        config.usb.filters.push("1234:5678".into());
        assert!(config.validate().is_err());
    }
}
