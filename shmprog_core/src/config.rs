//! Display configuration
//!
//! Defaults can be overridden from a TOML file or from `SHMPROG_*`
//! environment variables.

use crate::error::{ProgressError, ProgressResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_REFRESH_MS: &str = "SHMPROG_REFRESH_MS";
pub const ENV_DESCRIPTION: &str = "SHMPROG_DESCRIPTION";
pub const ENV_HIDDEN: &str = "SHMPROG_HIDDEN";

const DEFAULT_REFRESH_MS: u64 = 500;

/// How the display loop polls and what the progress bar shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Render cadence in milliseconds; readiness is polled ten times as often
    pub refresh_ms: u64,
    /// Label shown in front of the bar
    pub description: Option<String>,
    /// Draw nothing (tests, non-interactive runs)
    pub hidden: bool,
    /// Unit name for steps
    pub unit: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_ms: DEFAULT_REFRESH_MS,
            description: None,
            hidden: false,
            unit: "it".to_string(),
        }
    }
}

impl DisplayConfig {
    /// Load from a TOML file; missing keys keep their defaults
    pub fn from_toml_file(path: impl AsRef<Path>) -> ProgressResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProgressError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> ProgressResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ProgressError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `SHMPROG_*` environment variables
    pub fn from_env() -> ProgressResult<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> ProgressResult<Self> {
        if let Ok(value) = std::env::var(ENV_REFRESH_MS) {
            self.refresh_ms = value.trim().parse().map_err(|_| {
                ProgressError::Config(format!("{} must be an integer, got '{}'", ENV_REFRESH_MS, value))
            })?;
        }
        if let Ok(value) = std::env::var(ENV_DESCRIPTION) {
            self.description = Some(value);
        }
        if let Ok(value) = std::env::var(ENV_HIDDEN) {
            self.hidden = parse_flag(&value).ok_or_else(|| {
                ProgressError::Config(format!("{} must be a boolean, got '{}'", ENV_HIDDEN, value))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> ProgressResult<()> {
        if self.refresh_ms == 0 {
            return Err(ProgressError::Config(
                "refresh_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

/// Readiness poll cadence: a tenth of the refresh interval, at least 1ms
pub fn poll_interval(refresh: Duration) -> Duration {
    (refresh / 10).max(Duration::from_millis(1))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Environment variables are process-wide
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [ENV_REFRESH_MS, ENV_DESCRIPTION, ENV_HIDDEN] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults() {
        let config = DisplayConfig::default();
        assert_eq!(config.refresh_interval(), Duration::from_millis(500));
        assert!(!config.hidden);
        assert_eq!(config.unit, "it");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = DisplayConfig::from_toml_str("description = \"training\"\n").unwrap();
        assert_eq!(config.description.as_deref(), Some("training"));
        assert_eq!(config.refresh_ms, 500);
    }

    #[test]
    fn test_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "refresh_ms = 50\nhidden = true\nunit = \"batch\"").unwrap();
        let config = DisplayConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.refresh_ms, 50);
        assert!(config.hidden);
        assert_eq!(config.unit, "batch");
    }

    #[test]
    fn test_zero_refresh_rejected() {
        assert!(matches!(
            DisplayConfig::from_toml_str("refresh_ms = 0"),
            Err(ProgressError::Config(_))
        ));
    }

    #[test]
    fn test_poll_interval() {
        assert_eq!(
            poll_interval(Duration::from_millis(500)),
            Duration::from_millis(50)
        );
        assert_eq!(
            poll_interval(Duration::from_micros(10)),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var(ENV_REFRESH_MS, " 40 ");
        std::env::set_var(ENV_DESCRIPTION, "epochs");
        std::env::set_var(ENV_HIDDEN, "yes");
        let config = DisplayConfig::from_env();
        clear_env();

        let config = config.unwrap();
        assert_eq!(config.refresh_ms, 40);
        assert_eq!(config.description.as_deref(), Some("epochs"));
        assert!(config.hidden);
    }

    #[test]
    fn test_env_bad_refresh_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var(ENV_REFRESH_MS, "fast");
        let non_integer = DisplayConfig::from_env();
        std::env::set_var(ENV_REFRESH_MS, "0");
        let zero = DisplayConfig::from_env();
        clear_env();

        match non_integer {
            Err(ProgressError::Config(msg)) => assert!(msg.contains(ENV_REFRESH_MS)),
            other => panic!("expected config error, got {:?}", other),
        }
        assert!(matches!(zero, Err(ProgressError::Config(_))));
    }

    #[test]
    fn test_env_bad_hidden_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var(ENV_HIDDEN, "maybe");
        let result = DisplayConfig::default().with_env_overrides();
        clear_env();

        match result {
            Err(ProgressError::Config(msg)) => assert!(msg.contains(ENV_HIDDEN)),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_env_overrides_file_values() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var(ENV_REFRESH_MS, "25");
        let config = DisplayConfig::from_toml_str("refresh_ms = 300\nunit = \"batch\"")
            .and_then(DisplayConfig::with_env_overrides);
        clear_env();

        let config = config.unwrap();
        assert_eq!(config.refresh_ms, 25);
        assert_eq!(config.unit, "batch");
    }
}
