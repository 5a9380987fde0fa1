//! Configuration for the verification gate.

use crate::interaction::InteractionKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the backend; submissions go to `<endpoint>/api/captcha`
    pub endpoint: String,

    /// `verification_type` field of the submission envelope
    pub verification_type: String,

    /// `source` field of the submission envelope
    pub source: String,

    /// Observation window durations per interaction kind
    pub windows: WindowDurations,

    /// Dwell time shown as "verifying" before the result
    #[serde(with = "duration_ms")]
    pub submit_delay: Duration,

    /// Delay between notifying the host bridge and closing it
    #[serde(with = "duration_ms")]
    pub bridge_close_delay: Duration,

    /// Timeout for the submission request
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,

    /// Background color requested from the host bridge
    pub bridge_background_color: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "https://your-flask-app.herokuapp.com".to_string(),
            verification_type: "github_pages_captcha".to_string(),
            source: "telegram_webapp".to_string(),
            windows: WindowDurations::default(),
            submit_delay: Duration::from_secs(2),
            bridge_close_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
            bridge_background_color: "#ffffff".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or the defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from JSON; missing fields take their defaults.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`, creating its directory.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("captcha-gate")
            .join("config.json")
    }
}

/// Observation window durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowDurations {
    #[serde(with = "duration_ms")]
    pub movement: Duration,
    #[serde(with = "duration_ms")]
    pub clicks: Duration,
    #[serde(with = "duration_ms")]
    pub scroll: Duration,
}

impl Default for WindowDurations {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(5))
    }
}

impl WindowDurations {
    /// The same duration for every kind.
    pub fn uniform(duration: Duration) -> Self {
        Self {
            movement: duration,
            clicks: duration,
            scroll: duration,
        }
    }

    pub fn for_kind(&self, kind: InteractionKind) -> Duration {
        match kind {
            InteractionKind::Movement => self.movement,
            InteractionKind::Clicks => self.clicks,
            InteractionKind::Scroll => self.scroll,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.windows.movement, Duration::from_secs(5));
        assert_eq!(config.submit_delay, Duration::from_secs(2));
        assert_eq!(config.verification_type, "github_pages_captcha");
        assert_eq!(config.source, "telegram_webapp");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"endpoint": "http://127.0.0.1:5000", "windows": {"scroll": 750}}"#;
        let config = Config::from_json(json).unwrap();

        assert_eq!(config.endpoint, "http://127.0.0.1:5000");
        assert_eq!(config.windows.scroll, Duration::from_millis(750));
        assert_eq!(config.windows.clicks, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_durations_serialize_as_millis() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["submit_delay"], 2000);
        assert_eq!(json["windows"]["movement"], 5000);
    }

    #[test]
    fn test_window_for_kind() {
        let windows = WindowDurations {
            movement: Duration::from_millis(1),
            clicks: Duration::from_millis(2),
            scroll: Duration::from_millis(3),
        };
        assert_eq!(windows.for_kind(InteractionKind::Clicks), Duration::from_millis(2));
    }

    #[test]
    fn test_save_then_load() {
        let name = format!("captcha-gate-{}", uuid::Uuid::new_v4());
        let dir = std::env::temp_dir().join(name);
        let path = dir.join("nested").join("config.json");

        let mut config = Config::default();
        config.endpoint = "http://127.0.0.1:5000".to_string();
        config.windows.scroll = Duration::from_millis(1500);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.endpoint, "http://127.0.0.1:5000");
        assert_eq!(loaded.windows.scroll, Duration::from_millis(1500));
        assert_eq!(loaded.submit_delay, config.submit_delay);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let name = format!("captcha-gate-{}", uuid::Uuid::new_v4());
        let path = std::env::temp_dir().join(name).join("config.json");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.verification_type, "github_pages_captcha");
    }
}
