//! Engine configuration.
//!
//! Provides `EngineConfig`, assembled from defaults, an optional JSON file,
//! or environment variables, and consumed by the sync engine, the HTTP
//! backend, and the outbreak detector.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_RECONNECT_SECS: u64 = 60;
const DEFAULT_SYNTHETIC_MIN_SECS: u64 = 30;
const DEFAULT_SYNTHETIC_MAX_SECS: u64 = 45;
const DEFAULT_POLL_SECS: u64 = 5;
const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Remote backend endpoint and credentials.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Interval between push polls on the HTTP backend
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("poll_interval_secs", &self.poll_interval_secs)
            .finish()
    }
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            api_key: Some(api_key.into()),
            poll_interval_secs: DEFAULT_POLL_SECS,
        }
    }

    /// Check if both endpoint and key are present and the endpoint is http(s)
    pub fn is_configured(&self) -> bool {
        self.endpoint().is_ok()
    }

    /// Validated `(base_url, api_key)` with the trailing slash trimmed.
    pub fn endpoint(&self) -> Result<(String, String)> {
        let base_url = normalize_text_option(self.base_url.clone())
            .ok_or_else(|| Error::NotConfigured("backend URL is missing".to_string()))?;
        if !is_http_url(&base_url) {
            return Err(Error::NotConfigured(
                "backend URL must include http:// or https://".to_string(),
            ));
        }
        let api_key = normalize_text_option(self.api_key.clone())
            .ok_or_else(|| Error::NotConfigured("backend API key is missing".to_string()))?;
        Ok((base_url.trim_end_matches('/').to_string(), api_key))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Outbreak detector parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    /// Grid cell edge in degrees (both axes)
    pub cell_size_deg: f64,
    /// Sliding window length
    pub window_days: u32,
    /// Minimum records in one window to emit an outbreak
    pub min_cases: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            cell_size_deg: 0.5,
            window_days: 30,
            min_cases: 5,
        }
    }
}

impl DetectorConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.window_days))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.cell_size_deg.is_finite() || self.cell_size_deg <= 0.0 {
            return Err(Error::Config(format!(
                "cell size must be positive, got {}",
                self.cell_size_deg
            )));
        }
        if self.min_cases == 0 {
            return Err(Error::Config("minimum case count must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: BackendConfig,
    pub detector: DetectorConfig,
    /// Delay between reconnection attempts while disconnected
    pub reconnect_interval_secs: u64,
    /// Bounds of the randomized delay between synthetic updates
    pub synthetic_interval_min_secs: u64,
    pub synthetic_interval_max_secs: u64,
    /// Row cap for sighting/case history fetches
    pub history_limit: usize,
    /// Persisted cache location; `None` disables the cache
    pub cache_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                poll_interval_secs: DEFAULT_POLL_SECS,
                ..BackendConfig::default()
            },
            detector: DetectorConfig::default(),
            reconnect_interval_secs: DEFAULT_RECONNECT_SECS,
            synthetic_interval_min_secs: DEFAULT_SYNTHETIC_MIN_SECS,
            synthetic_interval_max_secs: DEFAULT_SYNTHETIC_MAX_SECS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            cache_path: None,
        }
    }
}

impl EngineConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = std::env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// Recognized: `SENTINEL_BACKEND_URL`, `SENTINEL_API_KEY`,
    /// `SENTINEL_RECONNECT_SECS`, `SENTINEL_POLL_SECS`, `SENTINEL_HISTORY_LIMIT`,
    /// `SENTINEL_CACHE_PATH`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        config.backend.base_url = optional_trimmed(&lookup, "SENTINEL_BACKEND_URL");
        config.backend.api_key = optional_trimmed(&lookup, "SENTINEL_API_KEY");

        if let Some(secs) = parse_optional(&lookup, "SENTINEL_RECONNECT_SECS")? {
            config.reconnect_interval_secs = secs;
        }
        if let Some(secs) = parse_optional(&lookup, "SENTINEL_POLL_SECS")? {
            config.backend.poll_interval_secs = secs;
        }
        if let Some(limit) = parse_optional(&lookup, "SENTINEL_HISTORY_LIMIT")? {
            config.history_limit = limit;
        }
        config.cache_path = optional_trimmed(&lookup, "SENTINEL_CACHE_PATH").map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file; missing keys take their defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reconnect_interval_secs == 0 {
            return Err(Error::Config("reconnect interval must be positive".to_string()));
        }
        if self.synthetic_interval_min_secs > self.synthetic_interval_max_secs {
            return Err(Error::Config(
                "synthetic interval minimum exceeds maximum".to_string(),
            ));
        }
        self.detector.validate()
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    pub fn synthetic_interval_bounds(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.synthetic_interval_min_secs),
            Duration::from_secs(self.synthetic_interval_max_secs),
        )
    }
}

const fn default_poll_secs() -> u64 {
    DEFAULT_POLL_SECS
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}

fn parse_optional<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    optional_trimmed(lookup, name)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| Error::Config(format!("{name} must be a number, got '{raw}'")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn defaults_match_reference_intervals() {
        let config = EngineConfig::default();
        assert_eq!(config.reconnect_interval(), Duration::from_secs(60));
        assert_eq!(
            config.synthetic_interval_bounds(),
            (Duration::from_secs(30), Duration::from_secs(45))
        );
        assert_eq!(config.history_limit, 100);
        assert!(!config.backend.is_configured());
    }

    #[test]
    fn from_lookup_reads_backend_and_intervals() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("SENTINEL_BACKEND_URL", " https://api.example.com/ "),
            ("SENTINEL_API_KEY", "anon"),
            ("SENTINEL_RECONNECT_SECS", "15"),
            ("SENTINEL_CACHE_PATH", "/tmp/sentinel.json"),
        ]))
        .unwrap();

        assert!(config.backend.is_configured());
        assert_eq!(
            config.backend.endpoint().unwrap(),
            ("https://api.example.com".to_string(), "anon".to_string())
        );
        assert_eq!(config.reconnect_interval(), Duration::from_secs(15));
        assert_eq!(
            config.cache_path.as_deref(),
            Some(Path::new("/tmp/sentinel.json"))
        );
    }

    #[test]
    fn from_lookup_rejects_non_numeric_interval() {
        let error =
            EngineConfig::from_lookup(lookup_from(&[("SENTINEL_RECONNECT_SECS", "soon")]))
                .unwrap_err();
        assert!(error.to_string().contains("SENTINEL_RECONNECT_SECS"));
    }

    #[test]
    fn backend_requires_http_scheme() {
        let config = BackendConfig::new("api.example.com", "key");
        assert!(matches!(config.endpoint(), Err(Error::NotConfigured(_))));
    }

    #[test]
    fn backend_debug_redacts_key() {
        let config = BackendConfig::new("https://api.example.com", "secret-key");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn detector_validation_rejects_zero_threshold() {
        let config = DetectorConfig {
            min_cases: 0,
            ..DetectorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "reconnect_interval_secs": 5 }"#).unwrap();
        assert_eq!(config.reconnect_interval_secs, 5);
        assert_eq!(config.detector, DetectorConfig::default());
        assert_eq!(config.backend.poll_interval_secs, 5);
    }
}
