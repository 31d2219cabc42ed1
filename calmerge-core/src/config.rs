//! Engine configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `CALMERGE_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};

use crate::constants::{
    DEFAULT_BIND, DEFAULT_CACHE_TTL, DEFAULT_EXDATE_TOLERANCE, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_LOG_LEVEL, DEFAULT_WINDOW_DAYS,
};
use crate::error::{EngineError, EngineResult};
use crate::source::{CalendarSource, SourceRegistry};

const CONFIG_PATH_ENV: &str = "CALMERGE_CONFIG";
const ENV_PREFIX: &str = "CALMERGE";

/// Configuration at ~/.config/calmerge/config.toml
///
/// ```toml
/// cache_ttl = "5m"
/// timezone = "America/Chicago"
///
/// [[calendars]]
/// name = "Home"
/// url = "https://calendar.example.com/home.ics"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub calendars: Vec<CalendarSource>,

    #[serde(deserialize_with = "deserialize_duration")]
    pub cache_ttl: Duration,

    #[serde(deserialize_with = "deserialize_duration")]
    pub fetch_timeout: Duration,

    pub window_days: i64,

    /// IANA zone used for "local" time. Host zone when unset.
    pub timezone: Option<String>,

    #[serde(deserialize_with = "deserialize_duration")]
    pub exdate_tolerance: Duration,

    pub bind: String,

    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            calendars: Vec::new(),
            cache_ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            window_days: DEFAULT_WINDOW_DAYS,
            timezone: None,
            exdate_tolerance: DEFAULT_EXDATE_TOLERANCE,
            bind: DEFAULT_BIND.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl EngineConfig {
    /// `$CALMERGE_CONFIG` if set, otherwise the platform config directory.
    pub fn config_path() -> EngineResult<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(shellexpand::tilde(&path).into_owned()));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| EngineError::Config("Could not determine config directory".into()))?
            .join("calmerge");

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> EngineResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path` (which may be missing) plus the environment.
    pub fn load_from(path: &Path) -> EngineResult<Self> {
        let config: EngineConfig = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| EngineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> EngineResult<()> {
        if self.window_days < 0 {
            return Err(EngineError::Config("window_days cannot be negative".into()));
        }
        self.registry()?;
        self.local_timezone()?;
        Ok(())
    }

    pub fn registry(&self) -> EngineResult<SourceRegistry> {
        SourceRegistry::new(self.calendars.clone())
    }

    /// The configured zone, else the host zone, else UTC.
    pub fn local_timezone(&self) -> EngineResult<Tz> {
        if let Some(name) = &self.timezone {
            return name
                .parse()
                .map_err(|_| EngineError::Config(format!("Unknown timezone '{}'", name)));
        }

        match iana_time_zone::get_timezone().map(|name| name.parse::<Tz>()) {
            Ok(Ok(tz)) => Ok(tz),
            _ => {
                tracing::warn!("Could not determine host timezone, using UTC");
                Ok(chrono_tz::UTC)
            }
        }
    }

    pub fn exdate_tolerance(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.exdate_tolerance).unwrap_or_else(|_| chrono::Duration::hours(1))
    }
}

/// Accepts humantime strings (`"5m"`, `"10s"`) or plain seconds.
fn deserialize_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => humantime::parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
