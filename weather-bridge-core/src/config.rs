use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::{
    location::{LocationOptions, StaticLocation},
    model::AppKeys,
    weather::DEFAULT_ENDPOINT,
};

/// Weather endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub endpoint: String,
    /// Sent as `appid` when present. The endpoint is called without a key otherwise.
    pub api_key: Option<String>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self { endpoint: DEFAULT_ENDPOINT.to_string(), api_key: None }
    }
}

/// Location request options and the fixed coordinates the CLI host reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: LocationOptions::DEFAULT_TIMEOUT_MS,
            maximum_age_ms: LocationOptions::DEFAULT_MAXIMUM_AGE_MS,
            latitude: None,
            longitude: None,
        }
    }
}

impl LocationConfig {
    pub fn options(&self) -> LocationOptions {
        LocationOptions::from_millis(self.timeout_ms, self.maximum_age_ms)
    }

    /// The configured coordinates, if both are set.
    pub fn static_location(&self) -> Result<Option<StaticLocation>> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Ok(Some(StaticLocation::new(lat, lon)?)),
            (None, None) => Ok(None),
            _ => Err(anyhow!(
                "Both latitude and longitude must be configured.\n\
                 Hint: run `weather-bridge configure --lat <deg> --lon <deg>`."
            )),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [weather]
/// endpoint = "http://api.openweathermap.org/data/2.5/weather"
/// api_key = "..."
///
/// [location]
/// timeout_ms = 15000
/// maximum_age_ms = 60000
/// latitude = 51.5
/// longitude = -0.12
///
/// [keys]
/// temperature = 0
/// conditions = 1
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub weather: WeatherConfig,
    pub location: LocationConfig,
    pub keys: AppKeys,
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        if cfg.keys.temperature == cfg.keys.conditions {
            return Err(anyhow!(
                "Message keys must differ (temperature and conditions are both {}).",
                cfg.keys.temperature
            ));
        }
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-bridge", "weather-bridge")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set or clear the API key. Empty strings clear it.
    pub fn set_api_key(&mut self, api_key: Option<String>) {
        self.weather.api_key = api_key.filter(|k| !k.trim().is_empty());
    }

    pub fn set_coordinates(&mut self, latitude: f64, longitude: f64) -> Result<()> {
        StaticLocation::new(latitude, longitude)?;
        self.location.latitude = Some(latitude);
        self.location.longitude = Some(longitude);
        Ok(())
    }
}
