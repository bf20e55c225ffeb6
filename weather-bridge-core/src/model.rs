use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geolocation fix reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// When the fix was taken. Used to decide whether a cached fix is still acceptable.
    pub timestamp: DateTime<Utc>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, timestamp: Utc::now() }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// The two values the watchface displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherReading {
    /// Whole degrees Celsius.
    pub temperature: i32,
    /// Primary category of the first weather entry, e.g. "Clear" or "Rain".
    pub conditions: String,
}

/// Numeric ids of the message keys, shared with the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppKeys {
    pub temperature: u32,
    pub conditions: u32,
}

impl AppKeys {
    pub const KEY_TEMPERATURE: u32 = 0;
    pub const KEY_CONDITIONS: u32 = 1;
}

impl Default for AppKeys {
    fn default() -> Self {
        Self { temperature: Self::KEY_TEMPERATURE, conditions: Self::KEY_CONDITIONS }
    }
}
