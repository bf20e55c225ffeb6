use std::sync::Arc;

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    fetch::{FetchError, Fetcher, HttpMethod, truncate_body},
    model::{Position, WeatherReading},
};

pub const DEFAULT_ENDPOINT: &str = "http://api.openweathermap.org/data/2.5/weather";

const KELVIN_OFFSET: f64 = 273.15;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("invalid weather endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("malformed weather response: {reason} (body: {body})")]
    MalformedResponse { reason: String, body: String },
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    weather: Vec<OwWeather>,
}

/// Build the current-weather URL for a position. No `units` parameter is sent,
/// so the API answers in Kelvin.
pub fn weather_url(
    endpoint: &str,
    position: &Position,
    api_key: Option<&str>,
) -> Result<Url, WeatherError> {
    let mut url = Url::parse(endpoint).map_err(|e| WeatherError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("lat", &position.latitude.to_string())
            .append_pair("lon", &position.longitude.to_string());
        if let Some(key) = api_key {
            query.append_pair("appid", key);
        }
    }

    Ok(url)
}

/// Kelvin to whole degrees Celsius. Halves round toward positive infinity.
pub fn kelvin_to_celsius_rounded(kelvin: f64) -> i32 {
    let celsius = kelvin - KELVIN_OFFSET;
    let floor = celsius.floor();
    let rounded = if celsius - floor >= 0.5 { floor + 1.0 } else { floor };
    rounded as i32
}

/// Decode a current-weather body into the two displayed values.
pub fn parse_weather(body: &str) -> Result<WeatherReading, WeatherError> {
    let malformed = |reason: String| WeatherError::MalformedResponse {
        reason,
        body: truncate_body(body),
    };

    let parsed: OwCurrentResponse =
        serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;

    if !parsed.main.temp.is_finite() {
        return Err(malformed("main.temp is not a finite number".to_string()));
    }

    let conditions = parsed
        .weather
        .into_iter()
        .next()
        .map(|w| w.main)
        .ok_or_else(|| malformed("weather list is empty".to_string()))?;

    Ok(WeatherReading { temperature: kelvin_to_celsius_rounded(parsed.main.temp), conditions })
}

/// Fetches and decodes current weather for a position.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    fetcher: Arc<dyn Fetcher>,
    endpoint: String,
    api_key: Option<String>,
}

impl WeatherClient {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher, endpoint: DEFAULT_ENDPOINT.to_string(), api_key: None }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub async fn current(&self, position: &Position) -> Result<WeatherReading, WeatherError> {
        let url = weather_url(&self.endpoint, position, self.api_key.as_deref())?;
        debug!(url = %redact_key(&url), "requesting current weather");

        let body = self.fetcher.fetch(HttpMethod::Get, url.as_str()).await?;
        let reading = parse_weather(&body)?;

        info!("Temperature is {}", reading.temperature);
        info!("Conditions are {}", reading.conditions);

        Ok(reading)
    }
}

fn redact_key(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "appid" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clear_sky() {
        let body = r#"{"main":{"temp":300.15},"weather":[{"main":"Clear"}]}"#;
        let reading = parse_weather(body).unwrap();

        assert_eq!(reading.temperature, 27);
        assert_eq!(reading.conditions, "Clear");
    }

    #[test]
    fn freezing_point_is_zero() {
        let body = r#"{"main":{"temp":273.15},"weather":[{"main":"Snow"}]}"#;
        assert_eq!(parse_weather(body).unwrap().temperature, 0);
    }

    #[test]
    fn half_degree_rounds_up() {
        assert_eq!(kelvin_to_celsius_rounded(300.65), 28);
        assert_eq!(kelvin_to_celsius_rounded(273.65), 1);
        assert_eq!(kelvin_to_celsius_rounded(272.65), 0);
        assert_eq!(kelvin_to_celsius_rounded(270.65), -2);
        assert_eq!(kelvin_to_celsius_rounded(0.0), -273);
    }

    #[test]
    fn takes_first_weather_entry_and_ignores_extra_fields() {
        let body = r#"{
            "coord": {"lon": -0.13, "lat": 51.51},
            "weather": [
                {"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"},
                {"id": 701, "main": "Mist", "description": "mist", "icon": "50d"}
            ],
            "main": {"temp": 285.4, "feels_like": 284.9, "humidity": 81},
            "name": "London"
        }"#;
        let reading = parse_weather(body).unwrap();

        assert_eq!(reading.temperature, 12);
        assert_eq!(reading.conditions, "Rain");
    }

    #[test]
    fn empty_weather_list_is_malformed() {
        let body = r#"{"main":{"temp":280.0},"weather":[]}"#;
        let err = parse_weather(body).unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse { .. }));
        assert!(err.to_string().contains("weather list is empty"));
    }

    #[test]
    fn missing_main_is_malformed() {
        let body = r#"{"weather":[{"main":"Clear"}]}"#;
        assert!(matches!(parse_weather(body), Err(WeatherError::MalformedResponse { .. })));
    }

    #[test]
    fn error_body_is_malformed() {
        let body = r#"{"cod":401,"message":"Invalid API key."}"#;
        let err = parse_weather(body).unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse { .. }));
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            parse_weather("<html>502 Bad Gateway</html>"),
            Err(WeatherError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn url_embeds_coordinates_without_units() {
        let pos = Position::new(51.5, -0.12);
        let url = weather_url(DEFAULT_ENDPOINT, &pos, None).unwrap();

        assert_eq!(url.as_str(), "http://api.openweathermap.org/data/2.5/weather?lat=51.5&lon=-0.12");
    }

    #[test]
    fn url_appends_api_key_when_configured() {
        let pos = Position::new(10.0, 20.0);
        let url = weather_url(DEFAULT_ENDPOINT, &pos, Some("KEY")).unwrap();

        assert_eq!(url.query(), Some("lat=10&lon=20&appid=KEY"));
        assert!(redact_key(&url).ends_with("appid=***"));
    }

    #[test]
    fn invalid_endpoint_is_reported() {
        let pos = Position::new(0.0, 0.0);
        let err = weather_url("not a url", &pos, None).unwrap_err();
        assert!(matches!(err, WeatherError::InvalidEndpoint { .. }));
    }
}
