//! Core library for the watch weather bridge.
//!
//! This crate defines:
//! - The HTTP fetch helper and the OpenWeatherMap current-weather client
//! - Location acquisition with timeout and cached-fix tolerance
//! - Application messages and the transports that carry them to the watch
//! - The host event bus with its `ready` and `appmessage` hooks
//! - Configuration
//!
//! It is used by `weather-bridge-cli`, but any host that can implement
//! [`LocationSource`] and [`MessageTransport`] can drive it.

pub mod bridge;
pub mod config;
pub mod events;
pub mod fetch;
pub mod location;
pub mod message;
pub mod model;
pub mod weather;

pub use bridge::{AppMessageHook, BridgeError, ReadyHook, WeatherBridge};
pub use config::Config;
pub use events::{EventBus, EventHandler, EventKind, HostEvent};
pub use fetch::{FetchError, Fetcher, HttpFetcher, HttpMethod};
pub use location::{
    Geolocation, LocationError, LocationOptions, LocationProvider, LocationSource, StaticLocation,
};
pub use message::{
    AppMessage, AppValue, ChannelTransport, JsonLinesTransport, MessageTransport, SendError,
    dispatch_weather,
};
pub use model::{AppKeys, Position, WeatherReading};
pub use weather::{WeatherClient, WeatherError, parse_weather};
