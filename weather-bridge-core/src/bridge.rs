//! The weather pipeline: location, then weather, then the message to the watch.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use crate::{
    events::{EventBus, EventHandler, EventKind, HostEvent},
    location::{LocationError, LocationOptions, LocationProvider},
    message::{MessageTransport, SendError, dispatch_weather},
    model::{AppKeys, WeatherReading},
    weather::{WeatherClient, WeatherError},
};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("location: {0}")]
    Location(#[from] LocationError),

    #[error("weather: {0}")]
    Weather(#[from] WeatherError),

    #[error("send: {0}")]
    Send(#[from] SendError),
}

#[derive(Debug, Clone)]
pub struct WeatherBridge {
    location: Arc<dyn LocationProvider>,
    weather: WeatherClient,
    transport: Arc<dyn MessageTransport>,
    options: LocationOptions,
    keys: AppKeys,
}

impl WeatherBridge {
    pub fn new(
        location: Arc<dyn LocationProvider>,
        weather: WeatherClient,
        transport: Arc<dyn MessageTransport>,
    ) -> Self {
        Self {
            location,
            weather,
            transport,
            options: LocationOptions::default(),
            keys: AppKeys::default(),
        }
    }

    pub fn with_location_options(mut self, options: LocationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_keys(mut self, keys: AppKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Run the pipeline once. Each step starts only after the previous one
    /// succeeded; any failure is logged and ends the run.
    pub async fn refresh(&self) -> Result<WeatherReading, BridgeError> {
        let position = self.location.current_position(&self.options).await.inspect_err(|e| {
            error!(error = %e, "Error requesting location!");
        })?;

        let reading = self.weather.current(&position).await.inspect_err(|e| {
            error!(error = %e, "Error retrieving weather!");
        })?;

        dispatch_weather(self.transport.as_ref(), &reading, &self.keys).await?;

        Ok(reading)
    }

    /// Subscribe the `ready` and `appmessage` hooks.
    pub fn install(self, bus: &mut EventBus) {
        bus.on(EventKind::Ready, Arc::new(ReadyHook::new(self)))
            .on(EventKind::AppMessage, Arc::new(AppMessageHook));
    }
}

/// Starts the pipeline when the host reports ready.
#[derive(Debug)]
pub struct ReadyHook {
    bridge: WeatherBridge,
}

impl ReadyHook {
    pub fn new(bridge: WeatherBridge) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl EventHandler for ReadyHook {
    async fn handle(&self, _event: &HostEvent) {
        info!("Bridge ready!");
        // Failures are already logged by the pipeline.
        let _ = self.bridge.refresh().await;
    }
}

/// Placeholder for messages coming from the watch: logs and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppMessageHook;

#[async_trait]
impl EventHandler for AppMessageHook {
    async fn handle(&self, event: &HostEvent) {
        if let HostEvent::AppMessage(message) = event {
            info!(entries = message.len(), "AppMessage received!");
        }
    }
}
