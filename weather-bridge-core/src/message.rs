//! Application messages exchanged with the watch firmware, and the transports
//! that carry them.

use std::{collections::BTreeMap, fmt::Debug};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{Mutex, mpsc},
};
use tracing::{error, info};

use crate::model::{AppKeys, WeatherReading};

/// A single value in an application message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppValue {
    Int(i32),
    Uint(u32),
    Str(String),
    Bytes(Vec<u8>),
}

/// Key-value payload keyed by the numeric ids the firmware declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppMessage(BTreeMap<u32, AppValue>);

impl AppMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The outbound weather update: exactly the temperature and conditions entries.
    pub fn weather(reading: &WeatherReading, keys: &AppKeys) -> Self {
        let mut msg = Self::new();
        msg.insert(keys.temperature, AppValue::Int(reading.temperature));
        msg.insert(keys.conditions, AppValue::Str(reading.conditions.clone()));
        msg
    }

    pub fn insert(&mut self, key: u32, value: AppValue) -> Option<AppValue> {
        self.0.insert(key, value)
    }

    pub fn get(&self, key: u32) -> Option<&AppValue> {
        self.0.get(&key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &AppValue)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("watch link is closed")]
    Closed,

    #[error("watch rejected the message: {0}")]
    Rejected(String),

    #[error("failed to write message: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The host's application-message channel. Each submission resolves exactly once.
#[async_trait]
pub trait MessageTransport: Send + Sync + Debug {
    async fn send_app_message(&self, message: &AppMessage) -> Result<(), SendError>;
}

/// Build the weather message and submit it once. The outcome is only logged;
/// the result is handed back so callers can observe it.
pub async fn dispatch_weather(
    transport: &dyn MessageTransport,
    reading: &WeatherReading,
    keys: &AppKeys,
) -> Result<(), SendError> {
    let message = AppMessage::weather(reading, keys);

    match transport.send_app_message(&message).await {
        Ok(()) => {
            info!("Weather info sent to watch successfully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Error sending weather info to watch");
            Err(e)
        }
    }
}

/// In-process link to a simulated watch.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<AppMessage>,
}

impl ChannelTransport {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<AppMessage>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl MessageTransport for ChannelTransport {
    async fn send_app_message(&self, message: &AppMessage) -> Result<(), SendError> {
        self.tx.send(message.clone()).await.map_err(|_| SendError::Closed)
    }
}

/// Writes each message as one line of JSON.
#[derive(Debug)]
pub struct JsonLinesTransport<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesTransport<W>
where
    W: AsyncWrite + Unpin + Send + Debug,
{
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> MessageTransport for JsonLinesTransport<W>
where
    W: AsyncWrite + Unpin + Send + Debug,
{
    async fn send_app_message(&self, message: &AppMessage) -> Result<(), SendError> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}
