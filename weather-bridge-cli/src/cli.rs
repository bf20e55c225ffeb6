use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use weather_bridge_core::{
    AppKeys, AppMessage, Config, EventBus, Geolocation, HostEvent, HttpFetcher, JsonLinesTransport,
    StaticLocation, WeatherBridge, WeatherClient, parse_weather,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-bridge", version, about = "Send current weather to a watch")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fire `ready` and write the weather message to stdout as a JSON line.
    Run {
        /// Latitude to report instead of the configured one.
        #[arg(long, allow_negative_numbers = true, requires = "lon")]
        lat: Option<f64>,

        /// Longitude to report instead of the configured one.
        #[arg(long, allow_negative_numbers = true, requires = "lat")]
        lon: Option<f64>,

        /// Keep reading app messages from stdin (one JSON object per line).
        #[arg(long)]
        listen: bool,
    },

    /// Store the API key and/or the coordinates to report.
    Configure {
        /// OpenWeatherMap API key. Prompted for when nothing else is given.
        #[arg(long)]
        api_key: Option<String>,

        #[arg(long, allow_negative_numbers = true, requires = "lon")]
        lat: Option<f64>,

        #[arg(long, allow_negative_numbers = true, requires = "lat")]
        lon: Option<f64>,
    },

    /// Decode a saved current-weather response and print the resulting message.
    Parse {
        /// File holding the JSON body.
        file: PathBuf,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Run { lat, lon, listen } => run(lat.zip(lon), listen).await,
            Command::Configure { api_key, lat, lon } => configure(api_key, lat.zip(lon)),
            Command::Parse { file } => parse(&file),
        }
    }
}

async fn run(coordinates: Option<(f64, f64)>, listen: bool) -> anyhow::Result<()> {
    let config = Config::load()?;

    let source = match coordinates {
        Some((lat, lon)) => StaticLocation::new(lat, lon)?,
        None => config.location.static_location()?.ok_or_else(|| {
            anyhow!(
                "No location configured.\n\
                 Hint: pass `--lat <deg> --lon <deg>` or run `weather-bridge configure --lat <deg> --lon <deg>`."
            )
        })?,
    };

    let weather = WeatherClient::new(Arc::new(HttpFetcher::new()))
        .with_endpoint(config.weather.endpoint.clone())
        .with_api_key(config.weather.api_key.clone());

    let bridge = WeatherBridge::new(
        Arc::new(Geolocation::new(source)),
        weather,
        Arc::new(JsonLinesTransport::new(tokio::io::stdout())),
    )
    .with_location_options(config.location.options())
    .with_keys(config.keys);

    let mut bus = EventBus::new();
    bridge.install(&mut bus);

    let inbound = listen.then(|| BufReader::new(tokio::io::stdin()));
    serve(&bus, inbound).await
}

/// Fire `ready` and, at the same time, feed inbound app messages to the bus.
///
/// Inbound messages never wait on the weather pipeline: a fetch that hangs
/// keeps `ready` pending but `appmessage` is still delivered.
async fn serve<R>(bus: &EventBus, inbound: Option<R>) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let listen = async {
        let Some(reader) = inbound else {
            return Ok(());
        };

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<AppMessage>(line) {
                Ok(message) => {
                    bus.dispatch(HostEvent::AppMessage(message)).await;
                }
                Err(e) => warn!(error = %e, "ignoring unreadable app message"),
            }
        }
        Ok::<_, anyhow::Error>(())
    };

    let (_, listened) = tokio::join!(bus.dispatch(HostEvent::Ready), listen);
    listened
}

fn configure(api_key: Option<String>, coordinates: Option<(f64, f64)>) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    apply_configure(&mut config, api_key, coordinates, || {
        inquire::Text::new("OpenWeatherMap API key (empty for none):")
            .prompt()
            .context("Failed to read API key")
    })?;

    config.save()?;
    info!(path = %Config::config_file_path()?.display(), "configuration saved");

    Ok(())
}

/// Update `config` from the `configure` arguments. The key is prompted for only
/// when neither a key nor coordinates were given.
fn apply_configure<P>(
    config: &mut Config,
    api_key: Option<String>,
    coordinates: Option<(f64, f64)>,
    prompt: P,
) -> anyhow::Result<()>
where
    P: FnOnce() -> anyhow::Result<String>,
{
    let api_key = match (api_key, coordinates) {
        (Some(key), _) => Some(key),
        (None, Some(_)) => None,
        (None, None) => Some(prompt()?),
    };

    if let Some(key) = api_key {
        config.set_api_key(Some(key));
    }

    if let Some((lat, lon)) = coordinates {
        config.set_coordinates(lat, lon)?;
    }

    Ok(())
}

fn parse(file: &Path) -> anyhow::Result<()> {
    let config = Config::load()?;
    println!("{}", render_response_file(file, &config.keys)?);
    Ok(())
}

/// The JSON line the watch would receive for a saved response body.
fn render_response_file(file: &Path, keys: &AppKeys) -> anyhow::Result<String> {
    let body = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read response file: {}", file.display()))?;

    let reading = parse_weather(&body)?;
    let message = AppMessage::weather(&reading, keys);

    Ok(serde_json::to_string(&message)?)
}
