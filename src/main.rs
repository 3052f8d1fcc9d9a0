use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use paddock_core::{AppError, Config, WeatherError};
use paddock_weather::{
    all_tracks, find_track, Clock, OpenWeatherClient, WeatherCache, WeatherTransport,
};

#[derive(Parser)]
#[command(name = "paddock", about = "Weather and UV forecasts for F1 tracks", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List known circuits
    Tracks,
    /// Fetch the forecast for one or more tracks, or for coordinates
    ///
    /// The forecast cache lives only for this invocation: tracks named more
    /// than once (or within ~11 m of each other) share a single provider
    /// call, and `cache_ttl_secs`/`max_cache_entries` apply within the run.
    Forecast {
        /// Circuit id from `paddock tracks`; repeat for several circuits
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        track: Vec<String>,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
        /// Race date, e.g. 2025-05-25
        #[arg(long)]
        date: String,
        /// Print only the race-day record
        #[arg(long)]
        race_day_only: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = paddock_core::init() {
        eprintln!("{e}");
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("Command failed: {:?}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Command::Tracks => {
            for t in all_tracks() {
                println!(
                    "{:<14} {:<34} {:<13} {:>9.4} {:>10.4}",
                    t.id, t.name, t.country, t.latitude, t.longitude
                );
            }
            Ok(())
        }
        Command::Forecast {
            track,
            lat,
            lon,
            date,
            race_day_only,
        } => {
            let locations = resolve_locations(&track, lat, lon)?;
            let output = forecast(&locations, &date, race_day_only).await?;
            println!("{output}");
            Ok(())
        }
    }
}

fn resolve_locations(
    tracks: &[String],
    lat: Option<f64>,
    lon: Option<f64>,
) -> Result<Vec<(f64, f64)>, WeatherError> {
    if tracks.is_empty() {
        return resolve_location(None, lat, lon).map(|loc| vec![loc]);
    }
    tracks
        .iter()
        .map(|id| resolve_location(Some(id), lat, lon))
        .collect()
}

fn resolve_location(
    track: Option<&str>,
    lat: Option<f64>,
    lon: Option<f64>,
) -> Result<(f64, f64), WeatherError> {
    match (track, lat, lon) {
        (Some(id), _, _) => find_track(id)
            .map(|t| {
                tracing::info!("Using {} ({})", t.name, t.country);
                (t.latitude, t.longitude)
            })
            .ok_or_else(|| WeatherError::UnknownTrack(id.to_string())),
        (None, Some(lat), Some(lon)) => Ok((lat, lon)),
        _ => Err(WeatherError::MissingLocation(
            "no track and incomplete coordinates".to_string(),
        )),
    }
}

async fn forecast(
    locations: &[(f64, f64)],
    date: &str,
    race_day_only: bool,
) -> Result<String, AppError> {
    let (config, _) = Config::load_validated()?;

    let client = OpenWeatherClient::from_config(&config.weather)
        .map_err(|e| AppError::Network(e.into_network_error()))?;
    let mut cache = WeatherCache::new(client)
        .with_ttl(Duration::from_secs(config.weather.cache_ttl_secs));
    if let Some(max) = config.weather.max_cache_entries {
        cache = cache.with_max_entries(max);
    }

    collect_forecasts(&cache, locations, date, race_day_only).await
}

/// Fetch every location through one cache and render the results.
///
/// A single location prints as one JSON document; several print as an array
/// in the order given.
async fn collect_forecasts<T: WeatherTransport, C: Clock>(
    cache: &WeatherCache<T, C>,
    locations: &[(f64, f64)],
    date: &str,
    race_day_only: bool,
) -> Result<String, AppError> {
    let mut rendered = Vec::with_capacity(locations.len());
    for &(latitude, longitude) in locations {
        let result = cache
            .fetch_weather_with_cache(latitude, longitude, date)
            .await
            .map_err(WeatherError::from)?;

        let value = if race_day_only {
            serde_json::to_value(&result.race_day_forecast)
        } else {
            serde_json::to_value(&result)
        };
        rendered.push(value.map_err(|e| AppError::Other(anyhow::Error::new(e)))?);
    }

    let output = match rendered.as_slice() {
        [single] => serde_json::to_string_pretty(single),
        _ => serde_json::to_string_pretty(&rendered),
    };
    output.map_err(|e| AppError::Other(anyhow::Error::new(e)))
}
