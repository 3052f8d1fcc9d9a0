//! Weather for Paddock
//!
//! Fetches OpenWeatherMap One Call forecasts for race tracks, picks out the
//! race-day record, and keeps results in memory for an hour per location.

pub mod cache;
pub mod clock;
pub mod forecast;
pub mod provider;
pub mod tracks;
pub mod types;

pub use cache::{WeatherCache, WeatherFetchError, DEFAULT_TTL};
pub use clock::{Clock, ManualClock, SystemClock};
pub use forecast::select_race_day;
pub use provider::{ApiKey, OpenWeatherClient, TransportError, WeatherTransport};
pub use tracks::{all_tracks, find_track, Track};
pub use types::*;
