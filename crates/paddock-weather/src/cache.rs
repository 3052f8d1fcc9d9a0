//! Time-bound in-memory cache in front of the One Call transport.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::forecast::select_race_day;
use crate::provider::WeatherTransport;
use crate::types::{CacheEntry, CacheKey, RaceDate, WeatherResult};

/// How long a fetched forecast is served from memory
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Returned for every failed fetch; the cause is logged, not carried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to fetch weather data")]
pub struct WeatherFetchError;

impl From<WeatherFetchError> for paddock_core::WeatherError {
    fn from(_: WeatherFetchError) -> Self {
        paddock_core::WeatherError::FetchFailed
    }
}

/// Forecast cache keyed by 4-decimal coordinates.
///
/// Concurrent misses on the same key are not coalesced: each caller
/// fetches and stores its own result, and the last write wins.
pub struct WeatherCache<T, C = SystemClock> {
    transport: T,
    clock: C,
    ttl: chrono::Duration,
    max_entries: Option<usize>,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl<T: WeatherTransport> WeatherCache<T, SystemClock> {
    pub fn new(transport: T) -> Self {
        Self::with_clock(transport, SystemClock)
    }
}

impl<T: WeatherTransport, C: Clock> WeatherCache<T, C> {
    pub fn with_clock(transport: T, clock: C) -> Self {
        Self {
            transport,
            clock,
            ttl: to_chrono(DEFAULT_TTL),
            max_entries: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = to_chrono(ttl);
        self
    }

    /// Bound the number of cached locations. Storing a new key into a full
    /// cache evicts the entry with the oldest timestamp.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// When the entry for these coordinates was fetched, fresh or not
    pub fn cached_at(&self, latitude: f64, longitude: f64) -> Option<DateTime<Utc>> {
        let key = CacheKey::new(latitude, longitude);
        self.entries.lock().get(&key).map(|e| e.timestamp)
    }

    /// Weather for a location plus the daily record for `date`.
    ///
    /// Served from memory when the location was fetched less than one TTL
    /// ago. The race-day record is computed at fetch time, so a cached hit
    /// returns the record for whichever date was asked first.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherFetchError`] if the request or JSON parsing fails.
    /// Any existing entry for the location is left as it was.
    pub async fn fetch_weather_with_cache(
        &self,
        latitude: f64,
        longitude: f64,
        date: impl Into<RaceDate>,
    ) -> Result<WeatherResult, WeatherFetchError> {
        let key = CacheKey::new(latitude, longitude);

        if let Some(hit) = self.lookup_fresh(&key) {
            tracing::debug!("Weather cache hit for {}", key);
            return Ok(hit);
        }
        tracing::debug!("Weather cache miss for {}", key);

        let weather = match self.transport.fetch_one_call(latitude, longitude).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Fetch error for {}: {}", key, e.into_network_error());
                return Err(WeatherFetchError);
            }
        };

        let race_day_forecast = select_race_day(&weather, date.into());
        let result = WeatherResult {
            weather,
            race_day_forecast,
        };

        self.store(key, result.clone());
        Ok(result)
    }

    fn lookup_fresh(&self, key: &CacheKey) -> Option<WeatherResult> {
        let now = self.clock.now();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| entry.data.clone())
    }

    fn store(&self, key: CacheKey, data: WeatherResult) {
        let timestamp = self.clock.now();
        let mut entries = self.entries.lock();

        if let Some(max) = self.max_entries {
            if !entries.contains_key(&key) && entries.len() >= max {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.timestamp)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    tracing::debug!("Evicting weather cache entry {}", oldest);
                    entries.remove(&oldest);
                }
            }
        }

        tracing::info!(
            "Cached weather for {} (race day forecast: {})",
            key,
            if data.race_day_forecast.is_some() { "found" } else { "none" }
        );
        entries.insert(key, CacheEntry { data, timestamp });
    }
}

fn to_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::clock::ManualClock;
    use crate::provider::TransportError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const MAY_5: i64 = 1_714_867_200;
    const MAY_6: i64 = 1_714_953_600;

    /// Replays scripted responses and counts calls
    struct ScriptedTransport {
        calls: AtomicUsize,
        responses: Mutex<VecDeque<Result<Value, TransportError>>>,
    }

    impl ScriptedTransport {
        fn with(responses: Vec<Result<Value, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                responses: Mutex::new(responses.into()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherTransport for ScriptedTransport {
        async fn fetch_one_call(&self, _lat: f64, _lon: f64) -> Result<Value, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({"daily": []})))
        }
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn payload(tag: &str) -> Value {
        json!({
            "tag": tag,
            "daily": [
                {"dt": MAY_5, "uvi": 7.1},
                {"dt": MAY_6, "uvi": 5.4},
            ]
        })
    }

    fn bad_json() -> TransportError {
        TransportError::Parse(serde_json::from_str::<Value>("not json").unwrap_err())
    }

    #[tokio::test]
    async fn test_repeat_within_ttl_uses_cache() {
        let transport = ScriptedTransport::with(vec![Ok(payload("a"))]);
        let clock = Arc::new(ManualClock::new(start()));
        let cache = WeatherCache::with_clock(transport.clone(), clock.clone());

        let first = cache.fetch_weather_with_cache(43.7347, 7.4206, "2024-05-05").await.unwrap();
        clock.advance(chrono::Duration::minutes(59));
        let second = cache.fetch_weather_with_cache(43.7347, 7.4206, "2024-05-05").await.unwrap();

        assert_eq!(transport.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(second.race_day_forecast, Some(json!({"dt": MAY_5, "uvi": 7.1})));
    }

    #[tokio::test]
    async fn test_expired_entry_refetches_once() {
        let transport = ScriptedTransport::with(vec![Ok(payload("old")), Ok(payload("new"))]);
        let clock = Arc::new(ManualClock::new(start()));
        let cache = WeatherCache::with_clock(transport.clone(), clock.clone());

        cache.fetch_weather_with_cache(1.0, 2.0, "2024-05-05").await.unwrap();
        assert_eq!(cache.cached_at(1.0, 2.0), Some(start()));

        clock.advance(chrono::Duration::milliseconds(3_600_000));
        let refreshed = cache.fetch_weather_with_cache(1.0, 2.0, "2024-05-05").await.unwrap();
        let again = cache.fetch_weather_with_cache(1.0, 2.0, "2024-05-05").await.unwrap();

        assert_eq!(transport.calls(), 2);
        assert_eq!(refreshed.weather["tag"], "new");
        assert_eq!(again, refreshed);
        assert_eq!(
            cache.cached_at(1.0, 2.0),
            Some(start() + chrono::Duration::hours(1))
        );
    }

    #[tokio::test]
    async fn test_nearby_coordinates_share_entry() {
        let transport = ScriptedTransport::with(vec![Ok(payload("a")), Ok(payload("b"))]);
        let cache = WeatherCache::new(transport.clone());

        let a = cache.fetch_weather_with_cache(1.00001, 2.00001, "2024-05-05").await.unwrap();
        let b = cache.fetch_weather_with_cache(1.00004, 2.00002, "2024-05-05").await.unwrap();

        assert_eq!(transport.calls(), 1);
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_cached_hit_ignores_new_date() {
        let transport = ScriptedTransport::with(vec![Ok(payload("a"))]);
        let cache = WeatherCache::new(transport.clone());

        cache.fetch_weather_with_cache(1.0, 2.0, "2024-05-05").await.unwrap();
        let hit = cache.fetch_weather_with_cache(1.0, 2.0, "2024-05-06").await.unwrap();

        assert_eq!(transport.calls(), 1);
        assert_eq!(hit.race_day_forecast, Some(json!({"dt": MAY_5, "uvi": 7.1})));
    }

    #[tokio::test]
    async fn test_missing_or_empty_daily_is_not_an_error() {
        let transport = ScriptedTransport::with(vec![
            Ok(json!({"daily": []})),
            Ok(json!({"current": {"temp": 21.0}})),
        ]);
        let cache = WeatherCache::new(transport.clone());

        let empty = cache.fetch_weather_with_cache(1.0, 1.0, "2024-05-05").await.unwrap();
        let missing = cache.fetch_weather_with_cache(2.0, 2.0, "2024-05-05").await.unwrap();

        assert!(empty.race_day_forecast.is_none());
        assert!(missing.race_day_forecast.is_none());
        assert_eq!(missing.weather["current"]["temp"], 21.0);
    }

    #[tokio::test]
    async fn test_unparseable_date_yields_no_race_day() {
        let transport = ScriptedTransport::with(vec![Ok(payload("a"))]);
        let cache = WeatherCache::new(transport);

        let result = cache.fetch_weather_with_cache(1.0, 2.0, "not a date").await.unwrap();
        assert!(result.race_day_forecast.is_none());
        assert_eq!(result.weather["tag"], "a");
    }

    #[tokio::test]
    async fn test_failure_is_generic_and_keeps_stale_entry() {
        let transport = ScriptedTransport::with(vec![Ok(payload("stale")), Err(bad_json())]);
        let clock = Arc::new(ManualClock::new(start()));
        let cache = WeatherCache::with_clock(transport.clone(), clock.clone());

        cache.fetch_weather_with_cache(1.0, 2.0, "2024-05-05").await.unwrap();
        clock.advance(chrono::Duration::hours(2));

        let err = cache
            .fetch_weather_with_cache(1.0, 2.0, "2024-05-05")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Failed to fetch weather data");
        assert_eq!(transport.calls(), 2);
        assert_eq!(cache.cached_at(1.0, 2.0), Some(start()));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_on_cold_cache_stores_nothing() {
        let transport = ScriptedTransport::with(vec![Err(TransportError::Status {
            status: 401,
            body: "Invalid API key".into(),
        })]);
        let cache = WeatherCache::new(transport);

        assert!(cache.fetch_weather_with_cache(1.0, 2.0, "2024-05-05").await.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_max_entries_evicts_oldest() {
        let transport = ScriptedTransport::with(vec![]);
        let clock = Arc::new(ManualClock::new(start()));
        let cache = WeatherCache::with_clock(transport.clone(), clock.clone()).with_max_entries(2);

        cache.fetch_weather_with_cache(1.0, 1.0, "2024-05-05").await.unwrap();
        clock.advance(chrono::Duration::minutes(1));
        cache.fetch_weather_with_cache(2.0, 2.0, "2024-05-05").await.unwrap();
        clock.advance(chrono::Duration::minutes(1));
        cache.fetch_weather_with_cache(3.0, 3.0, "2024-05-05").await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.cached_at(1.0, 1.0).is_none());
        assert!(cache.cached_at(2.0, 2.0).is_some());
        assert!(cache.cached_at(3.0, 3.0).is_some());
    }

    #[tokio::test]
    async fn test_refresh_does_not_evict_when_full() {
        let transport = ScriptedTransport::with(vec![]);
        let clock = Arc::new(ManualClock::new(start()));
        let cache = WeatherCache::with_clock(transport.clone(), clock.clone()).with_max_entries(2);

        cache.fetch_weather_with_cache(1.0, 1.0, "2024-05-05").await.unwrap();
        cache.fetch_weather_with_cache(2.0, 2.0, "2024-05-05").await.unwrap();
        clock.advance(chrono::Duration::hours(2));
        cache.fetch_weather_with_cache(1.0, 1.0, "2024-05-05").await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.cached_at(2.0, 2.0).is_some());
    }

    #[tokio::test]
    async fn test_custom_ttl() {
        let transport = ScriptedTransport::with(vec![]);
        let clock = Arc::new(ManualClock::new(start()));
        let cache = WeatherCache::with_clock(transport.clone(), clock.clone())
            .with_ttl(Duration::from_secs(60));

        assert_eq!(cache.ttl(), chrono::Duration::seconds(60));
        cache.fetch_weather_with_cache(1.0, 1.0, "2024-05-05").await.unwrap();
        clock.advance(chrono::Duration::seconds(61));
        cache.fetch_weather_with_cache(1.0, 1.0, "2024-05-05").await.unwrap();

        assert_eq!(transport.calls(), 2);
    }

    /// Holds every caller at a barrier so concurrent misses overlap
    struct GatedTransport {
        gate: tokio::sync::Barrier,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherTransport for GatedTransport {
        async fn fetch_one_call(&self, _lat: f64, _lon: f64) -> Result<Value, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.wait().await;
            Ok(json!({"call": n, "daily": []}))
        }
    }

    #[tokio::test]
    async fn test_concurrent_misses_both_fetch() {
        let transport = Arc::new(GatedTransport {
            gate: tokio::sync::Barrier::new(2),
            calls: AtomicUsize::new(0),
        });
        let cache = WeatherCache::new(transport.clone());

        let (a, b) = tokio::join!(
            cache.fetch_weather_with_cache(1.0, 2.0, "2024-05-05"),
            cache.fetch_weather_with_cache(1.0, 2.0, "2024-05-05"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_ne!(a, b);
        assert_eq!(cache.len(), 1);

        // Whichever stored last is what later callers see
        let cached = cache.fetch_weather_with_cache(1.0, 2.0, "2024-05-05").await.unwrap();
        assert!(cached == a || cached == b);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fetch_error_maps_to_app_error() {
        let err: paddock_core::WeatherError = WeatherFetchError.into();
        assert!(matches!(err, paddock_core::WeatherError::FetchFailed));
    }
}
