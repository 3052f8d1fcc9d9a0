use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a cached location.
///
/// Latitude and longitude are each formatted to 4 fractional digits, so
/// coordinates that agree to roughly 11 m share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self(format!("{},{}", fixed4(latitude), fixed4(longitude)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Format with 4 fractional digits, rounding exact ties away from zero.
///
/// Plain `{:.4}` rounds ties to even and prints `-0.0` as `-0.0000`,
/// which would split one place across two keys.
fn fixed4(value: f64) -> String {
    // -0.0 + 0.0 == +0.0
    let value = value + 0.0;

    // A double lies exactly halfway between two 4-digit decimals iff it is
    // an odd multiple of 1/32 (five fractional digits ending in 5).
    let thirty_seconds = value * 32.0;
    if thirty_seconds.fract() == 0.0 && thirty_seconds % 2.0 != 0.0 {
        let units = (value.abs() * 10_000.0).ceil() as u64;
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{}{}.{:04}", sign, units / 10_000, units % 10_000);
    }

    format!("{:.4}", value)
}

/// Provider payload plus the daily record for race day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherResult {
    /// Raw One Call response, passed through untouched
    pub weather: serde_json::Value,
    /// Entry of `weather.daily` whose UTC date matches the race date
    pub race_day_forecast: Option<serde_json::Value>,
}

/// A cached result and when it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: WeatherResult,
    pub timestamp: DateTime<Utc>,
}

impl CacheEntry {
    /// True while `now - timestamp` is strictly below `ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now.signed_duration_since(self.timestamp) < ttl
    }
}

/// The calendar day a forecast is wanted for.
///
/// Built from a `NaiveDate`, a UTC timestamp, or a string. Strings that
/// don't parse produce a date that matches no forecast day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceDate(Option<NaiveDate>);

impl RaceDate {
    /// Parse `YYYY-MM-DD`, RFC 3339, or a naive `YYYY-MM-DDTHH:MM[:SS]` read as UTC.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Self(Some(date));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Self(Some(dt.with_timezone(&Utc).date_naive()));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Self(Some(dt.date()));
            }
        }

        tracing::debug!("Unparseable race date {:?}; no forecast day will match", raw);
        Self(None)
    }

    /// The UTC calendar day, if the input was understood
    pub fn date(&self) -> Option<NaiveDate> {
        self.0
    }
}

impl From<NaiveDate> for RaceDate {
    fn from(date: NaiveDate) -> Self {
        Self(Some(date))
    }
}

impl From<DateTime<Utc>> for RaceDate {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(Some(dt.date_naive()))
    }
}

impl From<&str> for RaceDate {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for RaceDate {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&String> for RaceDate {
    fn from(raw: &String) -> Self {
        Self::parse(raw)
    }
}
