//! Race-day lookup inside a One Call payload.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::types::RaceDate;

/// UTC calendar day of a daily record's `dt` (Unix seconds)
fn day_of(record: &Value) -> Option<NaiveDate> {
    let dt = record.get("dt")?.as_i64()?;
    DateTime::from_timestamp(dt, 0).map(|t| t.date_naive())
}

/// Find the first `daily` record that falls on the race date (UTC).
///
/// A payload without `daily`, an empty array, an unparseable race date,
/// or no matching day all give `None`.
pub fn select_race_day(payload: &Value, date: RaceDate) -> Option<Value> {
    let race_day = date.date()?;
    let daily = payload.get("daily")?.as_array()?;

    daily
        .iter()
        .find(|record| day_of(record) == Some(race_day))
        .cloned()
}
