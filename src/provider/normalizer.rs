// =============================================================================
// Response Normalizer -- provider time-series payload -> CandleSeries
// =============================================================================
//
// Payloads are untrusted. Classification decides which branch the orchestrator
// takes; normalisation only ever fails on the top-level shape. Individual rows
// that cannot be parsed, or whose prices break the OHLC ordering, are skipped.
//
// Expected shape:
// ```json
// { "Meta Data": { ... },
//   "Time Series (5min)": {
//       "2024-01-01 09:30:00": { "1. open": "100.0", "2. high": "101.0",
//                                "3. low": "99.5", "4. close": "100.5",
//                                "5. volume": "1000" } } }
// ```
// =============================================================================

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rand::Rng;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{FeedError, Result};
use crate::market_data::options_flow::split_volume;
use crate::market_data::{Candle, CandleSeries};
use crate::provider::interval::interval_from_provider;
use crate::types::Interval;

/// Substring identifying the time-series container key.
const SERIES_KEY_MARKER: &str = "Time Series";

/// Marker keys the provider uses instead of data when throttling.
const RATE_LIMIT_MARKERS: &[&str] = &["Note", "Information"];
/// Marker key for an explicit provider-side error.
const ERROR_MARKER: &str = "Error Message";

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// What a provider payload turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderPayload {
    /// Contains a time-series container under `key`.
    TimeSeries { key: String },
    /// Throttled: `"Note"` / `"Information"` marker.
    RateLimited(String),
    /// Explicit `"Error Message"` marker.
    ProviderError(String),
    /// None of the above.
    Unrecognized,
}

impl ProviderPayload {
    pub fn classify(json: &Value) -> Self {
        let Some(obj) = json.as_object() else {
            return Self::Unrecognized;
        };
        if let Some(key) = find_series_key(obj) {
            return Self::TimeSeries { key };
        }
        if let Some(msg) = obj.get(ERROR_MARKER) {
            return Self::ProviderError(marker_text(msg));
        }
        for marker in RATE_LIMIT_MARKERS {
            if let Some(msg) = obj.get(*marker) {
                return Self::RateLimited(marker_text(msg));
            }
        }
        Self::Unrecognized
    }

    /// Interval encoded in the series key, e.g. `Time Series (15min)`.
    pub fn series_interval(&self) -> Option<Interval> {
        let Self::TimeSeries { key } = self else {
            return None;
        };
        let open = key.find('(')?;
        let close = key[open..].find(')')? + open;
        interval_from_provider(key[open + 1..close].trim())
    }
}

fn marker_text(value: &Value) -> String {
    value
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

fn find_series_key(obj: &Map<String, Value>) -> Option<String> {
    obj.keys().find(|k| k.contains(SERIES_KEY_MARKER)).cloned()
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/// Normalise a provider payload into a newest-first series of at most `cap`
/// candles.
///
/// Fails with [`FeedError::MalformedResponse`] only when no time-series
/// container is present or its value is not an object.
pub fn normalize<R: Rng + ?Sized>(json: &Value, cap: usize, rng: &mut R) -> Result<CandleSeries> {
    let obj = json
        .as_object()
        .ok_or_else(|| FeedError::MalformedResponse("payload is not a JSON object".to_string()))?;
    let key = find_series_key(obj).ok_or_else(|| {
        FeedError::MalformedResponse("missing time series in response".to_string())
    })?;
    let rows = obj.get(&key).and_then(Value::as_object).ok_or_else(|| {
        FeedError::MalformedResponse(format!("'{key}' missing or not an object"))
    })?;

    let mut candles = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for (ts_str, row) in rows {
        match parse_row(ts_str, row, rng) {
            Some(candle) => candles.push(candle),
            None => skipped += 1,
        }
    }

    let series = CandleSeries::from_unsorted(candles).truncated(cap);
    debug!(
        series_key = %key,
        rows = rows.len(),
        skipped,
        kept = series.len(),
        "provider payload normalised"
    );
    Ok(series)
}

fn parse_row<R: Rng + ?Sized>(ts_str: &str, row: &Value, rng: &mut R) -> Option<Candle> {
    let fields = row.as_object()?;
    let timestamp = parse_timestamp(ts_str)?;
    let open = parse_price(fields, "1. open")?;
    let high = parse_price(fields, "2. high")?;
    let low = parse_price(fields, "3. low")?;
    let close = parse_price(fields, "4. close")?;
    let volume = parse_volume(fields);
    let (put_volume, call_volume) = split_volume(volume, rng);

    let candle = Candle {
        timestamp,
        open,
        high,
        low,
        close,
        volume,
        put_volume: Some(put_volume),
        call_volume: Some(call_volume),
    };
    if !candle.is_well_formed() {
        debug!(ts = ts_str, "skipping row with inconsistent OHLC");
        return None;
    }
    Some(candle)
}

/// The provider sends numbers as strings; accept bare numbers too.
fn parse_price(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    let val = fields.get(key)?;
    match val {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Missing or unparseable volume is 0.
fn parse_volume(fields: &Map<String, Value>) -> u64 {
    let Some(val) = fields.get("5. volume").or_else(|| fields.get("6. volume")) else {
        return 0;
    };
    let parsed = match val {
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_units))
        }
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_units)),
        _ => None,
    };
    parsed.unwrap_or(0)
}

fn whole_units(v: f64) -> Option<u64> {
    (v.is_finite() && v >= 0.0).then(|| v.floor() as u64)
}

/// Intraday keys are naive exchange-local times; they are taken as UTC.
fn parse_timestamp(ts_str: &str) -> Option<DateTime<Utc>> {
    let ts_str = ts_str.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(ts_str, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(ts_str, "%Y-%m-%d %H:%M") {
        return Some(dt.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(ts_str, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
    }
    DateTime::parse_from_rfc3339(ts_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
