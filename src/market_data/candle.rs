use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Maximum number of candles kept in a normalised series.
pub const MAX_SERIES_LEN: usize = 100;

/// A single OHLCV candle with the synthetic put/call overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_volume: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_volume: Option<u64>,
}

impl Candle {
    /// Positive, finite prices with `low <= min(open, close) <= max(open, close) <= high`.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        self.low <= self.open.min(self.close) && self.open.max(self.close) <= self.high
    }
}

/// Padded y-axis domain for a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceBounds {
    pub floor: f64,
    pub ceiling: f64,
}

// ---------------------------------------------------------------------------
// CandleSeries -- newest-first, capped
// ---------------------------------------------------------------------------

/// Candles ordered newest first. Consumers that draw left-to-right should use
/// [`CandleSeries::chronological`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sort descending by timestamp. The sort is stable, so candles sharing a
    /// timestamp keep their input order.
    pub fn from_unsorted(mut candles: Vec<Candle>) -> Self {
        candles.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Self { candles }
    }

    /// Keep the newest `cap` candles, dropping the oldest excess.
    pub fn truncated(mut self, cap: usize) -> Self {
        self.candles.truncate(cap);
        self
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    pub fn newest(&self) -> Option<&Candle> {
        self.candles.first()
    }

    /// True when every timestamp is strictly older than the one before it.
    pub fn is_strictly_descending(&self) -> bool {
        self.candles
            .windows(2)
            .all(|pair| pair[0].timestamp > pair[1].timestamp)
    }

    /// Oldest-first copy of the series.
    pub fn chronological(&self) -> Vec<Candle> {
        self.candles.iter().rev().cloned().collect()
    }

    /// Lowest low and highest high, each pushed out by `padding_ratio` of the
    /// range. `None` for an empty series.
    pub fn price_bounds(&self, padding_ratio: f64) -> Option<PriceBounds> {
        let min = self.candles.iter().map(|c| c.low).reduce(f64::min)?;
        let max = self.candles.iter().map(|c| c.high).reduce(f64::max)?;
        let padding = (max - min) * padding_ratio;
        Some(PriceBounds {
            floor: min - padding,
            ceiling: max + padding,
        })
    }
}

impl From<CandleSeries> for Vec<Candle> {
    fn from(series: CandleSeries) -> Self {
        series.candles
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_candle(minute: i64, close: f64) -> Candle {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap();
        Candle {
            timestamp: base + Duration::minutes(minute),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000,
            put_volume: None,
            call_volume: None,
        }
    }

    #[test]
    fn from_unsorted_orders_newest_first() {
        let series = CandleSeries::from_unsorted(vec![
            sample_candle(0, 100.0),
            sample_candle(10, 102.0),
            sample_candle(5, 101.0),
        ]);
        let closes: Vec<f64> = series.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![102.0, 101.0, 100.0]);
        assert!(series.is_strictly_descending());
    }

    #[test]
    fn equal_timestamps_keep_input_order() {
        let series = CandleSeries::from_unsorted(vec![
            sample_candle(0, 1.0),
            sample_candle(5, 2.0),
            sample_candle(5, 3.0),
        ]);
        let closes: Vec<f64> = series.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![2.0, 3.0, 1.0]);
        assert!(!series.is_strictly_descending());
    }

    #[test]
    fn truncation_drops_oldest() {
        let candles = (0..120).map(|i| sample_candle(i, 100.0 + i as f64)).collect();
        let series = CandleSeries::from_unsorted(candles).truncated(MAX_SERIES_LEN);
        assert_eq!(series.len(), MAX_SERIES_LEN);
        assert_eq!(series.newest().map(|c| c.close), Some(219.0));
        assert_eq!(series.as_slice().last().map(|c| c.close), Some(120.0));
    }

    #[test]
    fn chronological_reverses() {
        let series =
            CandleSeries::from_unsorted(vec![sample_candle(0, 1.0), sample_candle(5, 2.0)]);
        let chrono_view = series.chronological();
        assert_eq!(chrono_view[0].close, 1.0);
        assert_eq!(chrono_view[1].close, 2.0);
    }

    #[test]
    fn price_bounds_pad_the_range() {
        let series =
            CandleSeries::from_unsorted(vec![sample_candle(0, 100.0), sample_candle(5, 110.0)]);
        // lows/highs span 99..111, range 12, 5% padding = 0.6
        let bounds = series.price_bounds(0.05).unwrap();
        assert!((bounds.floor - 98.4).abs() < 1e-9);
        assert!((bounds.ceiling - 111.6).abs() < 1e-9);
        assert!(CandleSeries::empty().price_bounds(0.05).is_none());
    }

    #[test]
    fn well_formed_checks_ordering_and_sign() {
        let good = sample_candle(0, 100.0);
        assert!(good.is_well_formed());

        let mut inverted = good.clone();
        inverted.high = 99.0;
        assert!(!inverted.is_well_formed());

        let mut negative = good.clone();
        negative.low = -1.0;
        assert!(!negative.is_well_formed());

        let mut nan = good;
        nan.close = f64::NAN;
        assert!(!nan.is_well_formed());
    }

    #[test]
    fn serialises_with_camel_case_overlay_fields() {
        let mut candle = sample_candle(0, 100.0);
        candle.put_volume = Some(300);
        candle.call_volume = Some(450);
        let json = serde_json::to_value(&candle).unwrap();
        assert_eq!(json["putVolume"], 300);
        assert_eq!(json["callVolume"], 450);
        assert_eq!(json["volume"], 1_000);

        let bare = serde_json::to_value(sample_candle(0, 1.0)).unwrap();
        assert!(bare.get("putVolume").is_none());
    }
}
