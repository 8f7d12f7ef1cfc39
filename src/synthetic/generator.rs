// =============================================================================
// Synthetic Data Generator -- fallback candle series
// =============================================================================
//
// A random walk anchored to the symbol's base price, stepping backwards in
// time from `now`. Each candle opens at the previous close and moves at most
// +-1% (scaled by the symbol's volatility). Highs and lows are widened from
// the open/close envelope, so the OHLC ordering holds by construction.
//
// This path never fails: it is what the orchestrator substitutes when the
// live feed is unusable.
// =============================================================================

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::debug;

use crate::market_data::options_flow::split_volume;
use crate::market_data::{Candle, CandleSeries, ResultEnvelope};
use crate::synthetic::profile::profile_for;
use crate::types::Interval;

/// Minimum synthetic volume before the symbol multiplier.
const VOLUME_FLOOR: f64 = 100_000.0;
/// Random volume span added on top of the floor.
const VOLUME_SPAN: f64 = 1_000_000.0;
/// Maximum wick extension beyond the body, as a fraction of price.
const WICK_FRACTION: f64 = 0.01;

/// Generate `count` candles for `symbol`, newest first, the newest stamped
/// `now` and each older one `interval` earlier.
pub fn generate<R: Rng + ?Sized>(
    symbol: &str,
    count: usize,
    interval: Interval,
    now: DateTime<Utc>,
    rng: &mut R,
) -> CandleSeries {
    let profile = profile_for(symbol);
    let step = Duration::minutes(interval.minutes());

    let mut candles = Vec::with_capacity(count);
    let mut prev_close = profile.base_price;

    for i in 0..count {
        let open = prev_close;
        let change: f64 = rng.gen_range(-1.0..=1.0);
        let price_move = change * profile.volatility / 100.0;
        let close = open * (1.0 + price_move);

        let high = open.max(close) * (1.0 + rng.gen::<f64>() * WICK_FRACTION);
        let low = open.min(close) * (1.0 - rng.gen::<f64>() * WICK_FRACTION);

        let raw_volume = rng.gen::<f64>() * VOLUME_SPAN + VOLUME_FLOOR;
        let volume = (raw_volume * profile.volume_multiplier).floor() as u64;
        let (put_volume, call_volume) = split_volume(volume, rng);

        candles.push(Candle {
            timestamp: now - step * i as i32,
            open,
            high,
            low,
            close,
            volume,
            put_volume: Some(put_volume),
            call_volume: Some(call_volume),
        });
        prev_close = close;
    }

    debug!(
        symbol,
        count,
        interval = %interval,
        base_price = profile.base_price,
        "synthetic series generated"
    );
    CandleSeries::from_unsorted(candles)
}

/// [`generate`] wrapped in a `success` envelope.
pub fn generate_envelope<R: Rng + ?Sized>(
    symbol: &str,
    count: usize,
    interval: Interval,
    now: DateTime<Utc>,
    rng: &mut R,
) -> ResultEnvelope {
    ResultEnvelope::success(generate(symbol, count, interval, now, rng))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::EnvelopeStatus;
    use chrono::TimeZone;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap()
    }

    #[test]
    fn produces_exact_count_descending() {
        let mut rng = StdRng::seed_from_u64(99);
        for count in [0usize, 1, 17, 100, 250] {
            let series = generate("AAPL", count, Interval::FiveMinutes, fixed_now(), &mut rng);
            assert_eq!(series.len(), count);
            assert!(series.is_strictly_descending());
        }
    }

    #[test]
    fn every_candle_is_well_formed() {
        let mut rng = StdRng::seed_from_u64(5);
        for symbol in ["IBM", "RELIANCE.BSE", "UNKNOWN"] {
            let series = generate(symbol, 500, Interval::OneMinute, fixed_now(), &mut rng);
            assert!(series.iter().all(Candle::is_well_formed), "{symbol}");
        }
    }

    #[test]
    fn timestamps_step_back_by_interval() {
        let mut rng = StdRng::seed_from_u64(3);
        let series = generate("MSFT", 4, Interval::FifteenMinutes, fixed_now(), &mut rng);
        let stamps: Vec<_> = series.iter().map(|c| c.timestamp).collect();
        assert_eq!(stamps[0], fixed_now());
        assert_eq!(stamps[3], fixed_now() - Duration::minutes(45));
    }

    #[test]
    fn newest_candle_is_stamped_now() {
        let mut rng = StdRng::seed_from_u64(11);
        let before = Utc::now();
        let series = generate("IBM", 10, Interval::FiveMinutes, Utc::now(), &mut rng);
        let newest = series.newest().unwrap().timestamp;
        assert!((newest - before).num_seconds().abs() <= 2);
    }

    #[test]
    fn walk_chains_open_to_previous_close() {
        let mut rng = StdRng::seed_from_u64(21);
        let series = generate("GOOGL", 50, Interval::FiveMinutes, fixed_now(), &mut rng);
        // Generation runs newest -> oldest, so each older candle's close is the
        // next newer candle's open.
        let candles = series.as_slice();
        assert_eq!(candles[0].open, 140.0);
        for pair in candles.windows(2) {
            assert_eq!(pair[1].open, pair[0].close);
        }
    }

    #[test]
    fn stubbed_rng_gives_exact_values() {
        // All draws are 0: change = -1, no wick extension, minimum volume.
        let mut rng = StepRng::new(0, 0);
        let series = generate("IBM", 2, Interval::FiveMinutes, fixed_now(), &mut rng);
        let first = &series.as_slice()[0];
        assert_eq!(first.open, 170.0);
        assert!((first.close - 168.3).abs() < 1e-9);
        assert_eq!(first.high, 170.0);
        assert!((first.low - 168.3).abs() < 1e-9);
        assert_eq!(first.volume, 100_000);
        assert_eq!(first.put_volume, Some(30_000));
        assert_eq!(first.call_volume, Some(30_000));

        let second = &series.as_slice()[1];
        assert!((second.close - 168.3 * 0.99).abs() < 1e-9);
    }

    #[test]
    fn volume_scales_with_profile() {
        let mut rng = StepRng::new(0, 0);
        let series = generate("AAPL", 1, Interval::FiveMinutes, fixed_now(), &mut rng);
        assert_eq!(series.newest().unwrap().volume, 250_000);
    }

    #[test]
    fn envelope_is_success() {
        let mut rng = StdRng::seed_from_u64(0);
        let env = generate_envelope("IBM", 100, Interval::FiveMinutes, fixed_now(), &mut rng);
        assert_eq!(env.status(), EnvelopeStatus::Success);
        assert_eq!(env.data().len(), 100);
    }
}
