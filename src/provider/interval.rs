// =============================================================================
// Interval Mapper -- application interval token -> provider interval token
// =============================================================================

use crate::types::Interval;

/// Provider token used when the application token is not recognised.
pub const DEFAULT_PROVIDER_INTERVAL: &str = "5min";

/// Provider token for a known interval.
pub fn provider_interval(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMinute => "1min",
        Interval::FiveMinutes => "5min",
        Interval::FifteenMinutes => "15min",
        Interval::ThirtyMinutes => "30min",
        Interval::OneHour => "60min",
    }
}

/// Map a raw application token (e.g. `"1h"`) to the provider's token
/// (`"60min"`). Unknown tokens map to `"5min"`.
pub fn map_interval_token(token: &str) -> &'static str {
    Interval::parse(token)
        .map(provider_interval)
        .unwrap_or(DEFAULT_PROVIDER_INTERVAL)
}

/// Inverse of [`provider_interval`].
pub fn interval_from_provider(token: &str) -> Option<Interval> {
    match token {
        "1min" => Some(Interval::OneMinute),
        "5min" => Some(Interval::FiveMinutes),
        "15min" => Some(Interval::FifteenMinutes),
        "30min" => Some(Interval::ThirtyMinutes),
        "60min" => Some(Interval::OneHour),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_tokens() {
        assert_eq!(map_interval_token("1m"), "1min");
        assert_eq!(map_interval_token("5m"), "5min");
        assert_eq!(map_interval_token("15m"), "15min");
        assert_eq!(map_interval_token("30m"), "30min");
        assert_eq!(map_interval_token("1h"), "60min");
    }

    #[test]
    fn unknown_token_defaults_to_five_minutes() {
        assert_eq!(map_interval_token("bogus"), "5min");
        assert_eq!(map_interval_token(""), "5min");
        assert_eq!(map_interval_token("1d"), "5min");
    }

    #[test]
    fn provider_tokens_invert() {
        for interval in Interval::ALL {
            assert_eq!(
                interval_from_provider(provider_interval(interval)),
                Some(interval)
            );
        }
        assert!(interval_from_provider("daily").is_none());
    }
}
