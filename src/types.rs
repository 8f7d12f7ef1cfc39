// =============================================================================
// Shared types used across the candle overlay service
// =============================================================================

use serde::{Deserialize, Serialize};

/// Application-level chart interval, as selected by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
}

impl Interval {
    /// Every interval the dashboard offers, shortest first.
    pub const ALL: [Interval; 5] = [
        Interval::OneMinute,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::OneHour,
    ];

    /// Parse an application token such as `"5m"` or `"1h"`.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "1m" => Some(Self::OneMinute),
            "5m" => Some(Self::FiveMinutes),
            "15m" => Some(Self::FifteenMinutes),
            "30m" => Some(Self::ThirtyMinutes),
            "1h" => Some(Self::OneHour),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
        }
    }

    /// Human-readable label used by the symbol/interval picker.
    pub fn label(&self) -> &'static str {
        match self {
            Self::OneMinute => "1 min",
            Self::FiveMinutes => "5 min",
            Self::FifteenMinutes => "15 min",
            Self::ThirtyMinutes => "30 min",
            Self::OneHour => "1 hour",
        }
    }

    /// Bucket width in minutes.
    pub fn minutes(&self) -> i64 {
        match self {
            Self::OneMinute => 1,
            Self::FiveMinutes => 5,
            Self::FifteenMinutes => 15,
            Self::ThirtyMinutes => 30,
            Self::OneHour => 60,
        }
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::FiveMinutes
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single orchestrator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchState {
    Idle,
    Fetching,
    Succeeded,
    FallenBack,
    Failed,
}

impl Default for FetchState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for FetchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Fetching => write!(f, "Fetching"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::FallenBack => write!(f, "FallenBack"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// What the orchestrator returns when the live feed cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Substitute a synthetic series; the envelope stays `success`.
    Synthetic,
    /// Return `{status: "error", data: []}`.
    Empty,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::Synthetic
    }
}

impl std::fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Synthetic => write!(f, "synthetic"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// Where the candles in the current envelope came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    Live,
    Synthetic,
    None,
}

impl std::fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Synthetic => write!(f, "synthetic"),
            Self::None => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_tokens_parse_and_print() {
        for interval in Interval::ALL {
            assert_eq!(Interval::parse(interval.as_str()), Some(interval));
            assert_eq!(interval.to_string(), interval.as_str());
        }
        assert_eq!(Interval::parse("bogus"), None);
        assert_eq!(Interval::parse(" 15m "), Some(Interval::FifteenMinutes));
    }

    #[test]
    fn interval_serde_uses_app_tokens() {
        let json = serde_json::to_string(&Interval::OneHour).unwrap();
        assert_eq!(json, "\"1h\"");
        let parsed: Interval = serde_json::from_str("\"30m\"").unwrap();
        assert_eq!(parsed, Interval::ThirtyMinutes);
        assert_eq!(parsed.minutes(), 30);
    }

    #[test]
    fn fallback_policy_defaults_to_synthetic() {
        assert_eq!(FallbackPolicy::default(), FallbackPolicy::Synthetic);
        let parsed: FallbackPolicy = serde_json::from_str("\"empty\"").unwrap();
        assert_eq!(parsed, FallbackPolicy::Empty);
    }
}
