// =============================================================================
// Runtime Configuration -- overlay settings with atomic save
// =============================================================================
//
// Every tunable of the candle overlay lives here: the watchlist, the initial
// selection, the refresh period, fallback behaviour and the provider request
// knobs.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.  The provider API key is never
// written to disk; it only comes from the environment.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::market_data::MAX_SERIES_LEN;
use crate::provider::client::DEFAULT_BASE_URL;
use crate::provider::OutputSize;
use crate::refresh::DEFAULT_REFRESH_PERIOD;
use crate::types::{FallbackPolicy, Interval};

pub const ENV_API_KEY: &str = "ALPHAVANTAGE_API_KEY";
pub const ENV_SYMBOLS: &str = "CANDLE_OVERLAY_SYMBOLS";
pub const ENV_BIND_ADDR: &str = "CANDLE_OVERLAY_BIND_ADDR";
pub const ENV_PROVIDER_URL: &str = "CANDLE_OVERLAY_PROVIDER_URL";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_symbols() -> Vec<String> {
    vec![
        "IBM".to_string(),
        "MSFT".to_string(),
        "AAPL".to_string(),
        "GOOGL".to_string(),
        "AMZN".to_string(),
    ]
}

fn default_symbol() -> String {
    "IBM".to_string()
}

fn default_refresh_period_secs() -> u64 {
    DEFAULT_REFRESH_PERIOD.as_secs()
}

fn default_series_cap() -> usize {
    MAX_SERIES_LEN
}

fn default_fallback_count() -> usize {
    MAX_SERIES_LEN
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_requests_per_minute() -> u32 {
    5
}

fn default_provider_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the candle overlay.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Selection ----------------------------------------------------------

    /// Symbols offered to the user.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Symbol selected at startup.
    #[serde(default = "default_symbol")]
    pub default_symbol: String,

    /// Interval selected at startup.
    #[serde(default)]
    pub default_interval: Interval,

    // --- Refresh ------------------------------------------------------------

    /// Period of the background refresh timer, in seconds.
    #[serde(default = "default_refresh_period_secs")]
    pub refresh_period_secs: u64,

    /// Start the background refresh timer on launch.
    #[serde(default = "default_true")]
    pub auto_refresh: bool,

    // --- Series & fallback --------------------------------------------------

    /// Maximum candles kept from a live payload.
    #[serde(default = "default_series_cap")]
    pub series_cap: usize,

    /// Number of candles synthesised when the live feed is unusable.
    #[serde(default = "default_fallback_count")]
    pub fallback_count: usize,

    /// What to hand back when the live feed is unusable.
    #[serde(default)]
    pub fallback_policy: FallbackPolicy,

    // --- Provider -----------------------------------------------------------

    #[serde(default = "default_provider_base_url")]
    pub provider_base_url: String,

    #[serde(default)]
    pub output_size: OutputSize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Local request budget; the free tier allows 5 calls per minute.
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: u32,

    // --- Server -------------------------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            default_symbol: default_symbol(),
            default_interval: Interval::default(),
            refresh_period_secs: default_refresh_period_secs(),
            auto_refresh: true,
            series_cap: default_series_cap(),
            fallback_count: default_fallback_count(),
            fallback_policy: FallbackPolicy::default(),
            provider_base_url: default_provider_base_url(),
            output_size: OutputSize::default(),
            request_timeout_secs: default_request_timeout_secs(),
            max_requests_per_minute: default_max_requests_per_minute(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            default_symbol = %config.default_symbol,
            fallback_policy = %config.fallback_policy,
            "runtime config loaded"
        );

        Ok(config.sanitised())
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply environment overrides. `lookup` is `std::env::var(..).ok()` in
    /// production.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_SYMBOLS) {
            let symbols: Vec<String> = raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if symbols.is_empty() {
                warn!(var = ENV_SYMBOLS, "empty symbol list in environment -- ignored");
            } else {
                self.symbols = symbols;
            }
        }
        if let Some(addr) = lookup(ENV_BIND_ADDR).filter(|s| !s.trim().is_empty()) {
            self.bind_addr = addr.trim().to_string();
        }
        if let Some(url) = lookup(ENV_PROVIDER_URL).filter(|s| !s.trim().is_empty()) {
            self.provider_base_url = url.trim().to_string();
        }
    }

    /// Clamp values that would make the overlay misbehave.
    pub fn sanitised(mut self) -> Self {
        if self.refresh_period_secs == 0 {
            warn!("refresh_period_secs = 0 -- using default");
            self.refresh_period_secs = default_refresh_period_secs();
        }
        if self.series_cap == 0 || self.series_cap > MAX_SERIES_LEN {
            warn!(series_cap = self.series_cap, max = MAX_SERIES_LEN, "series_cap out of range -- clamped");
            self.series_cap = self.series_cap.clamp(1, MAX_SERIES_LEN);
        }
        if self.fallback_count == 0 {
            warn!("fallback_count = 0 -- using default");
            self.fallback_count = default_fallback_count();
        } else if self.fallback_count > MAX_SERIES_LEN {
            warn!(fallback_count = self.fallback_count, max = MAX_SERIES_LEN, "fallback_count out of range -- clamped");
            self.fallback_count = MAX_SERIES_LEN;
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }
        if self.max_requests_per_minute == 0 {
            self.max_requests_per_minute = 1;
        }
        self.default_symbol = self.default_symbol.trim().to_uppercase();
        if self.default_symbol.is_empty() {
            self.default_symbol = default_symbol();
        }
        self
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_period_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
