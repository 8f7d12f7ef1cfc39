// =============================================================================
// Data Fetch Orchestrator -- live provider first, synthetic fallback second
// =============================================================================
//
// Idle -> Fetching -> { Succeeded | FallenBack | Failed }
//
//   transport failure (network / non-2xx)      -> fallback
//   rate-limit or error marker in the payload  -> fallback
//   local request budget spent                 -> fallback (no request sent)
//   payload shape not recognised               -> fallback
//   well-formed time series                    -> Succeeded
//
// "Fallback" means FallenBack + synthetic series under the default policy, or
// Failed + empty error envelope under `FallbackPolicy::Empty`. Either way the
// caller always receives a well-formed envelope; `fetch` has no error path.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, FeedError, Result};
use crate::market_data::{CandleSeries, ResultEnvelope, MAX_SERIES_LEN};
use crate::provider::{
    normalize, OutputSize, ProviderPayload, ProviderRequest, QuoteTransport, RateLimitSnapshot,
    RateLimitTracker,
};
use crate::runtime_config::RuntimeConfig;
use crate::synthetic::generate_envelope;
use crate::types::{DataOrigin, FallbackPolicy, FetchState, Interval};

// =============================================================================
// Request / settings / outcome
// =============================================================================

/// Inbound request from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub symbol: String,
    pub interval: Interval,
    /// Optional range; accepted but not forwarded to the intraday provider.
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl FetchRequest {
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into().trim().to_uppercase(),
            interval,
            from: None,
            to: None,
        }
    }

    /// Same symbol and interval; the range does not change what is displayed.
    pub fn same_selection(&self, other: &FetchRequest) -> bool {
        self.symbol == other.symbol && self.interval == other.interval
    }
}

/// Tunables for the orchestrator, derived from [`RuntimeConfig`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub series_cap: usize,
    pub fallback_count: usize,
    pub fallback_policy: FallbackPolicy,
    pub output_size: OutputSize,
    pub max_requests_per_minute: u32,
}

impl FetchSettings {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            series_cap: config.series_cap,
            fallback_count: config.fallback_count,
            fallback_policy: config.fallback_policy,
            output_size: config.output_size,
            max_requests_per_minute: config.max_requests_per_minute,
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            series_cap: MAX_SERIES_LEN,
            fallback_count: MAX_SERIES_LEN,
            fallback_policy: FallbackPolicy::Synthetic,
            output_size: OutputSize::Compact,
            max_requests_per_minute: 5,
        }
    }
}

/// Why the live path was abandoned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackReason {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&FeedError> for FallbackReason {
    fn from(err: &FeedError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result of one orchestrator invocation.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub request: FetchRequest,
    pub state: FetchState,
    pub origin: DataOrigin,
    pub envelope: ResultEnvelope,
    pub fallback: Option<FallbackReason>,
    pub completed_at: DateTime<Utc>,
}

// =============================================================================
// DataFetchOrchestrator
// =============================================================================

pub struct DataFetchOrchestrator {
    transport: Arc<dyn QuoteTransport>,
    settings: FetchSettings,
    budget: RateLimitTracker,
    rng: Mutex<Box<dyn RngCore + Send>>,
    state: RwLock<FetchState>,
}

impl DataFetchOrchestrator {
    /// Create an orchestrator with an entropy-seeded random source.
    pub fn new(transport: Arc<dyn QuoteTransport>, settings: FetchSettings) -> Self {
        Self::with_rng(transport, settings, Box::new(StdRng::from_entropy()))
    }

    /// Create an orchestrator drawing all synthetic values from `rng`.
    pub fn with_rng(
        transport: Arc<dyn QuoteTransport>,
        settings: FetchSettings,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        Self {
            transport,
            budget: RateLimitTracker::new(settings.max_requests_per_minute),
            settings,
            rng: Mutex::new(rng),
            state: RwLock::new(FetchState::Idle),
        }
    }

    /// State reached by the most recent invocation.
    pub fn state(&self) -> FetchState {
        *self.state.read()
    }

    pub fn budget(&self) -> RateLimitSnapshot {
        self.budget.snapshot()
    }

    /// Fetch candles for `request`. Never fails: every path ends in a
    /// well-formed envelope.
    pub async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        *self.state.write() = FetchState::Fetching;
        let mut in_flight = InFlight {
            state: &self.state,
            settled: false,
        };

        let outcome = match self.fetch_live(request).await {
            Ok(series) => {
                info!(
                    symbol = %request.symbol,
                    interval = %request.interval,
                    bars = series.len(),
                    "live candles fetched"
                );
                FetchOutcome {
                    request: request.clone(),
                    state: FetchState::Succeeded,
                    origin: DataOrigin::Live,
                    envelope: ResultEnvelope::success(series),
                    fallback: None,
                    completed_at: Utc::now(),
                }
            }
            Err(err) => self.fall_back(request, &err),
        };

        *self.state.write() = outcome.state;
        in_flight.settled = true;
        outcome
    }

    async fn fetch_live(&self, request: &FetchRequest) -> Result<CandleSeries> {
        if request.from.is_some() || request.to.is_some() {
            debug!(
                from = ?request.from,
                to = ?request.to,
                "range accepted but not forwarded to the intraday provider"
            );
        }

        if !self.budget.try_acquire() {
            return Err(FeedError::ProviderLimitReached(
                "local per-minute request budget spent".to_string(),
            ));
        }

        let provider_request =
            ProviderRequest::intraday(&request.symbol, request.interval, self.settings.output_size);
        let json = self.transport.fetch(&provider_request).await?;

        match ProviderPayload::classify(&json) {
            payload @ ProviderPayload::TimeSeries { .. } => {
                if let Some(found) = payload.series_interval() {
                    if found != request.interval {
                        warn!(
                            requested = %request.interval,
                            received = %found,
                            "provider returned a different interval than requested"
                        );
                    }
                }
                let mut rng = self.rng.lock();
                normalize(&json, self.settings.series_cap, &mut **rng)
            }
            ProviderPayload::RateLimited(note) => Err(FeedError::ProviderLimitReached(note)),
            ProviderPayload::ProviderError(message) => {
                Err(FeedError::ProviderLimitReached(message))
            }
            ProviderPayload::Unrecognized => Err(FeedError::MalformedResponse(
                "unrecognised payload shape".to_string(),
            )),
        }
    }

    fn fall_back(&self, request: &FetchRequest, err: &FeedError) -> FetchOutcome {
        let reason = FallbackReason::from(err);

        match self.settings.fallback_policy {
            FallbackPolicy::Synthetic => {
                warn!(
                    symbol = %request.symbol,
                    kind = %reason.kind,
                    error = %err,
                    count = self.settings.fallback_count,
                    "live fetch unusable -- substituting synthetic candles"
                );
                let now = Utc::now();
                let envelope = {
                    let mut rng = self.rng.lock();
                    generate_envelope(
                        &request.symbol,
                        self.settings.fallback_count,
                        request.interval,
                        now,
                        &mut **rng,
                    )
                };
                FetchOutcome {
                    request: request.clone(),
                    state: FetchState::FallenBack,
                    origin: DataOrigin::Synthetic,
                    envelope,
                    fallback: Some(reason),
                    completed_at: now,
                }
            }
            FallbackPolicy::Empty => {
                warn!(
                    symbol = %request.symbol,
                    kind = %reason.kind,
                    error = %err,
                    "live fetch unusable -- returning empty error envelope"
                );
                FetchOutcome {
                    request: request.clone(),
                    state: FetchState::Failed,
                    origin: DataOrigin::None,
                    envelope: ResultEnvelope::error(),
                    fallback: Some(reason),
                    completed_at: Utc::now(),
                }
            }
        }
    }
}

/// Leaves the state truthful when a fetch ends without an outcome: `Failed`
/// if the transport panicked, `Idle` if the future was cancelled.
struct InFlight<'a> {
    state: &'a RwLock<FetchState>,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let state = if std::thread::panicking() {
            FetchState::Failed
        } else {
            FetchState::Idle
        };
        warn!(state = %state, "fetch ended without an outcome");
        *self.state.write() = state;
    }
}

impl std::fmt::Debug for DataFetchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFetchOrchestrator")
            .field("settings", &self.settings)
            .field("budget", &self.budget)
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
