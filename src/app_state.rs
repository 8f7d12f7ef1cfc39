// =============================================================================
// Central Application State -- Candle Overlay
// =============================================================================
//
// Ties the runtime configuration and the refresh controller together and
// builds the status snapshot served by the REST API.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for the config and the error log.
//   - The refresh controller manages its own interior mutability.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::ErrorKind;
use crate::market_data::PriceBounds;
use crate::orchestrator::FallbackReason;
use crate::provider::RateLimitSnapshot;
use crate::refresh::{RefreshController, RefreshNotice};
use crate::runtime_config::RuntimeConfig;
use crate::types::{DataOrigin, FetchState, Interval};

/// Padding applied to the chart's y-domain, as a fraction of the price range.
pub const PRICE_PADDING_RATIO: f64 = 0.05;

// =============================================================================
// Error Record
// =============================================================================

/// A failed refresh, kept for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// AppState
// =============================================================================

/// Shared across all request handlers via `Arc<AppState>`.
pub struct AppState {
    /// Incremented on every refresh, selection change or recorded error.
    pub state_version: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    pub controller: Arc<RefreshController>,
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Instant when the service was started. Used for uptime.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig, controller: Arc<RefreshController>) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            runtime_config: Arc::new(RwLock::new(config)),
            controller,
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    /// Record an error. Oldest entries are evicted past [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, kind: ErrorKind, message: String) {
        let record = ErrorRecord {
            kind,
            message,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    /// Follow the controller's notices: bump the version on every refresh and
    /// record failed invocations, timer-driven ones included.
    pub fn spawn_notice_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let mut notices = self.controller.subscribe();

        tokio::spawn(async move {
            loop {
                let notice = match notices.recv().await {
                    Ok(notice) => notice,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "refresh notice listener lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(state) = weak.upgrade() else { break };
                match notice {
                    RefreshNotice::Refreshed { .. } => {
                        state.increment_version();
                    }
                    RefreshNotice::Failed { kind, message, .. } => {
                        state.push_error(kind, message);
                    }
                }
            }
        })
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Serialisable view of the current selection and the data on display,
    /// served by `GET /api/v1/status`.
    pub fn build_status(&self) -> StatusSnapshot {
        let controller = &self.controller;
        let selection = controller.selection();
        let outcome = controller.latest_outcome();
        let envelope = controller.envelope();

        let (origin, fallback) = match &outcome {
            Some(o) => (Some(o.origin), o.fallback.clone()),
            None => (None, None),
        };

        StatusSnapshot {
            symbol: selection.symbol,
            interval: selection.interval,
            last_refreshed: controller.last_refreshed(),
            fetch_state: controller.orchestrator().state(),
            origin,
            fallback,
            bars: envelope.data().len(),
            price_bounds: envelope.data().price_bounds(PRICE_PADDING_RATIO),
            refresh_period_secs: controller.period().as_secs(),
            timer_running: controller.is_running(),
            request_budget: controller.orchestrator().budget(),
            recent_errors: self.recent_errors.read().clone(),
            state_version: self.current_state_version(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            server_time: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub symbol: String,
    pub interval: Interval,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub fetch_state: FetchState,
    pub origin: Option<DataOrigin>,
    pub fallback: Option<FallbackReason>,
    pub bars: usize,
    pub price_bounds: Option<PriceBounds>,
    pub refresh_period_secs: u64,
    pub timer_running: bool,
    pub request_budget: RateLimitSnapshot,
    pub recent_errors: Vec<ErrorRecord>,
    pub state_version: u64,
    pub uptime_secs: u64,
    pub server_time: i64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::orchestrator::tests::StubTransport;
    use crate::orchestrator::{DataFetchOrchestrator, FetchRequest, FetchSettings};
    use crate::refresh::DEFAULT_REFRESH_PERIOD;
    use rand::rngs::mock::StepRng;

    fn state() -> AppState {
        let transport = StubTransport::new(|_| Err(FeedError::HttpStatus { status: 500 }));
        let orchestrator = Arc::new(DataFetchOrchestrator::with_rng(
            transport,
            FetchSettings::default(),
            Box::new(StepRng::new(0, 0)),
        ));
        let controller = Arc::new(RefreshController::new(
            orchestrator,
            FetchRequest::new("AAPL", Interval::OneMinute),
            DEFAULT_REFRESH_PERIOD,
        ));
        AppState::new(RuntimeConfig::default(), controller)
    }

    #[test]
    fn status_before_first_refresh() {
        let state = state();
        let status = state.build_status();
        assert_eq!(status.symbol, "AAPL");
        assert_eq!(status.interval, Interval::OneMinute);
        assert_eq!(status.fetch_state, FetchState::Idle);
        assert!(status.last_refreshed.is_none());
        assert!(status.origin.is_none());
        assert_eq!(status.bars, 0);
        assert!(status.price_bounds.is_none());
        assert_eq!(status.refresh_period_secs, 120);
        assert!(!status.timer_running);
    }

    #[tokio::test]
    async fn status_reflects_fallback() {
        let state = state();
        state.controller.refresh().await.unwrap();

        let status = state.build_status();
        assert_eq!(status.fetch_state, FetchState::FallenBack);
        assert_eq!(status.origin, Some(DataOrigin::Synthetic));
        assert_eq!(status.bars, 100);
        assert!(status.price_bounds.is_some());
        assert_eq!(
            status.fallback.map(|r| r.kind),
            Some(ErrorKind::TransportError)
        );
    }

    #[tokio::test]
    async fn listener_tracks_refreshes() {
        let state = Arc::new(state());
        let listener = state.spawn_notice_listener();
        let v0 = state.current_state_version();

        state.controller.refresh().await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while state.current_state_version() == v0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(state.recent_errors.read().is_empty());
        listener.abort();
    }

    #[test]
    fn error_log_is_capped() {
        let state = state();
        let v0 = state.current_state_version();
        for i in 0..(MAX_RECENT_ERRORS + 5) {
            state.push_error(ErrorKind::RefreshInvocationError, format!("err {i}"));
        }
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].message, "err 5");
        assert!(state.current_state_version() > v0);
    }
}
