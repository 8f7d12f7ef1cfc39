// =============================================================================
// Refresh Controller -- periodic and manual re-fetch of the current selection
// =============================================================================
//
// Owns the current (symbol, interval) selection, the latest fetch outcome,
// the last-refreshed timestamp and a single background timer task.
//
// Lifecycle:
//   start()   spawns the timer; first tick one full period after start
//   stop()    aborts the timer and waits for it to finish; no-op if stopped
//   drop      aborts the timer as a last resort
//
// The timer task only holds a `Weak` reference between ticks, so dropping the
// controller is enough to end it. A fetch whose selection was replaced while
// it was in flight is discarded rather than overwriting the newer data.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{ErrorKind, FeedError, Result};
use crate::market_data::ResultEnvelope;
use crate::orchestrator::{DataFetchOrchestrator, FetchOutcome, FetchRequest};
use crate::types::{DataOrigin, FetchState, Interval};

/// Default period of the background timer.
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(120);

const NOTICE_CAPACITY: usize = 16;

/// Transient notification published after every refresh attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefreshNotice {
    Refreshed {
        symbol: String,
        interval: Interval,
        state: FetchState,
        origin: DataOrigin,
        bars: usize,
        at: DateTime<Utc>,
    },
    Failed {
        kind: ErrorKind,
        message: String,
        at: DateTime<Utc>,
    },
}

pub struct RefreshController {
    orchestrator: Arc<DataFetchOrchestrator>,
    selection: RwLock<FetchRequest>,
    latest: RwLock<Option<FetchOutcome>>,
    last_refreshed: RwLock<Option<DateTime<Utc>>>,
    period: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    notices: broadcast::Sender<RefreshNotice>,
}

impl RefreshController {
    pub fn new(
        orchestrator: Arc<DataFetchOrchestrator>,
        initial: FetchRequest,
        period: Duration,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            orchestrator,
            selection: RwLock::new(initial),
            latest: RwLock::new(None),
            last_refreshed: RwLock::new(None),
            period,
            timer: Mutex::new(None),
            notices,
        }
    }

    // -------------------------------------------------------------------------
    // Timer lifecycle
    // -------------------------------------------------------------------------

    /// Start the background timer. Calling it while already running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut timer = self.timer.lock();
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("refresh timer already running");
            return;
        }

        let weak = Arc::downgrade(self);
        let period = self.period;
        *timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(controller) = weak.upgrade() else {
                    debug!("refresh controller dropped -- timer exiting");
                    break;
                };
                if let Err(e) = controller.refresh().await {
                    warn!(error = %e, "timed refresh failed");
                }
            }
        }));

        info!(period_secs = period.as_secs(), "refresh timer started");
    }

    /// Stop the background timer and wait until it has finished. No-op if the
    /// timer is not running.
    pub async fn stop(&self) {
        let handle = self.timer.lock().take();
        let Some(handle) = handle else {
            debug!("refresh timer already stopped");
            return;
        };

        handle.abort();
        match handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(error = %e, "refresh timer ended abnormally"),
        }
        info!("refresh timer stopped");
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // -------------------------------------------------------------------------
    // Triggers
    // -------------------------------------------------------------------------

    /// Fetch the current selection now.
    ///
    /// Fallback paths count as a completed refresh. Only a failure of the
    /// invocation itself yields `FeedError::RefreshInvocation`, in which case
    /// the previously held data is left untouched.
    pub async fn refresh(&self) -> Result<FetchOutcome> {
        let request = self.selection();
        let orchestrator = Arc::clone(&self.orchestrator);

        let joined = tokio::spawn(async move { orchestrator.fetch(&request).await }).await;

        match joined {
            Ok(outcome) => {
                self.store(&outcome);
                Ok(outcome)
            }
            Err(join_err) => {
                let err = FeedError::RefreshInvocation(join_err.to_string());
                error!(error = %err, "refresh invocation failed -- keeping previous data");
                let _ = self.notices.send(RefreshNotice::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                    at: Utc::now(),
                });
                Err(err)
            }
        }
    }

    /// Replace the selection and refresh immediately.
    pub async fn select(&self, symbol: &str, interval: Interval) -> Result<FetchOutcome> {
        let request = FetchRequest::new(symbol, interval);
        {
            let mut selection = self.selection.write();
            if !selection.same_selection(&request) {
                info!(
                    from = %selection.symbol,
                    to = %request.symbol,
                    interval = %request.interval,
                    "selection changed"
                );
            }
            *selection = request;
        }
        self.refresh().await
    }

    fn store(&self, outcome: &FetchOutcome) {
        let selection = self.selection.read();
        if !selection.same_selection(&outcome.request) {
            debug!(
                fetched = %outcome.request.symbol,
                current = %selection.symbol,
                "selection changed mid-fetch -- result discarded"
            );
            return;
        }

        *self.latest.write() = Some(outcome.clone());
        *self.last_refreshed.write() = Some(outcome.completed_at);
        drop(selection);

        let _ = self.notices.send(RefreshNotice::Refreshed {
            symbol: outcome.request.symbol.clone(),
            interval: outcome.request.interval,
            state: outcome.state,
            origin: outcome.origin,
            bars: outcome.envelope.data().len(),
            at: outcome.completed_at,
        });
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn selection(&self) -> FetchRequest {
        self.selection.read().clone()
    }

    /// Envelope currently on display; an empty success before the first fetch.
    pub fn envelope(&self) -> ResultEnvelope {
        self.latest
            .read()
            .as_ref()
            .map(|o| o.envelope.clone())
            .unwrap_or_default()
    }

    pub fn latest_outcome(&self) -> Option<FetchOutcome> {
        self.latest.read().clone()
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        *self.last_refreshed.read()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn orchestrator(&self) -> &DataFetchOrchestrator {
        &self.orchestrator
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshNotice> {
        self.notices.subscribe()
    }
}

impl Drop for RefreshController {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
