//! Periodic refresh of device status from the readings source.
//!
//! One scheduler owns the refresh lifecycle: a ticker task fires cycles at
//! the configured interval, manual refreshes run the same cycle on demand,
//! and every cycle claims a fresh cache generation so whichever cycle is
//! newest wins. Starting a new cycle cancels the previous one if it is
//! still in flight.

mod cache;

pub use cache::*;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;
use crate::fetch::{fetch_with_resilience, FetchOutcome, ReadingsSource, RetryPolicy};
use crate::status::{aggregate, resolve, ThresholdConfig};

/// Externally visible scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Scheduled,
    Fetching,
    Stopped,
}

/// How a single refresh cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fetched, computed, and committed to the cache.
    Refreshed,
    /// Fetch failed; the error was recorded and previous data kept.
    Failed(String),
    /// Cancelled mid-flight, nothing committed.
    Cancelled,
    /// Finished after a newer cycle claimed the cache.
    Superseded,
}

struct SchedulerState {
    /// Resting phase; `Fetching` is derived from the in-flight counter.
    phase: Phase,
    interval: Duration,
    ticker: Option<CancellationToken>,
    inflight: Option<(u64, CancellationToken)>,
    fetching: u32,
}

/// Drives periodic and on-demand refresh cycles.
pub struct RefreshScheduler {
    source: Arc<dyn ReadingsSource>,
    cache: Arc<StatusCache>,
    thresholds: ThresholdConfig,
    online_threshold_minutes: f64,
    retry: RetryPolicy,
    state: Mutex<SchedulerState>,
}

impl RefreshScheduler {
    pub fn new(
        source: Arc<dyn ReadingsSource>,
        cache: Arc<StatusCache>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            source,
            cache,
            thresholds: config.thresholds,
            online_threshold_minutes: config.online_threshold_minutes,
            retry: config.retry_policy(),
            state: Mutex::new(SchedulerState {
                phase: Phase::Idle,
                interval: sanitize_interval(config.refresh_interval()),
                ticker: None,
                inflight: None,
                fetching: 0,
            }),
        }
    }

    /// Current phase, reporting `Fetching` while any cycle is in flight.
    pub fn phase(&self) -> Phase {
        let st = self.state.lock().unwrap();
        if st.fetching > 0 {
            Phase::Fetching
        } else {
            st.phase
        }
    }

    /// Currently configured refresh interval.
    pub fn interval(&self) -> Duration {
        self.state.lock().unwrap().interval
    }

    /// Start periodic refreshing. Replaces any existing ticker, runs an
    /// immediate first cycle, then fires every `interval`.
    pub fn start(self: Arc<Self>, interval: Duration) {
        let interval = sanitize_interval(interval);
        let token = CancellationToken::new();
        {
            let mut st = self.state.lock().unwrap();
            if let Some(old) = st.ticker.take() {
                old.cancel();
            }
            st.interval = interval;
            st.phase = Phase::Scheduled;
            st.ticker = Some(token.clone());
        }

        tokio::spawn(self.clone().run_ticker(interval, token, true));
        tracing::info!("Scheduler: started with {:?} interval", interval);
    }

    /// Stop periodic refreshing and cancel any cycle in flight.
    pub fn stop(&self) {
        {
            let mut st = self.state.lock().unwrap();
            st.phase = Phase::Stopped;
            if let Some(token) = st.ticker.take() {
                token.cancel();
            }
            if let Some((_, token)) = st.inflight.take() {
                token.cancel();
            }
        }

        // Invalidate whatever the cancelled cycle might still try to commit
        self.cache.advance_generation();
        tracing::info!("Scheduler: stopped");
    }

    /// Change the refresh interval.
    ///
    /// While scheduled this re-arms the ticker with the full new period and
    /// does not trigger a fetch; otherwise the interval is recorded for the
    /// next start.
    pub fn change_interval(self: Arc<Self>, interval: Duration) {
        let interval = sanitize_interval(interval);
        let token = CancellationToken::new();
        {
            let mut st = self.state.lock().unwrap();
            st.interval = interval;
            if st.phase != Phase::Scheduled {
                return;
            }
            if let Some(old) = st.ticker.take() {
                old.cancel();
            }
            st.ticker = Some(token.clone());
        }

        tokio::spawn(self.clone().run_ticker(interval, token, false));
        tracing::info!("Scheduler: interval changed to {:?}", interval);
    }

    /// Run one refresh cycle now, regardless of phase.
    pub async fn manual_refresh(&self) -> CycleOutcome {
        tracing::debug!("Scheduler: manual refresh requested");
        self.run_cycle().await
    }

    async fn run_ticker(
        self: Arc<Self>,
        period: Duration,
        token: CancellationToken,
        immediate: bool,
    ) {
        if immediate {
            // Small random delay before the first cycle
            let jitter = Duration::from_millis(rand::random::<u64>() % 250);
            tokio::select! {
                _ = token.cancelled() => return,
                _ = time::sleep(jitter) => {}
            }
        }

        let mut ticker = if immediate {
            time::interval(period)
        } else {
            time::interval_at(time::Instant::now() + period, period)
        };
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }
    }

    /// One full fetch/compute/commit cycle under a fresh generation.
    async fn run_cycle(&self) -> CycleOutcome {
        let generation = self.cache.advance_generation();
        let cancel = CancellationToken::new();
        {
            let mut st = self.state.lock().unwrap();
            if let Some((_, previous)) = st.inflight.replace((generation, cancel.clone())) {
                previous.cancel();
            }
            st.fetching += 1;
        }

        let fetched =
            fetch_with_resilience(|| self.source.fetch_latest(), &self.retry, &cancel).await;

        let outcome = match fetched {
            FetchOutcome::Ok(readings) => {
                let now = Utc::now();
                let devices = resolve(
                    &readings,
                    &self.thresholds,
                    self.online_threshold_minutes,
                    now,
                );
                let count = devices.len();
                let stats = aggregate(&devices);
                if self.cache.apply_success(devices, stats, now, generation) {
                    tracing::info!("Scheduler: refreshed {} devices", count);
                    CycleOutcome::Refreshed
                } else {
                    CycleOutcome::Superseded
                }
            }
            FetchOutcome::Err(e) => {
                let message = e.to_string();
                if self.cache.apply_error(message.clone(), generation) {
                    tracing::warn!("Scheduler: refresh failed: {}", message);
                    CycleOutcome::Failed(message)
                } else {
                    CycleOutcome::Superseded
                }
            }
            FetchOutcome::Cancelled => {
                tracing::debug!("Scheduler: cycle cancelled");
                CycleOutcome::Cancelled
            }
        };

        let mut st = self.state.lock().unwrap();
        st.fetching -= 1;
        if matches!(st.inflight, Some((g, _)) if g == generation) {
            st.inflight = None;
        }

        outcome
    }
}

/// A zero period would panic the ticker's interval timer.
fn sanitize_interval(interval: Duration) -> Duration {
    if interval.is_zero() {
        Duration::from_secs(1)
    } else {
        interval
    }
}
