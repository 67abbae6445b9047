//! The polling loop: one scan per interval, forever, until cancelled.

use std::io::Write;
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::api::AppState;
use crate::error::{ProviderError, ScannerError};
use crate::metrics;
use crate::provider::{PageFetch, RaceCollector};
use crate::scanner::{OpportunityScanner, ReportedStore};
use crate::sink::Sink;

/// Poll loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Ticking once per interval.
    Running,
    /// Cancelled or fatally failed; no further cycles.
    Stopped,
}

/// Running totals published to the HTTP API.
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    /// Completed poll cycles, failed ones included.
    pub cycles_completed: u64,
    /// Opportunities reported since startup.
    pub opportunities_found: u64,
    /// Races fetched in the most recent cycle.
    pub races_last_cycle: usize,
    /// Duration of the most recent cycle in milliseconds.
    pub last_cycle_ms: u64,
}

/// Drives the collect-scan-emit pipeline on a fixed interval.
///
/// Owns the dedup store for the lifetime of the run. A failed cycle is
/// logged and counts as zero opportunities; only cancellation and
/// authentication failures stop the loop.
pub struct PollLoop<F, S> {
    collector: RaceCollector<F>,
    scanner: OpportunityScanner,
    store: ReportedStore,
    sink: S,
    interval: Duration,
    progress: bool,
    state: LoopState,
    app_state: AppState,
}

impl<F: PageFetch, S: Sink> PollLoop<F, S> {
    /// Assemble the loop. The dedup store starts empty.
    pub fn new(
        collector: RaceCollector<F>,
        scanner: OpportunityScanner,
        sink: S,
        interval: Duration,
        app_state: AppState,
    ) -> Self {
        Self {
            collector,
            scanner,
            store: ReportedStore::new(),
            sink,
            interval,
            progress: true,
            state: LoopState::Running,
            app_state,
        }
    }

    /// Disable the per-cycle stdout markers.
    pub fn quiet(mut self) -> Self {
        self.progress = false;
        self
    }

    /// Current loop state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// The dedup store (for inspection in diagnostics and tests).
    pub fn store(&self) -> &ReportedStore {
        &self.store
    }

    /// The sink opportunities are delivered to.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// One collect-scan cycle. Returns the count of newly reported
    /// opportunities, or the provider error that abandoned the cycle.
    pub async fn run_cycle(&mut self) -> Result<usize, ProviderError> {
        let started = Instant::now();

        let races = self.collector.collect().await?;
        let found = self
            .scanner
            .scan(
                &races,
                OffsetDateTime::now_utc(),
                &mut self.store,
                &self.sink,
            )
            .await;

        metrics::record_cycle_duration(started);
        metrics::inc_cycles();

        let mut stats = self.app_state.stats.write().await;
        stats.cycles_completed += 1;
        stats.opportunities_found += found as u64;
        stats.races_last_cycle = races.len();
        stats.last_cycle_ms = started.elapsed().as_millis() as u64;

        Ok(found)
    }

    /// Run until the shutdown signal fires or a fatal error occurs.
    ///
    /// Cancellation is observed both mid-cycle (the in-flight cycle is
    /// dropped, its partial data never scanned) and during the inter-cycle
    /// sleep.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ScannerError> {
        info!(interval_ms = self.interval.as_millis() as u64, "poll loop started");
        self.app_state.set_ready(true);

        while self.state == LoopState::Running {
            let started = Instant::now();

            let outcome = tokio::select! {
                _ = shutdown.changed() => None,
                result = self.run_cycle() => Some(result),
            };

            let Some(result) = outcome else {
                info!("cancellation received mid-cycle, discarding partial data");
                self.state = LoopState::Stopped;
                break;
            };

            match result {
                Ok(0) => {
                    debug!("quiet cycle");
                    self.mark(".");
                }
                Ok(found) => {
                    info!(found, "cycle reported new opportunities");
                }
                Err(err) if err.is_authentication() => {
                    error!(error = %err, "authentication failure is fatal, stopping");
                    self.state = LoopState::Stopped;
                    self.app_state.set_ready(false);
                    return Err(err.into());
                }
                Err(err) => {
                    error!(error = %err, "cycle failed, treated as zero opportunities");
                    self.mark("X");
                }
            }

            let elapsed = started.elapsed();
            let wait = self.interval.saturating_sub(elapsed);
            debug!(
                cycle_ms = elapsed.as_millis() as u64,
                sleep_ms = wait.as_millis() as u64,
                "cycle complete"
            );

            if !wait.is_zero() {
                tokio::select! {
                    _ = shutdown.changed() => {
                        info!("cancellation received, stopping");
                        self.state = LoopState::Stopped;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        }

        self.app_state.set_ready(false);
        info!(reported = self.store.len(), "poll loop stopped");
        Ok(())
    }

    fn mark(&self, marker: &str) {
        if self.progress {
            print!("{marker}");
            let _ = std::io::stdout().flush();
        }
    }
}
