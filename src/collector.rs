use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;

use crate::clock::Clock;
use crate::model::bar::OhlcBar;
use crate::model::sample::Sample;
use crate::model::window::Window;
use crate::source::PriceSource;
use crate::store::CsvLog;

/// Result of one poll attempt. Failures never escape the poll step.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Sample(Sample),
    Failed { reason: String },
}

/// Loop state for the window currently being collected.
#[derive(Debug, Clone)]
pub struct WindowState {
    pub window: Window,
    pub buffer: Vec<Sample>,
    pub failed_polls: usize,
}

impl WindowState {
    pub fn open(now: chrono::DateTime<chrono::Utc>, length: Duration) -> Self {
        Self {
            window: Window::containing(now, length),
            buffer: Vec::new(),
            failed_polls: 0,
        }
    }

    pub fn record(&mut self, outcome: PollOutcome) {
        match outcome {
            PollOutcome::Sample(sample) => self.buffer.push(sample),
            PollOutcome::Failed { .. } => self.failed_polls += 1,
        }
    }

    pub fn bar(&self) -> Option<OhlcBar> {
        OhlcBar::from_samples(self.window, &self.buffer)
    }
}

/// What closing a window produced.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowReport {
    Empty {
        window: Window,
        failed_polls: usize,
    },
    Written {
        bar: OhlcBar,
        samples: usize,
        failed_polls: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub windows_closed: usize,
    pub bars_written: usize,
    pub samples_written: usize,
    pub empty_windows: usize,
    pub failed_polls: usize,
    pub discarded_samples: usize,
}

impl RunSummary {
    fn absorb(&mut self, report: &WindowReport) {
        self.windows_closed += 1;
        match report {
            WindowReport::Empty { failed_polls, .. } => {
                self.empty_windows += 1;
                self.failed_polls += failed_polls;
            }
            WindowReport::Written {
                samples,
                failed_polls,
                ..
            } => {
                self.bars_written += 1;
                self.samples_written += samples;
                self.failed_polls += failed_polls;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub product_code: String,
    pub cadence: Duration,
    pub window: Duration,
}

/// Polls a [`PriceSource`] on a fixed cadence and turns each clock-aligned
/// window of samples into one OHLC bar.
pub struct Collector<S, C> {
    source: S,
    clock: C,
    settings: CollectorSettings,
    raw_log: CsvLog<Sample>,
    bar_log: CsvLog<OhlcBar>,
}

impl<S: PriceSource, C: Clock> Collector<S, C> {
    pub fn new(
        source: S,
        clock: C,
        settings: CollectorSettings,
        raw_log: CsvLog<Sample>,
        bar_log: CsvLog<OhlcBar>,
    ) -> Self {
        Self {
            source,
            clock,
            settings,
            raw_log,
            bar_log,
        }
    }

    pub fn raw_log(&self) -> &CsvLog<Sample> {
        &self.raw_log
    }

    pub fn bar_log(&self) -> &CsvLog<OhlcBar> {
        &self.bar_log
    }

    /// Create both logs with their headers if they don't exist yet.
    pub fn initialize_logs(&self) -> Result<()> {
        self.raw_log
            .initialize()
            .with_context(|| format!("failed to initialize {}", self.raw_log.path().display()))?;
        self.bar_log
            .initialize()
            .with_context(|| format!("failed to initialize {}", self.bar_log.path().display()))?;
        Ok(())
    }

    pub async fn poll_once(&self) -> PollOutcome {
        match self.source.fetch_ticker(&self.settings.product_code).await {
            Ok(sample) => {
                tracing::debug!(ltp = sample.last_traded_price, "Fetched ticker");
                PollOutcome::Sample(sample)
            }
            Err(e) => {
                tracing::warn!(
                    product_code = %self.settings.product_code,
                    error = %e,
                    "Ticker fetch failed, dropping poll"
                );
                PollOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Poll until the window expires. Samples are assigned by receipt time,
    /// not by the timestamp the source reports.
    pub async fn collect_window(&self, state: &mut WindowState) {
        while !state.window.is_expired(self.clock.now()) {
            let attempt_start = self.clock.now();
            let outcome = self.poll_once().await;
            state.record(outcome);

            let elapsed = (self.clock.now() - attempt_start)
                .to_std()
                .unwrap_or_default();
            self.clock
                .sleep(self.settings.cadence.saturating_sub(elapsed))
                .await;
        }
    }

    /// Persist a finished window: raw samples first, then the bar.
    pub fn close_window(&self, state: WindowState) -> Result<WindowReport> {
        let Some(bar) = state.bar() else {
            tracing::warn!(
                window = %state.window,
                failed_polls = state.failed_polls,
                "No samples collected in window, skipping bar"
            );
            return Ok(WindowReport::Empty {
                window: state.window,
                failed_polls: state.failed_polls,
            });
        };

        let samples = self.raw_log.append(&state.buffer).with_context(|| {
            format!(
                "failed to append {} samples to {}",
                state.buffer.len(),
                self.raw_log.path().display()
            )
        })?;
        self.bar_log
            .append(std::slice::from_ref(&bar))
            .with_context(|| {
                format!("failed to append bar to {}", self.bar_log.path().display())
            })?;

        tracing::info!(
            window = %state.window,
            samples,
            failed_polls = state.failed_polls,
            open = bar.open,
            high = bar.high,
            low = bar.low,
            close = bar.close,
            "Bar written"
        );
        Ok(WindowReport::Written {
            bar,
            samples,
            failed_polls: state.failed_polls,
        })
    }

    /// Run windows back to back until `shutdown` flips to true. The window in
    /// flight at shutdown is discarded. Only persistence errors end the loop
    /// with `Err`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        loop {
            let mut state = WindowState::open(self.clock.now(), self.settings.window);
            tracing::info!(window = %state.window, "Collecting window");

            let interrupted = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => true,
                _ = self.collect_window(&mut state) => false,
            };
            if interrupted {
                summary.discarded_samples = state.buffer.len();
                tracing::info!(
                    window = %state.window,
                    discarded = state.buffer.len(),
                    "Shutdown requested, abandoning window in flight"
                );
                return Ok(summary);
            }

            let report = self.close_window(state)?;
            summary.absorb(&report);
        }
    }
}

/// Wait for an interrupt and turn it into a shutdown request. If the
/// listener could not be installed the error is logged and no shutdown is
/// sent; the collector keeps running until the process is killed.
pub async fn forward_interrupt<F>(signal: F, shutdown: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            tracing::info!("Ctrl+C received");
            let _ = shutdown.send(true);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C, collector keeps running");
        }
    }
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without requesting shutdown.
            std::future::pending::<()>().await;
        }
    }
}
