//! ==============================================================================
//! scheduler.rs - the polling loop
//! ==============================================================================
//!
//! purpose:
//!     runs one tick every interval, measured from tick start to tick start:
//!
//!         acquire -> append history -> alert -> plot -> reconcile asset cache
//!
//!     a tick that fails stops where it failed (nothing already written is
//!     rolled back), its error goes to the event log and the loop carries on.
//!     the only way out is a shutdown signal, which is noticed while sleeping.
//!
//! relationships:
//!     - used by: main.rs (builds the Monitor, calls run_until)
//!     - uses: sensor.rs, history.rs, alerts.rs, notify.rs, plotter.rs,
//!             cache.rs, eventlog.rs, ownership.rs
//!
//! threading:
//!     there is exactly one Monitor and one tick at a time. the monitor is
//!     moved onto a blocking thread for the tick (driver and plotter are
//!     subprocesses) and handed back before the next sleep.
//!
//! ==============================================================================

use crate::alerts;
use crate::cache::AssetCache;
use crate::config::{Features, MonitorConfig};
use crate::domain::{format_date_time, Reading};
use crate::error::MonitorError;
use crate::eventlog::EventLog;
use crate::history::HistoryStore;
use crate::notify::Notifier;
use crate::ownership::Ownership;
use crate::plotter::{PlotOutcome, Plotter, PlotterStatus};
use crate::sensor::{self, SensorDriver};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::future::Future;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::Instant;

/// the external collaborators a monitor talks to
pub struct Capabilities {
    pub driver: Box<dyn SensorDriver>,
    pub notifier: Box<dyn Notifier>,
    pub plotter: Box<dyn Plotter>,
    pub owner: Box<dyn Ownership>,
}

/// what a completed tick produced
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct TickReport {
    pub reading: Reading,
    pub alerts: Vec<String>,
}

pub struct Monitor {
    caps: Capabilities,
    features: Features,
    show_readings: bool,
    history: HistoryStore,
    log: EventLog,
    cache: AssetCache,
    plotter: PlotterStatus,
}

impl Monitor {
    /// set up files and directories; any failure here is fatal
    pub fn new(caps: Capabilities, config: &MonitorConfig, features: Features) -> Result<Self> {
        let cache = AssetCache::create(&config.paths.cache_dir, &config.paths.document, caps.owner.as_ref())
            .context("failed to prepare asset cache")?;
        let log = EventLog::open(&config.paths.event_log, features.persistent_log)
            .context("failed to open event log")?;

        Ok(Self {
            caps,
            features,
            show_readings: config.logging.show_readings,
            history: HistoryStore::new(&config.paths.history),
            log,
            cache,
            plotter: PlotterStatus::Untested,
        })
    }

    #[cfg(test)]
    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    #[cfg(test)]
    pub fn plotter_status(&self) -> PlotterStatus {
        self.plotter
    }

    /// run one tick and route its outcome to the event log
    pub fn run_tick(&mut self, now: DateTime<Local>) -> Option<TickReport> {
        let date_time = format_date_time(&now);
        let outcome = self.tick(now, &date_time);

        match &outcome {
            Ok(_) => self.log.clear_last_error(),
            Err(e) => self.log.failure(&date_time, e),
        }
        if let Err(e) = self.log.flush(self.caps.owner.as_ref()) {
            tracing::error!("failed to write event log: {:#}", e);
        }

        outcome.ok()
    }

    fn tick(&mut self, now: DateTime<Local>, date_time: &str) -> Result<TickReport, MonitorError> {
        let reading = sensor::acquire(self.caps.driver.as_ref(), now)?;

        let line = reading.history_line();
        self.history.append(&line).context("failed to record reading")?;

        let alerts = alerts::evaluate(&reading);
        if !alerts.is_empty() && self.features.notifications {
            if let Err(e) = self.caps.notifier.send(&alerts) {
                tracing::warn!("could not send notification: {:#}", e);
            }
        }

        // console only, the event log is for errors and admin events
        for alert in &alerts {
            tracing::warn!("{}", alert);
        }
        if self.show_readings {
            tracing::info!("{}", line);
        }

        if self.features.visualization {
            self.visualize(date_time)?;
        }

        Ok(TickReport { reading, alerts })
    }

    fn visualize(&mut self, date_time: &str) -> Result<()> {
        if self.plotter == PlotterStatus::Missing {
            return Ok(());
        }

        match self.caps.plotter.render()? {
            PlotOutcome::Rendered => {
                self.plotter = PlotterStatus::Available;
                self.cache.reconcile(self.caps.owner.as_ref())
            }
            PlotOutcome::Unavailable => {
                self.plotter = PlotterStatus::Missing;
                self.log.record(&format!(
                    "{date_time}: Gnuplot doesn't seem to be installed; data is collected, but won't be plotted for now."
                ));
                Ok(())
            }
        }
    }

    /// final flush and ownership fix-up; errors here end the process
    pub fn shutdown(&mut self, now: DateTime<Local>) -> Result<()> {
        self.log.record(&format!("{}: exited program.", format_date_time(&now)));
        self.log.flush(self.caps.owner.as_ref())?;

        let owner = self.caps.owner.as_ref();
        for path in [self.log.path(), self.history.path(), self.cache.dir()] {
            if path.exists() {
                owner.hand_over(path)?;
            }
        }
        Ok(())
    }
}

/// how long to sleep so ticks start `interval` apart; never negative
pub fn sleep_for(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// SIGINT or SIGTERM; listeners are installed right away so a signal that
/// arrives during a tick is still seen at the next sleep
pub fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigint = signal(SignalKind::interrupt()).context("failed to listen for SIGINT")?;
    let mut sigterm = signal(SignalKind::terminate()).context("failed to listen for SIGTERM")?;
    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    })
}

/// tick until `shutdown` resolves, then shut down cleanly
pub async fn run_until(mut monitor: Monitor, interval: Duration, shutdown: impl Future<Output = ()>) -> Result<()> {
    tokio::pin!(shutdown);

    loop {
        let started = Instant::now();
        monitor = tokio::task::spawn_blocking(move || {
            monitor.run_tick(Local::now());
            monitor
        })
        .await
        .context("tick thread panicked")?;

        let pause = sleep_for(interval, started.elapsed());
        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = &mut shutdown => break,
        }
    }

    tracing::info!("shutting down");
    tokio::task::spawn_blocking(move || monitor.shutdown(Local::now()))
        .await
        .context("shutdown thread panicked")?
}
