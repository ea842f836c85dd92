//! ==============================================================================
//! main.rs - meditemp entry point
//! ==============================================================================
//!
//! purpose:
//!     a long-running room monitor for a medicine cabinet. every ten minutes
//!     it reads a TEMPer usb sensor, appends the reading to med_temp.csv,
//!     alerts when temperature or humidity leave the safe range and refreshes
//!     an html plot of the history.
//!
//!     run it with sudo (the usb device needs it); everything it writes is
//!     handed back to the user who invoked sudo.
//!
//! responsibilities:
//!     - parse flags and load configuration
//!     - set up console logging
//!     - prepare the event log and a fresh asset cache directory
//!     - run the polling loop until SIGINT / SIGTERM
//!
//! relationships:
//!     - uses: config.rs (meditemp.toml + flags)
//!     - uses: scheduler.rs (Monitor, run_until)
//!     - wires: sensor.rs, notify.rs, plotter.rs, ownership.rs capabilities
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                     scheduler (one tick at a time)           │
//!     │                                                              │
//!     │  temper.py ──> acquire ──> med_temp.csv ──> alerts ──> telegram│
//!     │                                │                             │
//!     │                                └──> gnuplot ──> asset cache  │
//!     │                                                              │
//!     │  failures ──> event log (meditemp-log.txt)                   │
//!     └──────────────────────────────────────────────────────────────┘
//!
//! ==============================================================================

mod alerts;
mod cache;
mod config;
mod domain;
mod error;
mod eventlog;
mod history;
mod notify;
mod ownership;
mod plotter;
mod scheduler;
mod sensor;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Temperature/humidity monitor with an append-only history and a cached plot
#[derive(Parser, Debug)]
#[command(name = "meditemp", version, about)]
struct Cli {
    /// Do not send push notifications for alerts
    #[arg(long = "no-notifs")]
    no_notifs: bool,

    /// Do not write the event log file (console only)
    #[arg(long = "no-logfile")]
    no_logfile: bool,

    /// Do not run gnuplot or maintain the asset cache
    #[arg(long = "no-gnuplot")]
    no_gnuplot: bool,

    /// Configuration file (default: config/meditemp.toml or meditemp.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn features(&self) -> config::Features {
        config::Features {
            notifications: !self.no_notifs,
            persistent_log: !self.no_logfile,
            visualization: !self.no_gnuplot,
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // step 1: load configuration
    let config = match &cli.config {
        Some(path) => config::MonitorConfig::load(path)?,
        None => config::MonitorConfig::load_or_default(),
    };
    let features = cli.features();
    init_tracing(&config.logging.level);

    println!("===========================================================");
    println!("  meditemp - temperature & humidity monitor");
    println!("===========================================================");
    config.print_summary(&features);

    // step 2: who gets to own the files we write
    let owner = ownership::InvokingUser::resolve().context("failed to determine invoking user")?;
    tracing::info!("files will be owned by {}", owner.name());

    // step 3: capabilities
    let caps = scheduler::Capabilities {
        driver: Box::new(sensor::CommandDriver::new(
            config.driver.command.clone(),
            config.driver.args.clone(),
        )),
        notifier: Box::new(notify::CommandNotifier::new(
            config.notifier.command.clone(),
            config.notifier.args.clone(),
        )),
        plotter: Box::new(plotter::CommandPlotter::new(
            config.plotter.command.clone(),
            config.paths.plot_spec.clone(),
        )),
        owner: Box::new(owner),
    };

    // step 4: files and directories; failures here end the process
    let monitor = scheduler::Monitor::new(caps, &config, features)?;

    // step 5: poll until told to stop
    let shutdown = scheduler::shutdown_signal()?;
    tracing::info!("polling every {}s", config.polling.interval_seconds);
    scheduler::run_until(monitor, config.interval(), shutdown).await
}
