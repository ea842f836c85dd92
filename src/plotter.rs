//! ==============================================================================
//! plotter.rs - visualization capability
//! ==============================================================================
//!
//! purpose:
//!     regenerates the html plot of the history by running gnuplot with the
//!     plot spec. the plot spec itself decides what document gets written.
//!
//! relationships:
//!     - used by: scheduler.rs (after each successful append)
//!     - followed by: cache.rs (reconciles the regenerated document)
//!
//! a missing gnuplot is not an error: data collection carries on and the
//! scheduler remembers the plotter as missing for the rest of the run.
//!
//! ==============================================================================

use anyhow::{anyhow, Context, Result};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Command, Stdio};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotOutcome {
    /// the document was regenerated
    Rendered,
    /// the plotting tool is not installed
    Unavailable,
}

pub trait Plotter: Send + Sync {
    fn render(&self) -> Result<PlotOutcome>;
}

/// what the scheduler knows about the plotter so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotterStatus {
    Untested,
    Available,
    Missing,
}

pub struct CommandPlotter {
    command: String,
    plot_spec: PathBuf,
}

impl CommandPlotter {
    pub fn new(command: impl Into<String>, plot_spec: impl Into<PathBuf>) -> Self {
        Self { command: command.into(), plot_spec: plot_spec.into() }
    }
}

impl Plotter for CommandPlotter {
    fn render(&self) -> Result<PlotOutcome> {
        let status = Command::new(&self.command)
            .arg(&self.plot_spec)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(s) if s.success() => Ok(PlotOutcome::Rendered),
            Ok(s) => Err(anyhow!(
                "`{} {}` exited with {}",
                self.command,
                self.plot_spec.display(),
                s
            )),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(PlotOutcome::Unavailable),
            Err(e) => Err(e).with_context(|| format!("failed to run `{}`", self.command)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_unavailable() {
        let p = CommandPlotter::new("meditemp-no-such-gnuplot", "meditemp.gnuplot");
        assert_eq!(p.render().unwrap(), PlotOutcome::Unavailable);
    }

    #[cfg(unix)]
    #[test]
    fn failing_run_is_an_error() {
        let p = CommandPlotter::new("false", "meditemp.gnuplot");
        assert!(p.render().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn successful_run_renders() {
        let p = CommandPlotter::new("true", "meditemp.gnuplot");
        assert_eq!(p.render().unwrap(), PlotOutcome::Rendered);
    }
}
