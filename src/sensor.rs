//! ==============================================================================
//! sensor.rs - reading acquirer and the sensor driver capability
//! ==============================================================================
//!
//! purpose:
//!     turns whatever the driver reports into zero-or-one canonical reading.
//!     the driver itself is an external program (temper.py by default) that
//!     prints a json array of device samples on stdout.
//!
//! relationships:
//!     - used by: scheduler.rs (once per tick)
//!     - uses: domain.rs (RawSample, DriverReport, Reading)
//!     - returns: error.rs (MonitorError::NoDeviceFound / AmbiguousDeviceSet)
//!
//! why subprocess?:
//!     the usb hid protocol of the TEMPer family is already handled well by
//!     the existing python tooling. we only consume its json output.
//!
//! ==============================================================================

use crate::domain::{DriverReport, RawSample, Reading};
use crate::error::MonitorError;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use std::process::Command;

/// anything that can enumerate devices and read them once
pub trait SensorDriver: Send + Sync {
    fn read(&self) -> Result<DriverReport>;
}

// ==============================================================================
// subprocess driver
// ==============================================================================

/// runs the driver command and parses its json output
pub struct CommandDriver {
    command: String,
    args: Vec<String>,
}

impl CommandDriver {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self { command: command.into(), args }
    }
}

impl SensorDriver for CommandDriver {
    fn read(&self) -> Result<DriverReport> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .output()
            .with_context(|| format!("failed to run sensor driver `{}`", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "sensor driver exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let samples = parse_samples(&stdout)?;

        // anything the driver says on stderr is a warning, not a failure
        let warnings = String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();

        Ok(DriverReport { samples, warnings })
    }
}

/// parse the driver's stdout; blank output means no devices at all
pub fn parse_samples(stdout: &str) -> Result<Vec<RawSample>> {
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(stdout)
        .map_err(|e| anyhow!("JSON parse error: {} (got: {})", e, stdout))
}

// ==============================================================================
// acquisition
// ==============================================================================

/// read the driver and reduce its samples to one canonical reading
pub fn acquire(driver: &dyn SensorDriver, now: DateTime<Local>) -> Result<Reading, MonitorError> {
    let report = driver.read().context("sensor read failed")?;
    canonical_reading(&report, now)
}

/// filter, dedup and disambiguate the samples of one report
pub fn canonical_reading(report: &DriverReport, now: DateTime<Local>) -> Result<Reading, MonitorError> {
    let mut distinct: Vec<(f64, Option<f64>)> = Vec::new();

    for sample in report.samples.iter().filter(|s| s.is_valid()) {
        let temperature = sample.temperature.ok_or_else(|| {
            anyhow!(
                "device {} reported no temperature",
                sample.firmware.as_deref().unwrap_or("?")
            )
        })?;
        let pair = (temperature, sample.humidity);
        // one device can show up several times in the enumeration
        if !distinct.contains(&pair) {
            distinct.push(pair);
        }
    }

    match distinct.as_slice() {
        [] => Err(MonitorError::NoDeviceFound { warnings: report.all_warnings() }),
        [(temperature, humidity)] => Ok(Reading {
            timestamp: now,
            temperature: *temperature,
            humidity: *humidity,
        }),
        many => Err(MonitorError::AmbiguousDeviceSet {
            distinct: many.len(),
            warnings: report.all_warnings(),
        }),
    }
}
