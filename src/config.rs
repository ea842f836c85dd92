//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `meditemp.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - PollingConfig: How often the sensor is read.
//!     - PathsConfig: History, event log, plot document and asset cache.
//!     - DriverConfig / PlotterConfig / NotifierConfig: External programs.
//!     - LoggingConfig: Console verbosity.
//!
//! command line flags (--no-notifs, --no-logfile, --no-gnuplot) are folded
//! into `Features` and never stored in the file.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MonitorConfig {
    pub polling: PollingConfig,
    pub paths: PathsConfig,
    pub driver: DriverConfig,
    pub plotter: PlotterConfig,
    pub notifier: NotifierConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_seconds: 10 * 60 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub history: PathBuf,
    pub event_log: PathBuf,
    pub document: PathBuf,
    pub cache_dir: PathBuf,
    pub plot_spec: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            history: PathBuf::from("med_temp.csv"),
            event_log: PathBuf::from("meditemp-log.txt"),
            document: PathBuf::from("med_temp.html"),
            cache_dir: PathBuf::from("gnuplot.cached_files"),
            plot_spec: PathBuf::from("meditemp.gnuplot"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DriverConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { command: "temper.py".to_string(), args: vec!["--json".to_string()] }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlotterConfig {
    pub command: String,
}

impl Default for PlotterConfig {
    fn default() -> Self {
        Self { command: "gnuplot".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotifierConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self { command: "telegram-send".to_string(), args: Vec::new() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// print each reading to the console
    pub show_readings: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_readings: true }
    }
}

/// Optional features, all on unless switched off on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub notifications: bool,
    pub persistent_log: bool,
    pub visualization: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self { notifications: true, persistent_log: true, visualization: true }
    }
}

impl MonitorConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.as_ref().display(), e))?;

        let config: MonitorConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("meditemp.toml"),
            PathBuf::from("meditemp.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] No config file found - using defaults");
        Self::default()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_seconds)
    }

    /// Print configuration summary
    pub fn print_summary(&self, features: &Features) {
        let on_off = |b: bool| if b { "on" } else { "off" };
        println!("┌─────────────────────────────────────────┐");
        println!("│         MONITOR CONFIGURATION           │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Poll Interval: {}s", self.polling.interval_seconds);
        println!("│ History:       {}", self.paths.history.display());
        println!("│ Event Log:     {}", self.paths.event_log.display());
        println!("│ Plot Document: {}", self.paths.document.display());
        println!("│ Asset Cache:   {}", self.paths.cache_dir.display());
        println!("│ Driver:        {} {}", self.driver.command, self.driver.args.join(" "));
        println!("│ Log Level:     {}", self.logging.level);
        println!("├─────────────────────────────────────────┤");
        println!("│ Notifications: {}", on_off(features.notifications));
        println!("│ Log File:      {}", on_off(features.persistent_log));
        println!("│ Plotting:      {}", on_off(features.visualization));
        println!("└─────────────────────────────────────────┘");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_layout() {
        let c = MonitorConfig::default();
        assert_eq!(c.interval(), Duration::from_secs(600));
        assert_eq!(c.paths.history, PathBuf::from("med_temp.csv"));
        assert_eq!(c.paths.event_log, PathBuf::from("meditemp-log.txt"));
        assert_eq!(c.paths.cache_dir, PathBuf::from("gnuplot.cached_files"));
        assert_eq!(c.driver.args, vec!["--json".to_string()]);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meditemp.toml");
        std::fs::write(
            &path,
            "[polling]\ninterval_seconds = 60\n\n[paths]\nhistory = \"/var/lib/meditemp/med_temp.csv\"\n",
        )
        .unwrap();

        let c = MonitorConfig::load(&path).unwrap();
        assert_eq!(c.polling.interval_seconds, 60);
        assert_eq!(c.paths.history, PathBuf::from("/var/lib/meditemp/med_temp.csv"));
        assert_eq!(c.paths.document, PathBuf::from("med_temp.html"));
        assert_eq!(c.plotter.command, "gnuplot");
    }

    #[test]
    fn bad_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meditemp.toml");
        std::fs::write(&path, "[polling]\ninterval_seconds = \"soon\"\n").unwrap();
        assert!(MonitorConfig::load(&path).is_err());
        assert!(MonitorConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
