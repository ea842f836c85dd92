//! ==============================================================================
//! eventlog.rs - persisted event log with repeat collapse
//! ==============================================================================
//!
//! purpose:
//!     keeps the whole log file in memory, grows it as events happen and
//!     rewrites the file after each tick that added something.
//!
//!     two kinds of failures are treated differently:
//!     - validated (no device / several devices): logged in full every time
//!     - unknown: logged in full once, then "same as above" while identical
//!
//! relationships:
//!     - used by: scheduler.rs (owns the single EventLog instance)
//!     - uses: ownership.rs (chown after every flush)
//!
//! ==============================================================================

use crate::error::MonitorError;
use crate::ownership::Ownership;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub struct EventLog {
    path: PathBuf,
    buffer: String,
    /// false when started with --no-logfile: console only, file untouched
    persist: bool,
    /// buffer has lines the file does not have yet
    dirty: bool,
    /// detail of the most recent unknown error since the last good tick
    last_error: Option<String>,
}

impl EventLog {
    /// load the existing log file, creating an empty one if there is none
    pub fn open(path: impl Into<PathBuf>, persist: bool) -> Result<Self> {
        let path = path.into();
        let buffer = if !persist {
            String::new()
        } else if path.exists() {
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?
        } else {
            std::fs::write(&path, "")
                .with_context(|| format!("failed to create {}", path.display()))?;
            String::new()
        };

        Ok(Self { path, buffer, persist, dirty: false, last_error: None })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub fn contents(&self) -> &str {
        &self.buffer
    }

    /// print a line and keep it for the log file
    pub fn record(&mut self, line: &str) {
        tracing::info!("{}", line);
        self.push(line);
    }

    fn push(&mut self, line: &str) {
        if self.persist {
            self.buffer.push_str(line);
            self.buffer.push('\n');
            self.dirty = true;
        }
    }

    /// log a failed tick according to its category
    pub fn failure(&mut self, date_time: &str, err: &MonitorError) {
        if err.is_validated() {
            for warning in err.warnings() {
                tracing::warn!("{}: {}", date_time, warning);
                self.push(&format!("{date_time}: {warning}"));
            }
            tracing::warn!("{}: {}", date_time, err);
            self.push(&format!("{date_time}: {err}"));
        } else {
            self.unknown(date_time, &err.detail());
        }
    }

    fn unknown(&mut self, date_time: &str, detail: &str) {
        let line = if self.last_error.as_deref() == Some(detail) {
            format!("{date_time}: an unknown error occurred: same as above.")
        } else {
            self.last_error = Some(detail.to_string());
            format!("{date_time}: an unknown error occurred:\n{}", indent(detail, "    "))
        };
        tracing::error!("{}", line);
        self.push(&line);
    }

    /// a good tick: the next unknown error is logged in full again
    pub fn clear_last_error(&mut self) {
        self.last_error = None;
    }

    /// rewrite the log file from the buffer if anything was added
    pub fn flush(&mut self, owner: &dyn Ownership) -> Result<()> {
        if !self.persist || !self.dirty {
            return Ok(());
        }
        std::fs::write(&self.path, &self.buffer)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        self.dirty = false;
        owner.hand_over(&self.path)
    }
}

/// prefix every non-empty line
fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|l| if l.trim().is_empty() { l.to_string() } else { format!("{prefix}{l}") })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingOwner(Mutex<Vec<PathBuf>>);

    impl Ownership for RecordingOwner {
        fn hand_over(&self, path: &Path) -> Result<()> {
            self.0.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    fn unknown(msg: &str) -> MonitorError {
        MonitorError::Unknown(anyhow::anyhow!("{}", msg.to_string()))
    }

    fn open_tmp() -> (tempfile::TempDir, EventLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path().join("meditemp-log.txt"), true).unwrap();
        (dir, log)
    }

    #[test]
    fn open_creates_missing_file_and_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meditemp-log.txt");
        let log = EventLog::open(&path, true).unwrap();
        assert!(path.exists());
        assert_eq!(log.contents(), "");

        std::fs::write(&path, "01/01/2024, 00:00: exited program.\n").unwrap();
        let log = EventLog::open(&path, true).unwrap();
        assert_eq!(log.contents(), "01/01/2024, 00:00: exited program.\n");
    }

    #[test]
    fn identical_unknown_errors_collapse() {
        let (_dir, mut log) = open_tmp();
        log.failure("t1", &unknown("device unplugged"));
        log.failure("t2", &unknown("device unplugged"));
        log.failure("t3", &unknown("device unplugged"));

        let lines: Vec<&str> = log.contents().lines().collect();
        assert_eq!(lines[0], "t1: an unknown error occurred:");
        assert_eq!(lines[1], "    device unplugged");
        assert_eq!(lines[2], "t2: an unknown error occurred: same as above.");
        assert_eq!(lines[3], "t3: an unknown error occurred: same as above.");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn different_error_or_success_resets_collapse() {
        let (_dir, mut log) = open_tmp();
        log.failure("t1", &unknown("a"));
        log.failure("t2", &unknown("b"));
        log.failure("t3", &unknown("a"));
        assert_eq!(log.contents().matches("same as above").count(), 0);

        log.failure("t4", &unknown("a"));
        assert_eq!(log.contents().matches("same as above").count(), 1);

        log.clear_last_error();
        log.failure("t5", &unknown("a"));
        assert!(log.contents().ends_with("t5: an unknown error occurred:\n    a\n"));
    }

    #[test]
    fn validated_errors_are_never_collapsed() {
        let (_dir, mut log) = open_tmp();
        let err = MonitorError::NoDeviceFound { warnings: vec!["libusb: busy".into()] };
        log.failure("t1", &err);
        log.failure("t2", &err);

        let expected = format!("t1: libusb: busy\nt1: {err}\nt2: libusb: busy\nt2: {err}\n");
        assert_eq!(log.contents(), expected);
    }

    #[test]
    fn flush_rewrites_file_and_hands_it_over() {
        let (_dir, mut log) = open_tmp();
        let owner = RecordingOwner::default();

        // nothing new, nothing written
        log.flush(&owner).unwrap();
        assert!(owner.0.lock().unwrap().is_empty());

        log.record("t1: started");
        log.flush(&owner).unwrap();
        assert_eq!(std::fs::read_to_string(log.path()).unwrap(), "t1: started\n");
        assert_eq!(owner.0.lock().unwrap().as_slice(), [log.path().to_path_buf()]);
    }

    #[test]
    fn no_logfile_keeps_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meditemp-log.txt");
        let mut log = EventLog::open(&path, false).unwrap();
        log.record("t1: started");
        log.flush(&RecordingOwner::default()).unwrap();
        assert!(!path.exists());
        assert_eq!(log.contents(), "");
    }

    #[test]
    fn indent_skips_blank_lines() {
        assert_eq!(indent("a\n\nb", "  "), "  a\n\n  b");
    }
}
