//! Error kinds a tick can end with.

use thiserror::Error;

/// Why a tick did not complete.
///
/// The first two variants are validated domain conditions that are logged in
/// full every time; everything else is `Unknown` and subject to repeat collapse.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// No responsive device reported a reading
    #[error("no TEMPer devices found. Run temper.py for debugging.")]
    NoDeviceFound { warnings: Vec<String> },

    /// More than one distinct reading among responsive devices
    #[error("multiple TEMPer devices found ({distinct} distinct readings). Run `temper.py -l` for debugging.")]
    AmbiguousDeviceSet { distinct: usize, warnings: Vec<String> },

    /// Anything else raised while running a tick
    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl MonitorError {
    /// Validated failures are expected, actionable and always logged verbatim
    pub fn is_validated(&self) -> bool {
        !matches!(self, MonitorError::Unknown(_))
    }

    /// Driver warnings collected while acquiring, if any
    pub fn warnings(&self) -> &[String] {
        match self {
            MonitorError::NoDeviceFound { warnings }
            | MonitorError::AmbiguousDeviceSet { warnings, .. } => warnings,
            MonitorError::Unknown(_) => &[],
        }
    }

    /// Full detail used for logging and repeat detection of unknown errors
    pub fn detail(&self) -> String {
        match self {
            MonitorError::Unknown(e) => {
                let mut detail = e.to_string();
                let causes: Vec<String> = e.chain().skip(1).map(|c| c.to_string()).collect();
                if !causes.is_empty() {
                    detail.push_str("\n\nCaused by:");
                    for (i, cause) in causes.iter().enumerate() {
                        detail.push_str(&format!("\n    {i}: {cause}"));
                    }
                }
                detail
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn classification() {
        assert!(MonitorError::NoDeviceFound { warnings: vec![] }.is_validated());
        assert!(MonitorError::AmbiguousDeviceSet { distinct: 2, warnings: vec![] }.is_validated());
        assert!(!MonitorError::Unknown(anyhow::anyhow!("boom")).is_validated());
    }

    #[test]
    fn unknown_detail_carries_cause_chain() {
        let inner: anyhow::Result<()> = Err(anyhow::anyhow!("permission denied"));
        let err = MonitorError::from(inner.context("failed to append history").unwrap_err());
        let detail = err.detail();
        assert!(detail.contains("failed to append history"));
        assert!(detail.contains("permission denied"));
    }

    #[test]
    fn warnings_are_exposed_for_validated_errors() {
        let err = MonitorError::NoDeviceFound { warnings: vec!["usb busy".into()] };
        assert_eq!(err.warnings(), ["usb busy".to_string()]);
    }
}
