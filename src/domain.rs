use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// timestamp layout shared by history lines and log entries
pub const DATE_TIME_FORMAT: &str = "%m/%d/%Y, %H:%M";

/// render a tick's wall-clock time the way history and log lines expect it
pub fn format_date_time(at: &DateTime<Local>) -> String {
    at.format(DATE_TIME_FORMAT).to_string()
}

/// one raw device report as emitted by the sensor driver
///
/// the driver's json uses the key names of the TEMPer tooling, e.g.
/// `{"firmware": "TEMPerGold_V3.1", "internal temperature": 21.5}`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// firmware identifier - only responsive devices report one
    #[serde(default)]
    pub firmware: Option<String>,

    /// error marker set by the driver when the device could not be read
    #[serde(default)]
    pub error: Option<String>,

    /// temperature in celsius
    #[serde(default, rename = "internal temperature")]
    pub temperature: Option<f64>,

    /// relative humidity as a fraction (0.0 - 1.0)
    #[serde(default, rename = "internal humidity")]
    pub humidity: Option<f64>,

    /// driver warnings attached to this sample
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl RawSample {
    /// a sample counts only if it carries no error marker and does carry a firmware id
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && self.firmware.is_some()
    }
}

/// everything the driver returned for one read
#[derive(Clone, Debug, Default)]
pub struct DriverReport {
    pub samples: Vec<RawSample>,
    /// warnings not tied to a single sample (driver stderr)
    pub warnings: Vec<String>,
}

impl DriverReport {
    /// all warnings surfaced by the read, report-level first
    pub fn all_warnings(&self) -> Vec<String> {
        self.warnings
            .iter()
            .chain(self.samples.iter().flat_map(|s| s.warnings.iter()))
            .cloned()
            .collect()
    }
}

/// the single canonical reading accepted for a tick
#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    /// wall-clock time at acquisition start
    pub timestamp: DateTime<Local>,
    /// temperature in celsius
    pub temperature: f64,
    /// relative humidity as a fraction, if the device has a humidity sensor
    pub humidity: Option<f64>,
}

impl Reading {
    /// serialize as one history line: `date_time; temperature[; humidity]`
    pub fn history_line(&self) -> String {
        let mut line = format!(
            "{}; {}",
            format_date_time(&self.timestamp),
            format_number(self.temperature)
        );
        // humidity may legitimately be zero, so only absence drops the column
        if let Some(humidity) = self.humidity {
            line.push_str("; ");
            line.push_str(&format_number(humidity));
        }
        line
    }
}

/// shortest round-trip rendering, keeping a trailing `.0` on integral values
pub fn format_number(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains(['.', 'e', 'E']) {
        format!("{text}.0")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 7, h, m, 0).unwrap()
    }

    #[test]
    fn history_line_with_and_without_humidity() {
        let with = Reading { timestamp: at(9, 5), temperature: 21.5, humidity: Some(0.42) };
        assert_eq!(with.history_line(), "03/07/2024, 09:05; 21.5; 0.42");

        let without = Reading { timestamp: at(23, 59), temperature: 19.0, humidity: None };
        assert_eq!(without.history_line(), "03/07/2024, 23:59; 19.0");
    }

    #[test]
    fn zero_humidity_is_kept() {
        let r = Reading { timestamp: at(0, 0), temperature: 20.25, humidity: Some(0.0) };
        assert_eq!(r.history_line(), "03/07/2024, 00:00; 20.25; 0.0");
    }

    #[test]
    fn sample_validity() {
        let ok = RawSample { firmware: Some("TEMPerGold_V3.1".into()), ..Default::default() };
        assert!(ok.is_valid());

        let no_fw = RawSample { temperature: Some(20.0), ..Default::default() };
        assert!(!no_fw.is_valid());

        let errored = RawSample {
            firmware: Some("TEMPerGold_V3.1".into()),
            error: Some("timeout".into()),
            ..Default::default()
        };
        assert!(!errored.is_valid());
    }

    #[test]
    fn parses_driver_json_keys() {
        let json = r#"[{"firmware": "TEMPerHUM_V3.9", "internal temperature": 22.1, "internal humidity": 0.51, "vendorid": 16701}]"#;
        let samples: Vec<RawSample> = serde_json::from_str(json).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].temperature, Some(22.1));
        assert_eq!(samples[0].humidity, Some(0.51));
        assert!(samples[0].warnings.is_empty());
    }
}
