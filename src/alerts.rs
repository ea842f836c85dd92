//! Threshold checks on a reading.

use crate::domain::{format_number, Reading};

/// below this many °C the room is too cold
pub const MIN_TEMPERATURE: f64 = 15.0;
/// above this many °C the room is too warm
pub const MAX_TEMPERATURE: f64 = 25.0;
/// relative humidity (fraction) above which we alert
pub const MAX_HUMIDITY: f64 = 0.6;

/// Alert messages for a reading, temperature first. Usually empty.
pub fn evaluate(reading: &Reading) -> Vec<String> {
    let mut alerts = Vec::new();

    let t = reading.temperature;
    if t < MIN_TEMPERATURE || t > MAX_TEMPERATURE {
        alerts.push(format!("Temperature alert: {}°", format_number(t)));
    }

    if let Some(h) = reading.humidity {
        if h > MAX_HUMIDITY {
            alerts.push(format!("Humidity alert: {:.1}%", h * 100.0));
        }
    }

    alerts
}
