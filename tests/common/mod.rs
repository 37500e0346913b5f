//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use chrono::{TimeZone, Utc};
use streamlog_rs::SessionKey;

/// Session key at a fixed wall-clock time
pub fn session_key(day: u32, hour: u32, suffix: &str) -> SessionKey {
    SessionKey::at(
        Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap(),
        suffix,
    )
}

/// Control message payload with a JSON `value`
pub fn message(name: &str, value: &str) -> String {
    format!(r#"{{"name":"{}","value":{}}}"#, name, value)
}

/// `state` message payload
pub fn state(value: &str) -> String {
    message("state", &format!("\"{}\"", value))
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
