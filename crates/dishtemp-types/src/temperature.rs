//! Temperature conversion and stored-response helpers.
//!
//! Temperatures are stored and transported in Celsius. Everything in this
//! module is a pure function so the display layer can project values without
//! touching stored data.

use crate::error::{ParseError, ParseResult};
use crate::types::TemperatureUnit;

/// Convert degrees Celsius to degrees Fahrenheit.
///
/// ```
/// use dishtemp_types::temperature::celsius_to_fahrenheit;
///
/// assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
/// assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
/// ```
#[must_use]
pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert degrees Fahrenheit to degrees Celsius.
#[must_use]
pub fn fahrenheit_to_celsius(fahrenheit: f32) -> f32 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Convert a value between units.
#[must_use]
pub fn convert(value: f32, from: TemperatureUnit, to: TemperatureUnit) -> f32 {
    match (from, to) {
        (TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit) => celsius_to_fahrenheit(value),
        (TemperatureUnit::Fahrenheit, TemperatureUnit::Celsius) => fahrenheit_to_celsius(value),
        _ => value,
    }
}

/// Round to one decimal place.
///
/// ```
/// use dishtemp_types::temperature::round_tenth;
///
/// assert_eq!(round_tenth(4.46), 4.5);
/// assert_eq!(round_tenth(-0.04), 0.0);
/// ```
#[must_use]
pub fn round_tenth(value: f32) -> f32 {
    let rounded = (value * 10.0).round() / 10.0;
    // Avoid displaying "-0.0".
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Format a value with one decimal place.
#[must_use]
pub fn format_tenth(value: f32) -> String {
    format!("{:.1}", round_tenth(value))
}

/// Parse a temperature value from text.
///
/// Leading and trailing whitespace is ignored. Non-finite values are rejected.
pub fn parse_temperature(input: &str) -> ParseResult<f32> {
    let trimmed = input.trim();
    match trimmed.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseError::InvalidTemperature(input.to_string())),
    }
}

/// Parse a stored task response as a Celsius temperature.
///
/// Returns `None` for empty or non-numeric responses.
#[must_use]
pub fn parse_response(response: &str) -> Option<f32> {
    parse_temperature(response).ok()
}

/// Whether a stored task response holds a usable temperature.
///
/// Skipped tasks never show a temperature, even if a value was stored.
#[must_use]
pub fn is_valid_response(response: &str, skipped: bool) -> bool {
    !skipped && parse_response(response).is_some()
}
