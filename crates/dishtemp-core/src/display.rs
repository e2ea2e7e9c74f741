//! Display projection of stored temperatures.
//!
//! Temperatures are stored in Celsius. What the user sees depends on their
//! preferred unit and whether they want both units side by side; this module
//! computes that view and the inverse conversion for values being saved.

use serde::{Deserialize, Serialize};

use dishtemp_types::temperature::{self, format_tenth};
use dishtemp_types::TemperatureUnit;

use crate::error::Result;

/// User preferences for showing temperatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayPreferences {
    /// Preferred unit.
    #[serde(default)]
    pub unit: TemperatureUnit,
    /// Also show the value in the other unit.
    #[serde(default)]
    pub show_both: bool,
}

impl DisplayPreferences {
    /// Preferences for a unit, without the alternate value.
    pub fn new(unit: TemperatureUnit) -> Self {
        Self {
            unit,
            show_both: false,
        }
    }

    /// Enable or disable showing both units.
    #[must_use]
    pub fn show_both(mut self, show_both: bool) -> Self {
        self.show_both = show_both;
        self
    }
}

/// A temperature prepared for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayTemperature {
    /// Whether the alternate value should be shown.
    pub show_both: bool,
    /// Value in the preferred unit, one decimal place.
    pub display_value: Option<String>,
    /// The preferred unit.
    pub display_unit: TemperatureUnit,
    /// Value in the other unit, one decimal place.
    pub alt_value: Option<String>,
    /// The other unit.
    pub alt_unit: TemperatureUnit,
}

impl DisplayTemperature {
    /// Project `value` for display.
    ///
    /// `value_is_celsius` tells the unit `value` is expressed in; probe
    /// readings and stored responses are always Celsius.
    ///
    /// ```
    /// use dishtemp_core::display::{DisplayPreferences, DisplayTemperature};
    /// use dishtemp_types::TemperatureUnit;
    ///
    /// let prefs = DisplayPreferences::new(TemperatureUnit::Fahrenheit).show_both(true);
    /// let shown = DisplayTemperature::new(Some(4.5), true, &prefs);
    /// assert_eq!(shown.text().as_deref(), Some("40.1 °F"));
    /// assert_eq!(shown.alt_text().as_deref(), Some("(4.5 °C)"));
    /// ```
    pub fn new(value: Option<f32>, value_is_celsius: bool, prefs: &DisplayPreferences) -> Self {
        let source = if value_is_celsius {
            TemperatureUnit::Celsius
        } else {
            TemperatureUnit::Fahrenheit
        };
        let display_unit = prefs.unit;
        let alt_unit = display_unit.other();
        let project = |unit: TemperatureUnit| {
            value.map(|v| format_tenth(temperature::convert(v, source, unit)))
        };

        Self {
            show_both: prefs.show_both,
            display_value: project(display_unit),
            display_unit,
            alt_value: project(alt_unit),
            alt_unit,
        }
    }

    /// Project a stored task response (Celsius) for display.
    ///
    /// Invalid or skipped responses have no value.
    pub fn from_response(response: &str, skipped: bool, prefs: &DisplayPreferences) -> Self {
        let value = if skipped {
            None
        } else {
            temperature::parse_response(response)
        };
        Self::new(value, true, prefs)
    }

    /// Whether there is anything to show.
    pub fn has_value(&self) -> bool {
        self.display_value.is_some()
    }

    /// Main text, e.g. `40.1 °F`.
    pub fn text(&self) -> Option<String> {
        self.display_value
            .as_ref()
            .map(|v| format!("{} {}", v, self.display_unit))
    }

    /// Alternate text, e.g. `(4.5 °C)`, when both units are shown.
    pub fn alt_text(&self) -> Option<String> {
        if !self.show_both {
            return None;
        }
        self.alt_value
            .as_ref()
            .map(|v| format!("({} {})", v, self.alt_unit))
    }
}

/// The value to persist for a probe reading (Celsius, one decimal place).
pub fn temperature_to_save(celsius: f32) -> String {
    format_tenth(celsius)
}

/// Convert manually typed input in `unit` into the Celsius value to persist.
///
/// Empty input saves an empty response.
pub fn input_to_save(input: &str, unit: TemperatureUnit) -> Result<String> {
    if input.trim().is_empty() {
        return Ok(String::new());
    }
    let value = temperature::parse_temperature(input)?;
    let celsius = temperature::convert(value, unit, TemperatureUnit::Celsius);
    Ok(format_tenth(celsius))
}
