//! Convert command implementation.

use anyhow::{Context, Result};
use serde::Serialize;

use dishtemp_core::display::input_to_save;
use dishtemp_types::TemperatureUnit;
use dishtemp_types::temperature::{self, format_tenth, parse_temperature};

use crate::cli::OutputFormat;
use crate::format::format_json;

/// A value in both units, one decimal place each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversion {
    pub celsius: String,
    pub fahrenheit: String,
    /// What a task would store for this value.
    pub stored: String,
}

/// Convert `input`, given in `from`, into both units.
pub fn convert(input: &str, from: TemperatureUnit) -> Result<Conversion> {
    let value = parse_temperature(input).with_context(|| format!("Invalid temperature: {}", input))?;
    let to_unit = |unit: TemperatureUnit| format_tenth(temperature::convert(value, from, unit));
    Ok(Conversion {
        celsius: to_unit(TemperatureUnit::Celsius),
        fahrenheit: to_unit(TemperatureUnit::Fahrenheit),
        stored: input_to_save(input, from)?,
    })
}

pub fn cmd_convert(value: &str, from: TemperatureUnit, format: OutputFormat) -> Result<()> {
    let conversion = convert(value, from)?;
    match format {
        OutputFormat::Json => println!("{}", format_json(&conversion)?),
        OutputFormat::Text => {
            let (first, second) = match from {
                TemperatureUnit::Celsius => (
                    (&conversion.celsius, TemperatureUnit::Celsius),
                    (&conversion.fahrenheit, TemperatureUnit::Fahrenheit),
                ),
                TemperatureUnit::Fahrenheit => (
                    (&conversion.fahrenheit, TemperatureUnit::Fahrenheit),
                    (&conversion.celsius, TemperatureUnit::Celsius),
                ),
            };
            println!("{} {} = {} {}", first.0, first.1, second.0, second.1);
        }
    }
    Ok(())
}
