//! Platform-agnostic types for BLE dish temperature probes.
//!
//! This crate provides the shared vocabulary used by the reading state
//! machine (dishtemp-core) and its hosts.
//!
//! # Features
//!
//! - Probe status and button state enums
//! - Temperature readings, always in Celsius
//! - Unit conversion and stored-response parsing
//! - Error types for data parsing
//!
//! # Example
//!
//! ```
//! use dishtemp_types::{ReadingState, TemperatureUnit, temperature};
//!
//! let fahrenheit = temperature::convert(4.5, TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit);
//! assert_eq!(temperature::format_tenth(fahrenheit), "40.1");
//! assert_eq!(ReadingState::default(), ReadingState::Read);
//! ```

pub mod error;
pub mod temperature;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    BatteryStatus, ProbeStatus, ReadingState, RequestToken, TaskId, TemperatureReading,
    TemperatureUnit,
};
