//! Core types for dish probe readings and task reading states.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Identifier of a task instance on a checklist.
///
/// Task identifiers come from the task backend and are treated as opaque
/// strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TaskId(String);

impl TaskId {
    /// Create a task identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Token identifying one reading request made against the shared probe.
///
/// Tokens are issued by the reader registry and strictly increase, so a
/// status update tagged with an older token belongs to a superseded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RequestToken(u64);

impl RequestToken {
    /// Wrap a raw sequence number.
    #[must_use]
    pub const fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    /// The raw sequence number.
    #[must_use]
    pub const fn sequence(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Status reported by the probe hook.
///
/// This mirrors the lifecycle of a single reading request: the hook scans for
/// the probe, connects, takes the reading and reports `Done` (or `Error`).
/// `NotStarted` means the hook is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProbeStatus {
    /// The hook is idle.
    #[default]
    NotStarted,
    /// Scanning for the probe.
    Scanning,
    /// Connecting to a discovered probe.
    Connecting,
    /// Connected and waiting for a temperature.
    Reading,
    /// A reading is available.
    Done,
    /// Scanning, connecting or reading failed.
    Error,
}

impl ProbeStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [ProbeStatus; 6] = [
        ProbeStatus::NotStarted,
        ProbeStatus::Scanning,
        ProbeStatus::Connecting,
        ProbeStatus::Reading,
        ProbeStatus::Done,
        ProbeStatus::Error,
    ];

    /// Whether the hook is working on a request.
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            ProbeStatus::Scanning | ProbeStatus::Connecting | ProbeStatus::Reading
        )
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbeStatus::NotStarted => "NotStarted",
            ProbeStatus::Scanning => "Scanning",
            ProbeStatus::Connecting => "Connecting",
            ProbeStatus::Reading => "Reading",
            ProbeStatus::Done => "Done",
            ProbeStatus::Error => "Error",
        };
        f.write_str(name)
    }
}

impl FromStr for ProbeStatus {
    type Err = ParseError;

    /// Parse a status name, ignoring case and `_`/`-` separators.
    ///
    /// ```
    /// use dishtemp_types::ProbeStatus;
    ///
    /// assert_eq!("not_started".parse(), Ok(ProbeStatus::NotStarted));
    /// assert_eq!("Done".parse(), Ok(ProbeStatus::Done));
    /// assert!("finished".parse::<ProbeStatus>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "notstarted" | "idle" => Ok(ProbeStatus::NotStarted),
            "scanning" => Ok(ProbeStatus::Scanning),
            "connecting" => Ok(ProbeStatus::Connecting),
            "reading" => Ok(ProbeStatus::Reading),
            "done" => Ok(ProbeStatus::Done),
            "error" => Ok(ProbeStatus::Error),
            _ => Err(ParseError::UnknownStatus(s.to_string())),
        }
    }
}

/// Interaction state of a task's "read temperature" button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReadingState {
    /// Idle; pressing starts a reading.
    #[default]
    Read,
    /// The probe is being searched for.
    Searching,
    /// Connecting to the probe.
    Connecting,
    /// Waiting for the probe to report a temperature.
    Reading,
    /// A reading is available and can be committed.
    Save,
    /// The probe failed; pressing retries.
    Error,
}

impl ReadingState {
    /// Button label shown for this state.
    ///
    /// ```
    /// use dishtemp_types::ReadingState;
    ///
    /// assert_eq!(ReadingState::Searching.label(), "Searching...");
    /// assert_eq!(ReadingState::Save.label(), "Save");
    /// ```
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ReadingState::Read => "Read",
            ReadingState::Searching => "Searching...",
            ReadingState::Connecting => "Connecting...",
            ReadingState::Reading => "Reading...",
            ReadingState::Save => "Save",
            ReadingState::Error => "Error",
        }
    }

    /// Whether the task is holding an in-flight or uncommitted reading.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ReadingState::Searching
                | ReadingState::Connecting
                | ReadingState::Reading
                | ReadingState::Save
        )
    }

    /// Whether a probe request is underway for the task.
    #[must_use]
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            ReadingState::Searching | ReadingState::Connecting | ReadingState::Reading
        )
    }
}

impl fmt::Display for ReadingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Battery condition reported by the probe alongside a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BatteryStatus {
    /// Battery voltage is fine.
    #[default]
    Normal,
    /// Battery voltage is low.
    Low,
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatteryStatus::Normal => write!(f, "Good"),
            BatteryStatus::Low => write!(f, "Low Voltage"),
        }
    }
}

/// A temperature reported by the probe.
///
/// Temperatures are always in degrees Celsius; display units are a projection
/// applied afterwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TemperatureReading {
    /// Temperature in degrees Celsius.
    pub temperature_celsius: f32,
    /// Battery condition of the probe.
    pub battery_status: BatteryStatus,
    /// Address of the probe that produced the reading.
    pub device_address: String,
    /// When the reading was taken (if known).
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub captured_at: Option<time::OffsetDateTime>,
}

impl TemperatureReading {
    /// Create a reading with a normal battery and no capture time.
    pub fn new(temperature_celsius: f32, device_address: impl Into<String>) -> Self {
        Self {
            temperature_celsius,
            battery_status: BatteryStatus::Normal,
            device_address: device_address.into(),
            captured_at: None,
        }
    }

    /// Set the battery status.
    #[must_use]
    pub fn with_battery(mut self, battery_status: BatteryStatus) -> Self {
        self.battery_status = battery_status;
        self
    }

    /// Stamp the reading with the current UTC time.
    #[must_use]
    pub fn captured_now(mut self) -> Self {
        self.captured_at = Some(time::OffsetDateTime::now_utc());
        self
    }
}

/// Unit used to display temperatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TemperatureUnit {
    /// Degrees Celsius.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "C", alias = "c", alias = "celsius"))]
    Celsius,
    /// Degrees Fahrenheit.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "F", alias = "f", alias = "fahrenheit")
    )]
    Fahrenheit,
}

impl TemperatureUnit {
    /// Single-letter symbol (`C` or `F`).
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "C",
            TemperatureUnit::Fahrenheit => "F",
        }
    }

    /// The other unit.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            TemperatureUnit::Celsius => TemperatureUnit::Fahrenheit,
            TemperatureUnit::Fahrenheit => TemperatureUnit::Celsius,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "°{}", self.symbol())
    }
}

impl FromStr for TemperatureUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "c" | "°c" | "celsius" => Ok(TemperatureUnit::Celsius),
            "f" | "°f" | "fahrenheit" => Ok(TemperatureUnit::Fahrenheit),
            _ => Err(ParseError::UnknownUnit(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_status_busy() {
        assert!(!ProbeStatus::NotStarted.is_busy());
        assert!(ProbeStatus::Scanning.is_busy());
        assert!(ProbeStatus::Connecting.is_busy());
        assert!(ProbeStatus::Reading.is_busy());
        assert!(!ProbeStatus::Done.is_busy());
        assert!(!ProbeStatus::Error.is_busy());
    }

    #[test]
    fn test_probe_status_display_parses_back() {
        for status in ProbeStatus::ALL {
            assert_eq!(status.to_string().parse::<ProbeStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_reading_state_active() {
        assert!(!ReadingState::Read.is_active());
        assert!(!ReadingState::Error.is_active());
        assert!(ReadingState::Save.is_active());
        assert!(ReadingState::Connecting.is_active());
        assert!(ReadingState::Reading.is_in_flight());
        assert!(!ReadingState::Save.is_in_flight());
    }

    #[test]
    fn test_unit_parse() {
        assert_eq!("F".parse(), Ok(TemperatureUnit::Fahrenheit));
        assert_eq!(" celsius ".parse(), Ok(TemperatureUnit::Celsius));
        assert_eq!("°c".parse(), Ok(TemperatureUnit::Celsius));
        assert_eq!(
            "kelvin".parse::<TemperatureUnit>(),
            Err(ParseError::UnknownUnit("kelvin".to_string()))
        );
    }

    #[test]
    fn test_unit_other() {
        assert_eq!(TemperatureUnit::Celsius.other(), TemperatureUnit::Fahrenheit);
        assert_eq!(TemperatureUnit::Fahrenheit.other(), TemperatureUnit::Celsius);
    }

    #[test]
    fn test_request_token_ordering() {
        assert!(RequestToken::new(2) > RequestToken::new(1));
        assert_eq!(RequestToken::new(7).to_string(), "#7");
    }

    #[test]
    fn test_battery_display() {
        assert_eq!(BatteryStatus::Low.to_string(), "Low Voltage");
        assert_eq!(BatteryStatus::Normal.to_string(), "Good");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_unit_serde() {
        assert_eq!(
            serde_json::to_string(&TemperatureUnit::Fahrenheit).unwrap(),
            "\"F\""
        );
        let unit: TemperatureUnit = serde_json::from_str("\"celsius\"").unwrap();
        assert_eq!(unit, TemperatureUnit::Celsius);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_reading_serde_skips_missing_capture_time() {
        let reading = TemperatureReading::new(4.5, "AA:BB").with_battery(BatteryStatus::Low);
        let json = serde_json::to_string(&reading).unwrap();
        assert!(!json.contains("captured_at"));
        assert!(json.contains("\"low\""));
        let back: TemperatureReading = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reading);
    }
}
