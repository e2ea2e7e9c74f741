//! Output formatting utilities for text and JSON output.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;

use dishtemp_core::{DisplayTemperature, TaskSnapshot};
use dishtemp_types::{BatteryStatus, ReadingState};

/// Format data as pretty-printed JSON.
pub fn format_json<T: Serialize>(data: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Button label, colored by state.
#[must_use]
pub fn format_state(state: ReadingState, no_color: bool) -> String {
    let label = format!("[{}]", state.label());
    if no_color {
        return label;
    }
    match state {
        ReadingState::Read => label.cyan().to_string(),
        ReadingState::Searching | ReadingState::Connecting | ReadingState::Reading => {
            label.yellow().to_string()
        }
        ReadingState::Save => label.green().bold().to_string(),
        ReadingState::Error => label.red().bold().to_string(),
    }
}

/// Temperature with its alternate unit when enabled, e.g. `40.1 °F (4.5 °C)`.
#[must_use]
pub fn format_temperature(temperature: &DisplayTemperature) -> String {
    match (temperature.text(), temperature.alt_text()) {
        (Some(text), Some(alt)) => format!("{} {}", text, alt),
        (Some(text), None) => text,
        _ => "-".to_string(),
    }
}

#[must_use]
fn format_battery(battery: BatteryStatus, no_color: bool) -> String {
    let text = format!("Battery: {}", battery);
    match battery {
        BatteryStatus::Low if !no_color => text.red().to_string(),
        _ => text,
    }
}

/// One line per task.
#[must_use]
pub fn format_snapshot_text(tasks: &[TaskSnapshot], no_color: bool) -> String {
    let width = tasks
        .iter()
        .map(|t| t.view.task_id.as_str().len())
        .max()
        .unwrap_or(0);
    let mut output = String::new();
    for task in tasks {
        let mut line = format!(
            "  {:<width$}  {:<16}  {}",
            task.view.task_id.as_str(),
            format_state(task.view.state, no_color),
            format_temperature(&task.view.temperature),
            width = width
        );
        if task.view.from_probe {
            if let Some(battery) = task.view.battery {
                line.push_str("  ");
                line.push_str(&format_battery(battery, no_color));
            }
            if let Some(address) = &task.view.device_address {
                line.push_str(&format!("  Device: {}", address));
            }
        }
        if task.saved {
            line.push_str("  (saved)");
        }
        output.push_str(line.trim_end());
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use dishtemp_core::{DisplayPreferences, ReadingView};
    use dishtemp_types::{TaskId, TemperatureUnit};

    fn snapshot(state: ReadingState, from_probe: bool) -> TaskSnapshot {
        let prefs = DisplayPreferences::new(TemperatureUnit::Fahrenheit).show_both(true);
        TaskSnapshot {
            view: ReadingView {
                task_id: TaskId::new("cooler"),
                state,
                label: state.label().to_string(),
                from_probe,
                temperature: DisplayTemperature::new(Some(4.5), true, &prefs),
                battery: from_probe.then_some(BatteryStatus::Low),
                device_address: from_probe.then(|| "AA:BB".to_string()),
            },
            saved: false,
            is_owner: true,
        }
    }

    #[test]
    fn test_format_state_no_color() {
        assert_eq!(format_state(ReadingState::Searching, true), "[Searching...]");
        assert_eq!(format_state(ReadingState::Save, true), "[Save]");
    }

    #[test]
    fn test_format_state_color_keeps_label() {
        assert!(format_state(ReadingState::Error, false).contains("[Error]"));
    }

    #[test]
    fn test_format_temperature() {
        let prefs = DisplayPreferences::new(TemperatureUnit::Celsius);
        assert_eq!(
            format_temperature(&DisplayTemperature::new(Some(4.46), true, &prefs)),
            "4.5 °C"
        );
        assert_eq!(
            format_temperature(&DisplayTemperature::new(None, true, &prefs)),
            "-"
        );
    }

    #[test]
    fn test_snapshot_text_with_probe_details() {
        let text = format_snapshot_text(&[snapshot(ReadingState::Save, true)], true);
        assert_eq!(
            text,
            "  cooler  [Save]            40.1 °F (4.5 °C)  Battery: Low Voltage  Device: AA:BB\n"
        );
    }

    #[test]
    fn test_snapshot_text_hides_probe_details_outside_save() {
        let text = format_snapshot_text(&[snapshot(ReadingState::Read, false)], true);
        assert!(!text.contains("Battery"));
        assert!(text.contains("[Read]"));
    }

    #[test]
    fn test_format_json() {
        let json = format_json(&vec![snapshot(ReadingState::Save, true)]).unwrap();
        assert!(json.contains("\"task_id\": \"cooler\""));
        assert!(json.contains("\"state\": \"save\""));
        assert!(json.contains("\"is_owner\": true"));
    }
}
