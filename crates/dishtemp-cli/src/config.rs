//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use dishtemp_core::{DisplayPreferences, ReaderPolicy};
use dishtemp_types::TemperatureUnit;
use dishtemp_types::temperature::parse_temperature;

use crate::cli::ConfigKey;

/// Longest simulated delay between probe status steps.
pub const MAX_STEP_LATENCY_MS: u64 = 60_000;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Unit temperatures are shown in
    #[serde(default)]
    pub display_unit: TemperatureUnit,

    /// Also show the value in the other unit
    #[serde(default)]
    pub show_both: bool,

    /// Reader policy name ("dish" or "inkbird")
    #[serde(default = "default_policy")]
    pub policy: String,

    /// Simulated probe settings
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Settings for the simulated probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Delay between probe status steps in milliseconds.
    #[serde(default = "default_step_latency_ms")]
    pub step_latency_ms: u64,

    /// Temperature the probe reports, in Celsius.
    #[serde(default = "default_reading_celsius")]
    pub reading_celsius: f32,
}

fn default_policy() -> String {
    "dish".to_string()
}

fn default_step_latency_ms() -> u64 {
    100
}

fn default_reading_celsius() -> f32 {
    4.5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display_unit: TemperatureUnit::default(),
            show_both: false,
            policy: default_policy(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_latency_ms: default_step_latency_ms(),
            reading_celsius: default_reading_celsius(),
        }
    }
}

impl Config {
    /// Default configuration file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dishtemp")
            .join("config.toml")
    }

    /// Resolve the path to use: an explicit override or the default location
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit.map(Path::to_path_buf).unwrap_or_else(Self::path)
    }

    /// Load config from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<Config>(&content) {
                    Ok(config) => match config.validate() {
                        Ok(()) => return config,
                        Err(e) => eprintln!("Warning: Ignoring invalid config: {}", e),
                    },
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        ReaderPolicy::from_name(&self.policy)?;
        if !self.simulation.reading_celsius.is_finite() {
            bail!("simulation.reading_celsius must be a finite number");
        }
        if self.simulation.step_latency_ms > MAX_STEP_LATENCY_MS {
            bail!(
                "simulation.step_latency_ms must be at most {}",
                MAX_STEP_LATENCY_MS
            );
        }
        Ok(())
    }

    /// The configured reader policy.
    pub fn reader_policy(&self) -> Result<ReaderPolicy> {
        Ok(ReaderPolicy::from_name(&self.policy)?)
    }

    /// The configured display preferences.
    pub fn display_preferences(&self) -> DisplayPreferences {
        DisplayPreferences::new(self.display_unit).show_both(self.show_both)
    }

    /// Current value of a key, as shown to the user.
    pub fn get(&self, key: ConfigKey) -> String {
        match key {
            ConfigKey::Unit => self.display_unit.symbol().to_string(),
            ConfigKey::ShowBoth => self.show_both.to_string(),
            ConfigKey::Policy => self.policy.clone(),
            ConfigKey::StepLatency => self.simulation.step_latency_ms.to_string(),
            ConfigKey::Reading => self.simulation.reading_celsius.to_string(),
        }
    }

    /// Set a key from user input.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            ConfigKey::Unit => {
                self.display_unit = value
                    .parse::<TemperatureUnit>()
                    .with_context(|| format!("Invalid unit: {}", value))?;
            }
            ConfigKey::ShowBoth => {
                self.show_both = parse_bool(value)?;
            }
            ConfigKey::Policy => {
                ReaderPolicy::from_name(value)?;
                self.policy = value.to_lowercase();
            }
            ConfigKey::StepLatency => {
                let ms: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid step latency: {}", value))?;
                if ms > MAX_STEP_LATENCY_MS {
                    bail!("Step latency must be at most {} ms", MAX_STEP_LATENCY_MS);
                }
                self.simulation.step_latency_ms = ms;
            }
            ConfigKey::Reading => {
                self.simulation.reading_celsius = parse_temperature(value)?;
            }
        }
        Ok(())
    }

    /// Reset a key to its default.
    pub fn unset(&mut self, key: ConfigKey) {
        let defaults = Config::default();
        match key {
            ConfigKey::Unit => self.display_unit = defaults.display_unit,
            ConfigKey::ShowBoth => self.show_both = defaults.show_both,
            ConfigKey::Policy => self.policy = defaults.policy,
            ConfigKey::StepLatency => {
                self.simulation.step_latency_ms = defaults.simulation.step_latency_ms
            }
            ConfigKey::Reading => {
                self.simulation.reading_celsius = defaults.simulation.reading_celsius
            }
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("Invalid boolean: {} (expected true or false)", value),
    }
}
