//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use dishtemp_types::TemperatureUnit;

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Probe integration whose transition rules to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyName {
    /// Dish temperature probe
    Dish,
    /// Inkbird probe
    Inkbird,
}

impl PolicyName {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyName::Dish => "dish",
            PolicyName::Inkbird => "inkbird",
        }
    }
}

/// Unit argument accepting `c`, `f`, `celsius` or `fahrenheit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UnitArg {
    #[value(alias = "celsius")]
    C,
    #[value(alias = "fahrenheit")]
    F,
}

impl From<UnitArg> for TemperatureUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::C => TemperatureUnit::Celsius,
            UnitArg::F => TemperatureUnit::Fahrenheit,
        }
    }
}

/// Reusable display unit arguments
#[derive(Debug, Clone, Args)]
pub struct UnitArgs {
    /// Show temperatures in Fahrenheit (overrides --celsius and config)
    #[arg(long, conflicts_with = "celsius")]
    pub fahrenheit: bool,

    /// Show temperatures in Celsius (overrides config)
    #[arg(long, conflicts_with = "fahrenheit")]
    pub celsius: bool,

    /// Also show the value in the other unit
    #[arg(long)]
    pub both: bool,
}

impl UnitArgs {
    /// Resolve the display unit: explicit flags override config
    pub fn resolve_unit(&self, config_unit: TemperatureUnit) -> TemperatureUnit {
        if self.fahrenheit {
            TemperatureUnit::Fahrenheit
        } else if self.celsius {
            TemperatureUnit::Celsius
        } else {
            config_unit
        }
    }

    /// Resolve whether to show both units
    pub fn resolve_show_both(&self, config_show_both: bool) -> bool {
        self.both || config_show_both
    }
}

#[derive(Parser)]
#[command(name = "dishtemp")]
#[command(author, version, about = "Simulator and tools for BLE dish temperature probes", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true, env = "DISHTEMP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a checklist of tasks against a simulated probe
    Simulate(SimulateArgs),

    /// Convert a temperature between Celsius and Fahrenheit
    Convert {
        /// Temperature value
        #[arg(allow_hyphen_values = true)]
        value: String,

        /// Unit of the value
        #[arg(short, long, value_enum, default_value = "c")]
        from: UnitArg,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for `simulate`
#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Task identifiers, comma-separated
    #[arg(short, long, value_delimiter = ',', default_value = "task-1")]
    pub tasks: Vec<String>,

    /// Temperature the probe reports, in Celsius (overrides config)
    #[arg(short, long, allow_hyphen_values = true)]
    pub reading: Option<f32>,

    /// Number of requests that end in a probe error
    #[arg(long, default_value = "0")]
    pub fail: u32,

    /// Transition rules (overrides config)
    #[arg(short, long, value_enum)]
    pub policy: Option<PolicyName>,

    /// Steps to run, e.g. "a:press,wait,a:press"
    #[arg(short, long)]
    pub script: Option<String>,

    /// Delay between probe status steps in milliseconds (overrides config)
    #[arg(long)]
    pub step_latency: Option<u64>,

    #[command(flatten)]
    pub units: UnitArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Display unit (c or f)
    Unit,
    /// Show both units
    ShowBoth,
    /// Reader policy (dish or inkbird)
    Policy,
    /// Simulated delay between probe status steps, in milliseconds
    StepLatency,
    /// Simulated reading, in Celsius
    Reading,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
        /// Configuration value
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Reset a configuration value to its default
    Unset {
        /// Configuration key to reset
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init,
}
