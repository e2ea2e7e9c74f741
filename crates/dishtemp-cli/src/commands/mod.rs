//! Command implementations for the CLI.

mod config;
mod convert;
mod simulate;

pub use config::cmd_config;
pub use convert::{Conversion, cmd_convert, convert};
pub use simulate::{
    SavedResponse, SimulationReport, SimulationSettings, Step, StepReport, cmd_simulate,
    default_script, parse_script, run_simulation,
};
