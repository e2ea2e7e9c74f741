//! Command-line tools for BLE dish temperature probes.
//!
//! The `dishtemp` binary drives the reading state machine from
//! `dishtemp-core` against a simulated probe, converts temperatures between
//! units, and manages a small configuration file.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `simulate` | Run a checklist of tasks against a simulated probe |
//! | `convert` | Convert a temperature between Celsius and Fahrenheit |
//! | `config` | Manage CLI configuration |
//!
//! # Configuration
//!
//! The CLI stores configuration in `~/.config/dishtemp/config.toml` (or
//! platform equivalent). Options include:
//!
//! - `display_unit`: `"C"` or `"F"`
//! - `show_both`: also show the other unit
//! - `policy`: `"dish"` or `"inkbird"`
//! - `simulation.step_latency_ms`, `simulation.reading_celsius`
//!
//! # Environment Variables
//!
//! - `DISHTEMP_CONFIG`: configuration file to use (overridden by `--config`)
//! - `NO_COLOR`: disable colored output when set
//!
//! # Examples
//!
//! Read and save two tasks:
//! ```bash
//! dishtemp simulate --tasks fridge,freezer
//! ```
//!
//! Show that a second task preempts the first one's unsaved reading:
//! ```bash
//! dishtemp simulate --tasks a,b --script "a:press,wait,b:press,wait" --format json
//! ```
//!
//! Convert a Fahrenheit value:
//! ```bash
//! dishtemp convert 41 --from f
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod format;

// Re-export core dependencies for convenience
pub use dishtemp_core;
pub use dishtemp_types;
