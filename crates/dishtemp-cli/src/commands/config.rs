//! Config command implementation.

use std::path::Path;

use anyhow::{Result, bail};

use crate::cli::ConfigAction;
use crate::config::Config;

pub fn cmd_config(action: ConfigAction, path: &Path, quiet: bool) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load_from(path);
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Get { key } => {
            println!("{}", Config::load_from(path).get(key));
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load_from(path);
            config.set(key, &value)?;
            config.save_to(path)?;
            if !quiet {
                eprintln!("Set {:?} = {}", key, config.get(key));
            }
        }
        ConfigAction::Unset { key } => {
            let mut config = Config::load_from(path);
            config.unset(key);
            config.save_to(path)?;
            if !quiet {
                eprintln!("Reset {:?} to {}", key, config.get(key));
            }
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Init => {
            if path.exists() {
                bail!("Config file already exists: {}", path.display());
            }
            Config::default().save_to(path)?;
            if !quiet {
                eprintln!("Created {}", path.display());
            }
        }
    }
    Ok(())
}
