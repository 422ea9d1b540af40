//! Config command - show or initialize the configuration file.

use std::path::PathBuf;
use tagscan_core::Config;

/// Run the config command.
pub fn run(config: Config, path: Option<PathBuf>, init: bool, show: bool) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path,
        None => Config::default_config_path()?,
    };

    if init {
        if path.exists() {
            println!("Configuration already exists at {}", path.display());
        } else {
            Config::default().save_to(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    if show {
        print!("{}", toml::to_string_pretty(&config)?);
    }

    if !init && !show {
        let state = if path.exists() { "" } else { " (not created yet)" };
        println!("{}{}", path.display(), state);
    }

    Ok(())
}
