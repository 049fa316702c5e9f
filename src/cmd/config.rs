//! Configuration view and validation commands: `narrate config`.

use anyhow::Result;
use std::path::Path;

use super::super::ConfigCommands;

pub fn cmd_config(dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    use narrate::narrate_config::{NarrateConfig, NarrateToml};

    let config = NarrateConfig::new(dir.to_path_buf())?;
    let config_path = config.config_path();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Narrate Configuration");
            println!("=====================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No narrate.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();

            let toml = &config.toml;
            println!("[model]");
            println!("  endpoint = \"{}\"", toml.model.endpoint);
            println!("  name = \"{}\"", toml.model.name);
            println!();

            println!("[tracking]");
            println!("  mode = \"{}\"", toml.tracking.mode);
            match toml.tracking.diff {
                Some(diff) => println!("  diff = \"{}\"", diff),
                None => println!("  diff = (mode default)"),
            }
            println!("  cache_size = {}", toml.tracking.cache_size);
            println!("  reset_threshold = {}", toml.tracking.reset_threshold);
            println!();

            println!("[watch]");
            println!("  patterns = {:?}", toml.watch.patterns);
            println!("  ignore = {:?}", toml.watch.ignore);
            println!();

            // Show effective values (including env overrides)
            let settings = config.tracker_settings();
            println!("Effective values (with env overrides):");
            println!("  endpoint = \"{}\"", config.endpoint());
            println!("  model = \"{}\"", config.model());
            println!("  mode = \"{}\", diff = \"{}\"", settings.mode, settings.diff);
            println!();

            if !config_path.exists() {
                println!("Run 'narrate config init' to create a narrate.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No narrate.toml found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("narrate.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&config.narrate_dir)?;
            NarrateToml::default().save(&config_path)?;

            println!("Created narrate.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [model] endpoint, name");
            println!("  - [tracking] mode, diff, cache_size, reset_threshold");
            println!("  - [prompt] personality, conciseness");
            println!("  - [watch] patterns, ignore");
            println!();
        }
    }

    Ok(())
}
