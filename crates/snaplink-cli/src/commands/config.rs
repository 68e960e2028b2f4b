//! Config command handlers

use anyhow::{Context, Result};

use snaplink_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&config).context("Failed to serialize config")?
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:              {}", config.data_dir.display());
            println!("  origin:                {}", config.origin);
            println!("  links_collection:      {}", config.links_collection);
            println!("  copy_reset_ms:         {}", config.copy_reset_ms);
            println!("  reconnect_initial_ms:  {}", config.reconnect_initial_ms);
            println!("  reconnect_max_ms:      {}", config.reconnect_max_ms);
            println!("  placeholder_image_url: {}", config.placeholder_image_url);
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    config.set_key(&key, &value)?;
    config.save().context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}
