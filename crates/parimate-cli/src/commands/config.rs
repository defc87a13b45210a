use anyhow::Result;
use std::path::Path;

use crate::ConfigAction;
use crate::config::ParimateConfig;

/// Handle config subcommands.
pub async fn handle(action: ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Init => {
            if path.exists() {
                println!("Config already exists at: {}", path.display());
                println!("Use `parimate config show` to view it.");
                return Ok(());
            }

            let config = ParimateConfig::default();
            config.save(path)?;
            println!("Created default config at: {}", path.display());
            println!();
            print!("{}", config.to_toml()?);
        }

        ConfigAction::Show => {
            let config = ParimateConfig::load(path)?;
            if !path.exists() {
                println!("# {} not found, showing defaults", path.display());
            }
            print!("{}", config.to_toml()?);
        }
    }
    Ok(())
}
