//! Configuration commands

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use statlink_config::{ConfigLoader, StatlinkConfig};
use tracing::{error, info};

/// Handle configuration validation
pub fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow!("Configuration file not found: {:?}", config_file));
    }

    match ConfigLoader::new().from_file(config_file) {
        Ok(_config) => {
            println!("✅ Configuration file is valid");
            info!("Configuration validation passed");
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {}", e);
            error!("Configuration validation failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handle configuration generation
pub fn handle_config_generate(output: &Path, force: bool) -> Result<()> {
    info!("Generating sample configuration at: {:?}", output);

    if output.exists() && !force {
        return Err(anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("Failed to create output directory")?;
        }
    }

    let content = format!(
        "# statlink configuration\n# Every key is optional; STATLINK_* environment variables override them.\n{}",
        StatlinkConfig::generate_sample()
    );
    fs::write(output, content)
        .with_context(|| format!("Failed to write configuration to {:?}", output))?;

    println!("✅ Configuration written to {:?}", output);
    Ok(())
}
