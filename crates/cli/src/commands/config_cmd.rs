//! `cloudpilot config`: show the effective configuration.

use cloudpilot_config::AppConfig;
use std::path::Path;

use crate::bootstrap;

pub fn run(config_path: Option<&Path>, path_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path_only {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
        println!("{}", path.display());
        return Ok(());
    }

    match bootstrap::load_config(config_path) {
        Ok(config) => {
            println!("{}", config.to_redacted_toml());
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Config error: {e}");
            Err(e.into())
        }
    }
}
