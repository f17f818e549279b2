/// `load_config` module: reads the optional YAML file that overrides path
/// conventions and external tool locations.
///
/// Every key is optional; anything left out keeps the built-in default, so a
/// stage run without `--config` (or `CI_STAGES_CONFIG`) uses the standard
/// build-agent layout.
///
/// ```yaml
/// layout:
///   publish_context: deployment/publish
/// tools:
///   run_compose_service:
///     program: /opt/pipeline/run-docker-compose-service.sh
///   container_build:
///     program: podman
///     args: [build]
/// ```
///
/// # Errors
/// Unreadable or malformed files are errors (`anyhow::Error` with the path in
/// the message); they are never replaced by defaults.
use anyhow::Result;
use ci_stages_core::config::StagesConfig;
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Environment variable naming the config file when `--config` is not given.
pub const CONFIG_ENV: &str = "CI_STAGES_CONFIG";

/// Loads a YAML config file into [`StagesConfig`].
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<StagesConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    if config_content.trim().is_empty() {
        info!(config_path = ?path_ref, "Config file is empty, using defaults");
        return Ok(StagesConfig::default());
    }

    let config: StagesConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML {:?}: {e}", path_ref));
        }
    };

    config.trace_loaded();
    Ok(config)
}

/// The config for a run: the given file, or the defaults when there is none.
pub fn resolve_config(path: Option<&Path>) -> Result<StagesConfig> {
    match path {
        Some(path) => load_config(path),
        None => {
            info!("No config file given, using default layout and tools");
            Ok(StagesConfig::default())
        }
    }
}
