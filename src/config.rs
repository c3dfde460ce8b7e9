//! Service configuration.
//!
//! Loads config.json from the executable's directory at startup, falling
//! back to defaults field by field. The PORT environment variable overrides
//! the configured port.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use tracing::{info, warn};

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<AppConfig> = OnceLock::new();

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port the HTTP front end listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Explicit path to the tesseract binary. When unset the binary is
    /// discovered on the PATH and common install locations.
    #[serde(default)]
    pub tesseract_path: Option<String>,
}

fn default_port() -> u16 {
    8000
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            port: default_port(),
            tesseract_path: None,
        }
    }
}

/// Loads configuration from config.json next to the executable, or defaults.
fn load_config() -> AppConfig {
    let config_path = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("config.json")))
        .unwrap_or_else(|| Path::new("config.json").to_path_buf());

    let mut config = if config_path.exists() {
        match fs::read_to_string(&config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    info!(path = %config_path.display(), "config loaded");
                    config
                }
                Err(e) => {
                    warn!("failed to parse config.json: {}. Using defaults.", e);
                    AppConfig::default()
                }
            },
            Err(e) => {
                warn!("failed to read config.json: {}. Using defaults.", e);
                AppConfig::default()
            }
        }
    } else {
        AppConfig::default()
    };

    if let Ok(port) = std::env::var("PORT") {
        match port.parse() {
            Ok(port) => config.port = port,
            Err(_) => warn!(port = %port, "ignoring unparseable PORT override"),
        }
    }

    config
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config() {
    let _ = CONFIG.set(load_config());
}

/// Returns the global configuration, falling back to defaults when
/// `init_config` has not run (unit tests).
pub fn get_config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8000);
        assert!(config.tesseract_path.is_none());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"tesseract_path": "/opt/t"}"#).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.tesseract_path.as_deref(), Some("/opt/t"));
    }
}
