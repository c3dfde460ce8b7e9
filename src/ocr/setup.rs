//! Tesseract binary discovery.
//!
//! Checks the configured override first, then the PATH, then common install
//! prefixes. Nothing is downloaded; provisioning the engine is a deployment
//! concern.

use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::config;
use crate::error::ScanError;

const COMMON_PATHS: &[&str] = &[
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

/// Finds the tesseract executable, checking the config override first,
/// then the PATH, then well-known install locations.
pub fn find_tesseract_executable() -> Result<PathBuf, ScanError> {
    if let Some(configured) = &config::get_config().tesseract_path {
        let p = PathBuf::from(configured);
        if p.exists() {
            return Ok(p);
        }
        debug!(path = %p.display(), "configured tesseract path does not exist");
    }

    // Probe the PATH.
    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for path in COMMON_PATHS {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(ScanError::EngineUnavailable)
}
