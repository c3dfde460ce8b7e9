//! Box Score Scanner
//!
//! HTTP service that turns an uploaded screenshot of an in-game basketball
//! box score into a structured per-player statistics record. OCR itself is
//! delegated to an external tesseract install; this service conditions the
//! image and interprets the engine's noisy token output.

mod config;
mod error;
mod ocr;
mod server;
mod stats;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    config::init_config();
    let config = config::get_config();

    // Probe the engine up front so a missing install is visible at startup.
    // Requests answer 500 on their own if it disappears later.
    match ocr::setup::find_tesseract_executable() {
        Ok(path) => info!(path = %path.display(), "tesseract found"),
        Err(_) => warn!("tesseract not found; scan requests will fail until it is installed"),
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "listening");

    axum::serve(listener, server::router())
        .await
        .context("server error")?;

    Ok(())
}
