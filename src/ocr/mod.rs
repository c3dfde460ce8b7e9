//! OCR-output interpretation pipeline.
//!
//! Sequencing: bytes → two conditioned variants → row location (binarized
//! first, soft grayscale as fallback) → tolerant parse → one targeted
//! re-scan retry on parse failure. Each request owns all of its
//! intermediates; nothing is shared across invocations.

pub mod engine;
pub mod extract;
pub mod locate;
pub mod normalize;
pub mod preprocess;
pub mod rescan;
pub mod setup;

pub use engine::{OcrEngine, Tesseract};

use image::GrayImage;
use serde::Serialize;
use tracing::debug;

use crate::error::ScanError;
use crate::stats::BoxScoreRecord;

use engine::EngineOptions;
use locate::{RowCandidate, ScoredLine};
use preprocess::ImageVariants;

/// How many scored candidate lines the debug payload carries.
const DIAGNOSTIC_CANDIDATES: usize = 10;

/// Which conditioned variant produced the located row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageVariantKind {
    Binarized,
    Soft,
}

/// Intermediate values threaded out of a scan for operator troubleshooting.
/// Populated as far as the pipeline got; never changes success semantics.
#[derive(Debug, Default, Serialize)]
pub struct ScanDiagnostics {
    pub variant: Option<ImageVariantKind>,
    pub row_text: Option<String>,
    pub rescan_text: Option<String>,
    pub candidates: Vec<ScoredLine>,
}

/// One full scan: the outcome plus whatever diagnostics accumulated.
pub struct ScanAttempt {
    pub outcome: Result<BoxScoreRecord, ScanError>,
    pub diagnostics: ScanDiagnostics,
}

/// Runs the whole pipeline over one uploaded image.
///
/// `collect_candidates` additionally gathers the top scored candidate lines
/// for the debug payload; it does not alter the outcome.
pub fn scan_image(
    engine: &dyn OcrEngine,
    bytes: &[u8],
    username: &str,
    collect_candidates: bool,
) -> ScanAttempt {
    let mut diagnostics = ScanDiagnostics::default();
    let outcome = run_scan(engine, bytes, username, collect_candidates, &mut diagnostics);
    ScanAttempt {
        outcome,
        diagnostics,
    }
}

fn run_scan(
    engine: &dyn OcrEngine,
    bytes: &[u8],
    username: &str,
    collect_candidates: bool,
    diagnostics: &mut ScanDiagnostics,
) -> Result<BoxScoreRecord, ScanError> {
    let variants = preprocess::condition_image(bytes)?;

    let (kind, image, candidate) =
        locate_in_variants(engine, &variants, username, collect_candidates, diagnostics)?;
    diagnostics.variant = Some(kind);
    diagnostics.row_text = Some(candidate.text.clone());

    match extract::parse_stats_row(&candidate.text, Some(username)) {
        Ok(record) => Ok(record),
        Err(parse_err) => {
            debug!(error = %parse_err, "first parse failed, attempting targeted re-scan");
            match rescan::rescan(engine, image, &candidate.bbox) {
                Ok(text) => {
                    diagnostics.rescan_text = Some(text.clone());
                    match extract::parse_stats_row(&text, Some(username)) {
                        Ok(record) => Ok(record),
                        Err(retry_err) => {
                            // The re-scan is a best-effort second chance; the
                            // first error is the actionable one.
                            debug!(error = %retry_err, "re-scan parse failed");
                            Err(parse_err)
                        }
                    }
                }
                Err(rescan_err) => {
                    debug!(error = %rescan_err, "re-scan failed");
                    Err(parse_err)
                }
            }
        }
    }
}

/// Tries to locate the username's row on the binarized variant, then on the
/// soft grayscale variant. Only a not-found result triggers the fallback;
/// engine failures propagate immediately.
fn locate_in_variants<'a>(
    engine: &dyn OcrEngine,
    variants: &'a ImageVariants,
    username: &str,
    collect_candidates: bool,
    diagnostics: &mut ScanDiagnostics,
) -> Result<(ImageVariantKind, &'a GrayImage, RowCandidate), ScanError> {
    let attempts = [
        (ImageVariantKind::Binarized, &variants.binarized),
        (ImageVariantKind::Soft, &variants.soft),
    ];

    for (kind, image) in attempts {
        let document = engine.recognize_document(image, &EngineOptions::document())?;
        if collect_candidates {
            let mut lines = locate::scored_lines(&document, username);
            lines.truncate(DIAGNOSTIC_CANDIDATES);
            diagnostics.candidates = lines;
        }
        match locate::locate_row(&document, username) {
            Ok(candidate) => return Ok((kind, image, candidate)),
            Err(ScanError::UsernameNotFound) => {
                debug!(variant = ?kind, "username not found, trying next variant");
            }
            Err(other) => return Err(other),
        }
    }

    Err(ScanError::UsernameNotFound)
}
