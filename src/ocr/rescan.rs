//! Targeted re-scan of a located row.
//!
//! Recovery step only: when the first parse of a located row fails, the
//! row's box is cropped out, enlarged, and re-read in single-line mode with
//! a narrow character set. Never runs speculatively.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;

use crate::error::ScanError;

use super::engine::{BoundingBox, EngineOptions, OcrEngine};
use super::preprocess::crop_region;

const UPSCALE: f32 = 1.6;
/// Everything a stats row can legitimately contain: digits, letters for the
/// username and grade, the fraction slash, and grade signs.
const RESCAN_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789/+-";

/// Re-reads the region under `bbox` and returns whitespace-normalized text.
pub fn rescan(
    engine: &dyn OcrEngine,
    image: &GrayImage,
    bbox: &BoundingBox,
) -> Result<String, ScanError> {
    let cropped = crop_region(image, bbox)
        .ok_or_else(|| ScanError::Engine("re-scan region lies outside the image".into()))?;

    let (w, h) = cropped.dimensions();
    let upscaled = imageops::resize(
        &cropped,
        (w as f32 * UPSCALE).round() as u32,
        (h as f32 * UPSCALE).round() as u32,
        FilterType::CatmullRom,
    );
    // Light blur to knock down upscaling aliasing before the engine sees it.
    let smoothed = gaussian_blur_f32(&upscaled, 0.6);

    let text = engine.recognize_text(&smoothed, &EngineOptions::single_line(RESCAN_WHITELIST))?;
    Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
}
