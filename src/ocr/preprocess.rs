//! Image conditioning ahead of OCR.
//!
//! Produces two raster variants tuned for different failure modes: a crisp
//! binarized image that works well on high-contrast HUDs, and a softer
//! grayscale image that keeps the thin glyph strokes binarization can erase.
//! Callers try the binarized variant first and fall back to the soft one.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::filter::{gaussian_blur_f32, median_filter};

use crate::error::ScanError;

use super::engine::BoundingBox;

/// Upscale captures whose smaller side is below this, so glyphs are large
/// enough for the engine.
const MIN_SIDE: u32 = 1200;

/// Contrast-limited equalization parameters.
const CLIP_LIMIT: f32 = 2.0;
const TILE_GRID: u32 = 8;

/// Adaptive threshold parameters.
const THRESHOLD_BLOCK: u32 = 31;
const THRESHOLD_BIAS: i16 = 5;

/// The two OCR-ready variants derived from one upload.
#[derive(Debug)]
pub struct ImageVariants {
    /// Black/white raster from adaptive thresholding.
    pub binarized: GrayImage,
    /// Contrast-equalized, denoised grayscale raster.
    pub soft: GrayImage,
}

/// Decodes raw image bytes and conditions them into both variants.
///
/// Fails with [`ScanError::ImageDecode`] when the bytes are not an image.
pub fn condition_image(bytes: &[u8]) -> Result<ImageVariants, ScanError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| ScanError::ImageDecode(e.to_string()))?;
    let gray = decoded.to_luma8();

    let gray = upscale_if_small(gray);
    let contrasted = local_contrast(&gray, CLIP_LIMIT, TILE_GRID);
    // Median smoothing knocks out compression speckle without softening
    // glyph edges the way a plain blur would.
    let soft = median_filter(&contrasted, 1, 1);
    let binarized = adaptive_binarize(&soft, THRESHOLD_BLOCK, THRESHOLD_BIAS);

    Ok(ImageVariants { binarized, soft })
}

/// Upscales both dimensions by `max(2.0, MIN_SIDE / min_side)` when the
/// smaller side is under [`MIN_SIDE`]. Cubic interpolation preserves thin
/// strokes better than linear at these factors.
fn upscale_if_small(img: GrayImage) -> GrayImage {
    let (w, h) = img.dimensions();
    let min_side = w.min(h);
    if min_side == 0 || min_side >= MIN_SIDE {
        return img;
    }
    let scale = (MIN_SIDE as f32 / min_side as f32).max(2.0);
    let nw = (w as f32 * scale).round() as u32;
    let nh = (h as f32 * scale).round() as u32;
    imageops::resize(&img, nw, nh, FilterType::CatmullRom)
}

/// Contrast-limited local histogram equalization over a tile grid, with
/// bilinear blending between neighboring tile mappings.
///
/// Equalizes uneven lighting across the capture without letting a single
/// bright scoreboard panel blow out the mapping for the whole image.
fn local_contrast(img: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    let tiles_x = grid.min(w).max(1);
    let tiles_y = grid.min(h).max(1);
    let tile_w = w.div_ceil(tiles_x);
    let tile_h = h.div_ceil(tiles_y);

    // One clipped-histogram LUT per tile.
    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);
            let lut = &mut luts[(ty * tiles_x + tx) as usize];

            let area = x1.saturating_sub(x0) * y1.saturating_sub(y0);
            if area == 0 {
                for (i, slot) in lut.iter_mut().enumerate() {
                    *slot = i as u8;
                }
                continue;
            }

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[img.get_pixel(x, y)[0] as usize] += 1;
                }
            }

            // Clip each bin and hand the excess back to all bins evenly.
            let limit = ((clip_limit * area as f32) / 256.0).max(1.0) as u32;
            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > limit {
                    excess += *bin - limit;
                    *bin = limit;
                }
            }
            let bonus = excess / 256;
            for bin in hist.iter_mut() {
                *bin += bonus;
            }
            for bin in hist[..(excess % 256) as usize].iter_mut() {
                *bin += 1;
            }

            let scale = 255.0 / area as f32;
            let mut cdf = 0u32;
            for (i, slot) in lut.iter_mut().enumerate() {
                cdf += hist[i];
                *slot = (cdf as f32 * scale).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    let lut_at = |tx: i32, ty: i32| -> &[u8; 256] {
        let tx = tx.clamp(0, tiles_x as i32 - 1) as u32;
        let ty = ty.clamp(0, tiles_y as i32 - 1) as u32;
        &luts[(ty * tiles_x + tx) as usize]
    };

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let gy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let ty0 = gy.floor() as i32;
        let wy = gy - ty0 as f32;
        for x in 0..w {
            let gx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
            let tx0 = gx.floor() as i32;
            let wx = gx - tx0 as f32;

            let v = img.get_pixel(x, y)[0] as usize;
            let top = lut_at(tx0, ty0)[v] as f32 * (1.0 - wx) + lut_at(tx0 + 1, ty0)[v] as f32 * wx;
            let bottom =
                lut_at(tx0, ty0 + 1)[v] as f32 * (1.0 - wx) + lut_at(tx0 + 1, ty0 + 1)[v] as f32 * wx;
            let value = top * (1.0 - wy) + bottom * wy;
            out.put_pixel(x, y, image::Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Binarizes against a Gaussian-weighted local mean: pixels brighter than
/// `mean - bias` become white, the rest black.
fn adaptive_binarize(img: &GrayImage, block_size: u32, bias: i16) -> GrayImage {
    // Sigma sized so the Gaussian window covers the block.
    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let mean = gaussian_blur_f32(img, sigma);

    let (w, h) = img.dimensions();
    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let px = img.get_pixel(x, y)[0] as i16;
            let local = mean.get_pixel(x, y)[0] as i16;
            let value = if px > local - bias { 255u8 } else { 0u8 };
            out.put_pixel(x, y, image::Luma([value]));
        }
    }
    out
}

/// Clamps a bounding box to image bounds. Returns `None` when nothing of the
/// box lies inside the image.
pub fn clamp_region(bbox: &BoundingBox, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = bbox.left.clamp(0, width as i32) as u32;
    let y0 = bbox.top.clamp(0, height as i32) as u32;
    let x1 = bbox.right().clamp(0, width as i32) as u32;
    let y1 = bbox.bottom().clamp(0, height as i32) as u32;
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0, y0, x1 - x0, y1 - y0))
}

/// Crops the clamped region out of the image.
pub fn crop_region(img: &GrayImage, bbox: &BoundingBox) -> Option<GrayImage> {
    let (w, h) = img.dimensions();
    let (x, y, cw, ch) = clamp_region(bbox, w, h)?;
    Some(imageops::crop_imm(img, x, y, cw, ch).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(img: &GrayImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_condition_image_rejects_garbage() {
        let err = condition_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ScanError::ImageDecode(_)));
    }

    #[test]
    fn test_condition_image_upscales_small_captures() {
        let img = GrayImage::from_fn(64, 48, |x, y| image::Luma([((x + y) % 256) as u8]));
        let variants = condition_image(&png_bytes(&img)).unwrap();

        // min side 48 → factor 25.0, both dimensions scaled alike.
        assert_eq!(variants.soft.dimensions(), (1600, 1200));
        assert_eq!(variants.binarized.dimensions(), (1600, 1200));
    }

    #[test]
    fn test_upscale_factor_is_at_least_two() {
        // 1100px min side: 1200/1100 < 2, so the 2.0 floor applies.
        let img = GrayImage::new(1100, 1400);
        let scaled = upscale_if_small(img);
        assert_eq!(scaled.dimensions(), (2200, 2800));
    }

    #[test]
    fn test_upscale_skips_large_captures() {
        let img = GrayImage::new(1920, 1200);
        let scaled = upscale_if_small(img);
        assert_eq!(scaled.dimensions(), (1920, 1200));
    }

    #[test]
    fn test_local_contrast_uniform_stays_uniform() {
        let img = GrayImage::from_pixel(64, 64, image::Luma([128]));
        let out = local_contrast(&img, CLIP_LIMIT, TILE_GRID);
        let first = out.get_pixel(0, 0)[0];
        assert!(out.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn test_adaptive_binarize_output_is_binary() {
        let img = GrayImage::from_fn(64, 64, |x, _| image::Luma([(x * 4) as u8]));
        let out = adaptive_binarize(&img, THRESHOLD_BLOCK, THRESHOLD_BIAS);
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_adaptive_binarize_keeps_thin_strokes() {
        // Thin dark stroke on a light background must survive as black.
        let img = GrayImage::from_fn(64, 64, |x, _| {
            if (30..32).contains(&x) {
                image::Luma([40])
            } else {
                image::Luma([210])
            }
        });
        let out = adaptive_binarize(&img, THRESHOLD_BLOCK, THRESHOLD_BIAS);
        assert_eq!(out.get_pixel(30, 32)[0], 0);
        assert_eq!(out.get_pixel(10, 32)[0], 255);
    }

    #[test]
    fn test_clamp_region() {
        let inside = BoundingBox {
            left: 10,
            top: 10,
            width: 20,
            height: 10,
        };
        assert_eq!(clamp_region(&inside, 100, 100), Some((10, 10, 20, 10)));

        let overlapping = BoundingBox {
            left: -5,
            top: 90,
            width: 20,
            height: 30,
        };
        assert_eq!(clamp_region(&overlapping, 100, 100), Some((0, 90, 15, 10)));

        let outside = BoundingBox {
            left: 200,
            top: 200,
            width: 10,
            height: 10,
        };
        assert_eq!(clamp_region(&outside, 100, 100), None);
    }

    #[test]
    fn test_crop_region() {
        let img = GrayImage::from_fn(100, 100, |x, y| image::Luma([(x + y) as u8]));
        let bbox = BoundingBox {
            left: 10,
            top: 20,
            width: 30,
            height: 5,
        };
        let cropped = crop_region(&img, &bbox).unwrap();
        assert_eq!(cropped.dimensions(), (30, 5));
        assert_eq!(cropped.get_pixel(0, 0)[0], 30);
    }
}
