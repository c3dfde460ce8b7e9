//! OCR engine contract and the tesseract subprocess implementation.
//!
//! The scanner never performs glyph recognition itself. It hands a raster to
//! an engine and interprets whatever tokens come back. Tesseract is invoked
//! as an external process with TSV output for structured token data, or
//! stdout for plain single-line text.

use std::io;
use std::path::PathBuf;
use std::process::Command;

use image::GrayImage;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::ScanError;

use super::setup::find_tesseract_executable;

/// Pixel-space box of one recognized token, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }

    /// Smallest box enclosing both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        BoundingBox {
            left,
            top,
            width: right - left,
            height: bottom - top,
        }
    }

    /// Expands the box by `margin` on every side, clamped at the origin.
    pub fn padded(&self, margin: i32) -> BoundingBox {
        let left = (self.left - margin).max(0);
        let top = (self.top - margin).max(0);
        BoundingBox {
            left,
            top,
            width: self.right() + margin - left,
            height: self.bottom() + margin - top,
        }
    }
}

/// Opaque line membership assigned by the engine (block/paragraph/line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub block: i32,
    pub paragraph: i32,
    pub line: i32,
}

/// A single recognized text fragment.
#[derive(Debug, Clone)]
pub struct OcrToken {
    pub text: String,
    pub bbox: BoundingBox,
    pub line_key: LineKey,
}

/// All tokens produced by one engine invocation over one image.
/// Consumed read-only; tokens have no identity across invocations.
#[derive(Debug, Clone, Default)]
pub struct OcrDocument {
    pub tokens: Vec<OcrToken>,
}

/// Invocation options forwarded to the engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Page segmentation mode (tesseract `--psm`).
    pub psm: u8,
    /// Keep the engine's inter-word spacing in text output.
    pub preserve_spaces: bool,
    /// Restrict recognition to these characters when set.
    pub whitelist: Option<String>,
}

impl EngineOptions {
    /// Full-image token detection over a uniform block of HUD text.
    pub fn document() -> Self {
        EngineOptions {
            psm: 6,
            preserve_spaces: false,
            whitelist: None,
        }
    }

    /// Constrained single-line recognition for targeted re-scans.
    pub fn single_line(whitelist: &str) -> Self {
        EngineOptions {
            psm: 7,
            preserve_spaces: true,
            whitelist: Some(whitelist.to_string()),
        }
    }
}

/// The consumed OCR engine surface. Production code uses [`Tesseract`];
/// tests substitute scripted engines.
pub trait OcrEngine {
    /// Runs token-level recognition and returns the full document.
    fn recognize_document(
        &self,
        image: &GrayImage,
        options: &EngineOptions,
    ) -> Result<OcrDocument, ScanError>;

    /// Runs recognition and returns the raw text only.
    fn recognize_text(
        &self,
        image: &GrayImage,
        options: &EngineOptions,
    ) -> Result<String, ScanError>;
}

/// Tesseract CLI wrapper.
pub struct Tesseract {
    executable: PathBuf,
}

impl Tesseract {
    /// Resolves the tesseract binary. Fails with
    /// [`ScanError::EngineUnavailable`] when none can be found.
    pub fn locate() -> Result<Self, ScanError> {
        Ok(Tesseract {
            executable: find_tesseract_executable()?,
        })
    }

    fn base_command(&self, input: &std::path::Path, options: &EngineOptions) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(input);
        cmd.args(["-l", "eng"]);
        cmd.args(["--psm", &options.psm.to_string()]);
        if options.preserve_spaces {
            cmd.args(["-c", "preserve_interword_spaces=1"]);
        }
        if let Some(chars) = &options.whitelist {
            cmd.arg("-c");
            cmd.arg(format!("tessedit_char_whitelist={}", chars));
        }
        cmd
    }

    fn save_to_temp(image: &GrayImage) -> Result<NamedTempFile, ScanError> {
        let temp = NamedTempFile::with_suffix(".png")
            .map_err(|e| ScanError::Engine(format!("temp file: {}", e)))?;
        image
            .save(temp.path())
            .map_err(|e| ScanError::Engine(format!("failed to write raster: {}", e)))?;
        Ok(temp)
    }

    fn run(mut cmd: Command) -> Result<std::process::Output, ScanError> {
        let output = cmd.output().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ScanError::EngineUnavailable
            } else {
                ScanError::Engine(format!("failed to spawn tesseract: {}", e))
            }
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::Engine(format!(
                "tesseract failed: {}",
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

impl OcrEngine for Tesseract {
    fn recognize_document(
        &self,
        image: &GrayImage,
        options: &EngineOptions,
    ) -> Result<OcrDocument, ScanError> {
        let temp_input = Self::save_to_temp(image)?;

        // Tesseract appends .tsv to the output base on its own.
        let temp_output = NamedTempFile::new()
            .map_err(|e| ScanError::Engine(format!("temp file: {}", e)))?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut cmd = self.base_command(temp_input.path(), options);
        cmd.arg(&output_base);
        cmd.arg("tsv");
        Self::run(cmd)?;

        let tsv_path = format!("{}.tsv", output_base);
        let tsv = std::fs::read_to_string(&tsv_path)
            .map_err(|e| ScanError::Engine(format!("failed to read tesseract output: {}", e)))?;
        let _ = std::fs::remove_file(&tsv_path);

        let document = parse_tsv_document(&tsv);
        debug!(tokens = document.tokens.len(), "tesseract document pass");
        Ok(document)
    }

    fn recognize_text(
        &self,
        image: &GrayImage,
        options: &EngineOptions,
    ) -> Result<String, ScanError> {
        let temp_input = Self::save_to_temp(image)?;

        let mut cmd = self.base_command(temp_input.path(), options);
        cmd.arg("stdout");
        let output = Self::run(cmd)?;

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Parses tesseract TSV output into word-level tokens.
///
/// TSV columns: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text. Only level-5 (word) rows with
/// non-empty text and a real confidence are kept.
fn parse_tsv_document(tsv: &str) -> OcrDocument {
    let mut tokens = Vec::new();

    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        if level != 5 {
            continue;
        }

        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        if conf < 0.0 {
            continue;
        }

        let parse = |idx: usize| fields[idx].parse::<i32>().unwrap_or(0);
        tokens.push(OcrToken {
            text: text.to_string(),
            bbox: BoundingBox {
                left: parse(6),
                top: parse(7),
                width: parse(8),
                height: parse(9),
            },
            line_key: LineKey {
                block: parse(2),
                paragraph: parse(3),
                line: parse(4),
            },
        });
    }

    OcrDocument { tokens }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn word_row(block: i32, line: i32, word: i32, left: i32, top: i32, text: &str) -> String {
        format!("5\t1\t{block}\t1\t{line}\t{word}\t{left}\t{top}\t40\t18\t91.5\t{text}")
    }

    #[test]
    fn test_parse_tsv_keeps_word_rows() {
        let tsv = [
            HEADER.to_string(),
            "1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t".to_string(),
            "4\t1\t1\t1\t1\t0\t10\t20\t300\t18\t-1\t".to_string(),
            word_row(1, 1, 1, 10, 20, "AUSWEN"),
            word_row(1, 1, 2, 60, 20, "21"),
        ]
        .join("\n");

        let doc = parse_tsv_document(&tsv);
        assert_eq!(doc.tokens.len(), 2);
        assert_eq!(doc.tokens[0].text, "AUSWEN");
        assert_eq!(doc.tokens[0].bbox.left, 10);
        assert_eq!(doc.tokens[0].bbox.top, 20);
        assert_eq!(doc.tokens[0].line_key, doc.tokens[1].line_key);
    }

    #[test]
    fn test_parse_tsv_drops_empty_and_unconfident() {
        let tsv = [
            HEADER.to_string(),
            word_row(1, 1, 1, 10, 20, " "),
            "5\t1\t1\t1\t1\t2\t60\t20\t40\t18\t-1\tghost".to_string(),
            word_row(1, 2, 1, 10, 44, "ok"),
        ]
        .join("\n");

        let doc = parse_tsv_document(&tsv);
        assert_eq!(doc.tokens.len(), 1);
        assert_eq!(doc.tokens[0].text, "ok");
    }

    #[test]
    fn test_parse_tsv_distinguishes_line_keys() {
        let tsv = [
            HEADER.to_string(),
            word_row(1, 1, 1, 10, 20, "a"),
            word_row(1, 2, 1, 10, 44, "b"),
            word_row(2, 1, 1, 10, 90, "c"),
        ]
        .join("\n");

        let doc = parse_tsv_document(&tsv);
        let keys: Vec<LineKey> = doc.tokens.iter().map(|t| t.line_key).collect();
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[0], keys[2]);
        assert_ne!(keys[1], keys[2]);
    }

    #[test]
    fn test_bounding_box_union_and_pad() {
        let a = BoundingBox {
            left: 10,
            top: 20,
            width: 40,
            height: 18,
        };
        let b = BoundingBox {
            left: 60,
            top: 22,
            width: 30,
            height: 18,
        };
        let u = a.union(&b);
        assert_eq!((u.left, u.top, u.width, u.height), (10, 20, 80, 20));

        let p = u.padded(6);
        assert_eq!((p.left, p.top, p.width, p.height), (4, 14, 92, 32));

        // Padding clamps at the image origin.
        let edge = BoundingBox {
            left: 2,
            top: 3,
            width: 10,
            height: 10,
        };
        let p = edge.padded(6);
        assert_eq!((p.left, p.top), (0, 0));
        assert_eq!((p.width, p.height), (18, 19));
    }
}
