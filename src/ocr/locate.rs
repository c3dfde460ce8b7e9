//! Locating the stats row that belongs to a username.
//!
//! OCR line segmentation is unreliable on dense HUD text, so two independent
//! signals are tried: the engine's own line grouping first, then raw
//! vertical alignment around the best-matching single token. Neither signal
//! alone covers all observed layouts.

use tracing::debug;

use crate::error::ScanError;

use super::engine::{BoundingBox, OcrDocument, OcrToken};
use super::normalize::{normalize, similarity};

/// Accept threshold for a whole line group matched against the username.
const LINE_ACCEPT_SCORE: f64 = 0.55;
/// Accept threshold for the best single token in the fallback pass.
const TOKEN_ACCEPT_SCORE: f64 = 0.50;
/// Tokens within this many pixels of the anchor's top are treated as the
/// same visual row even when the engine grouped them apart.
const VERTICAL_BAND_PX: i32 = 12;
/// Margin added around the tightest enclosing box of the row's tokens.
const BOX_PAD_PX: i32 = 6;

/// Best-guess row for a username: concatenated text plus a padded box
/// suitable for a targeted re-scan.
#[derive(Debug, Clone)]
pub struct RowCandidate {
    pub text: String,
    pub bbox: BoundingBox,
}

/// A line group with its username similarity, for diagnostics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoredLine {
    pub text: String,
    pub score: f64,
}

/// Finds the token line most likely to belong to `username`.
///
/// Fails with [`ScanError::UsernameNotFound`] when neither pass produces a
/// sufficiently confident candidate.
pub fn locate_row(document: &OcrDocument, username: &str) -> Result<RowCandidate, ScanError> {
    let target = normalize(username);
    if target.is_empty() || document.tokens.is_empty() {
        return Err(ScanError::UsernameNotFound);
    }

    // Pass 1: trust the engine's line grouping.
    let groups = line_groups(document);
    let mut best: Option<(f64, usize)> = None;
    for (idx, group) in groups.iter().enumerate() {
        let (text, _) = assemble_row(group);
        let score = similarity(&normalize(&text), &target);
        if best.is_none_or(|(s, _)| score > s) {
            best = Some((score, idx));
        }
        if score == 1.0 {
            break;
        }
    }
    if let Some((score, idx)) = best {
        if score >= LINE_ACCEPT_SCORE {
            let (text, bbox) = assemble_row(&groups[idx]);
            debug!(score, text = %text, "row located by line grouping");
            return Ok(RowCandidate {
                text,
                bbox: bbox.padded(BOX_PAD_PX),
            });
        }
    }

    // Pass 2: best single token, widened to its visual row.
    let mut best_token: Option<(f64, usize)> = None;
    for (idx, token) in document.tokens.iter().enumerate() {
        let candidate = normalize(&token.text);
        if candidate.is_empty() {
            continue;
        }
        let score = similarity(&candidate, &target);
        if best_token.is_none_or(|(s, _)| score > s) {
            best_token = Some((score, idx));
        }
        if score == 1.0 {
            break;
        }
    }

    let (score, anchor_idx) = best_token.ok_or(ScanError::UsernameNotFound)?;
    if score < TOKEN_ACCEPT_SCORE {
        return Err(ScanError::UsernameNotFound);
    }

    let anchor = &document.tokens[anchor_idx];
    let members: Vec<&OcrToken> = document
        .tokens
        .iter()
        .filter(|t| {
            t.line_key == anchor.line_key
                || (t.bbox.top - anchor.bbox.top).abs() <= VERTICAL_BAND_PX
        })
        .collect();

    let (text, bbox) = assemble_row(&members);
    debug!(score, text = %text, "row located by token fallback");
    Ok(RowCandidate {
        text,
        bbox: bbox.padded(BOX_PAD_PX),
    })
}

/// Scores every line group against the username, best first. Success and
/// failure of [`locate_row`] are unaffected; this feeds the debug payload.
pub fn scored_lines(document: &OcrDocument, username: &str) -> Vec<ScoredLine> {
    let target = normalize(username);
    let mut lines: Vec<ScoredLine> = line_groups(document)
        .iter()
        .map(|group| {
            let (text, _) = assemble_row(group);
            let score = similarity(&normalize(&text), &target);
            ScoredLine { text, score }
        })
        .collect();
    lines.sort_by(|a, b| b.score.total_cmp(&a.score));
    lines
}

/// Groups tokens by engine line key, preserving first-seen order.
fn line_groups(document: &OcrDocument) -> Vec<Vec<&OcrToken>> {
    let mut groups: Vec<Vec<&OcrToken>> = Vec::new();
    let mut index: std::collections::HashMap<super::engine::LineKey, usize> =
        std::collections::HashMap::new();
    for token in &document.tokens {
        match index.get(&token.line_key) {
            Some(&i) => groups[i].push(token),
            None => {
                index.insert(token.line_key, groups.len());
                groups.push(vec![token]);
            }
        }
    }
    groups
}

/// Joins tokens left-to-right into the row text and tightest enclosing box.
fn assemble_row(tokens: &[&OcrToken]) -> (String, BoundingBox) {
    let mut ordered: Vec<&OcrToken> = tokens.to_vec();
    ordered.sort_by_key(|t| t.bbox.left);

    let text = ordered
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let mut bbox = ordered[0].bbox;
    for token in &ordered[1..] {
        bbox = bbox.union(&token.bbox);
    }
    (text, bbox)
}
