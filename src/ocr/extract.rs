//! Tolerant parsing of a located stats row into a box score record.
//!
//! The game client and the OCR engine between them produce rows with merged
//! or split shooting fractions, dropped slashes, fused grade+name runs, and
//! stray glyphs. Extraction runs three strategies in order, most specific
//! first; the first one that fills all 13 numeric fields wins.

use std::sync::OnceLock;

use chrono::Local;
use regex::Regex;
use tracing::debug;

use crate::error::ScanError;
use crate::stats::{parse_int_or_default, split_made_attempted, BoxScoreRecord};

use super::normalize::{normalize, similarity};

/// Accept threshold for matching a token against the expected username.
const USERNAME_ACCEPT_SCORE: f64 = 0.60;
/// Reject resolved points above this; a guard against catastrophic misparse,
/// not a domain ceiling.
const MAX_POINTS: u32 = 2000;

fn grade_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-F][+-]?$").expect("hard-coded pattern"))
}

fn pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+/\d+$").expect("hard-coded pattern"))
}

fn int_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+$").expect("hard-coded pattern"))
}

fn digit_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("hard-coded pattern"))
}

/// The 13 numeric fields of a row, before identity resolution.
struct NumericFields {
    counts: [u32; 7],
    fg: (u32, u32),
    three: (u32, u32),
    ft: (u32, u32),
}

/// Parses a row of OCR text into a [`BoxScoreRecord`].
///
/// When `expected_username` is given it anchors identity resolution and its
/// spelling is echoed into the record; otherwise the first token is taken as
/// the username.
///
/// Fails with [`ScanError::StatsParse`] on empty input, when no strategy
/// resolves all 13 numeric fields, or when points exceed the sanity bound.
pub fn parse_stats_row(
    row_text: &str,
    expected_username: Option<&str>,
) -> Result<BoxScoreRecord, ScanError> {
    let raw_tokens: Vec<String> = row_text.split_whitespace().map(str::to_string).collect();
    if raw_tokens.is_empty() {
        return Err(ScanError::StatsParse("empty stats row".into()));
    }

    // Merge split fractions before anything looks at individual numbers, so
    // "5 / 10" is one shooting pair and not two counting stats.
    let tokens = merge_fraction_tokens(raw_tokens);

    let (username, grade) = resolve_username_and_grade(&tokens, expected_username);
    let fields = extract_numeric_fields(&tokens, row_text)?;

    let [points, rebounds, assists, steals, blocks, fouls, turnovers] = fields.counts;
    if points > MAX_POINTS {
        return Err(ScanError::StatsParse(format!(
            "resolved points {} exceeds sanity bound",
            points
        )));
    }

    Ok(BoxScoreRecord {
        username,
        grade,
        team: None,
        points,
        rebounds,
        assists,
        steals,
        blocks,
        fouls,
        turnovers,
        fg_made: fields.fg.0,
        fg_attempted: fields.fg.1,
        three_made: fields.three.0,
        three_attempted: fields.three.1,
        ft_made: fields.ft.0,
        ft_attempted: fields.ft.1,
        date: Local::now().format("%Y-%m-%d").to_string(),
    })
}

/// Re-joins made/attempted fractions the tokenizer split apart: `"5 / 10"`,
/// `"5/ 10"`, and `"5 /10"` all become `"5/10"`. Already-merged fractions
/// pass through untouched, so the merge is idempotent.
fn merge_fraction_tokens(tokens: Vec<String>) -> Vec<String> {
    let is_int = |t: &str| int_re().is_match(t);

    let mut merged = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let t = &tokens[i];

        // "5 / 10"
        if i + 2 < tokens.len() && tokens[i + 1] == "/" && is_int(t) && is_int(&tokens[i + 2]) {
            merged.push(format!("{}/{}", t, tokens[i + 2]));
            i += 3;
            continue;
        }
        // "5/ 10"
        if i + 1 < tokens.len()
            && t.len() > 1
            && t.ends_with('/')
            && is_int(&t[..t.len() - 1])
            && is_int(&tokens[i + 1])
        {
            merged.push(format!("{}{}", t, tokens[i + 1]));
            i += 2;
            continue;
        }
        // "5 /10"
        if i + 1 < tokens.len()
            && is_int(t)
            && tokens[i + 1].len() > 1
            && tokens[i + 1].starts_with('/')
            && is_int(&tokens[i + 1][1..])
        {
            merged.push(format!("{}{}", t, tokens[i + 1]));
            i += 2;
            continue;
        }

        merged.push(t.clone());
        i += 1;
    }
    merged
}

/// Resolves the row's username and grade.
///
/// With an expected username, every token is fuzzy-matched in both raw and
/// normalized form; an accepted match that is longer than the username is a
/// fused grade+name run (`"B-AUSWEN"`), and the remainder after stripping
/// the name becomes the grade when it fits the grade pattern. Without a
/// match the first token stands in. An unset grade falls back to the first
/// standalone token matching the grade pattern.
fn resolve_username_and_grade(
    tokens: &[String],
    expected_username: Option<&str>,
) -> (String, Option<String>) {
    let mut username = None;
    let mut grade = None;

    if let Some(target) = expected_username {
        let target_upper = target.to_uppercase();
        let target_norm = normalize(target);

        let mut best: Option<(f64, usize)> = None;
        for (idx, token) in tokens.iter().enumerate() {
            let raw_score = similarity(&token.to_uppercase(), &target_upper);
            let norm = normalize(token);
            let norm_score = if norm.is_empty() || target_norm.is_empty() {
                0.0
            } else {
                similarity(&norm, &target_norm)
            };
            let score = raw_score.max(norm_score);
            if best.is_none_or(|(s, _)| score > s) {
                best = Some((score, idx));
            }
            if score == 1.0 {
                break;
            }
        }

        if let Some((score, idx)) = best {
            if score >= USERNAME_ACCEPT_SCORE {
                username = Some(target.to_string());

                let token_upper = tokens[idx].to_uppercase();
                if token_upper.len() > target_upper.len() {
                    let rest = token_upper
                        .strip_prefix(&target_upper)
                        .or_else(|| token_upper.strip_suffix(&target_upper));
                    if let Some(rest) = rest {
                        if grade_re().is_match(rest) {
                            grade = Some(rest.to_string());
                        }
                    }
                }
            }
        }
    }

    let username = username.unwrap_or_else(|| tokens[0].clone());

    if grade.is_none() {
        grade = tokens.iter().find(|t| grade_re().is_match(t)).cloned();
    }

    (username, grade)
}

/// Runs the three extraction strategies in order; first success wins.
fn extract_numeric_fields(tokens: &[String], row_text: &str) -> Result<NumericFields, ScanError> {
    if let Some(fields) = strategy_explicit_pairs(tokens) {
        debug!("numeric fields resolved from explicit pairs");
        return Ok(fields);
    }
    if let Some(fields) = strategy_integer_run(tokens) {
        debug!("numeric fields resolved from integer run");
        return Ok(fields);
    }
    if let Some(fields) = strategy_digit_scan(row_text) {
        debug!("numeric fields resolved from raw digit scan");
        return Ok(fields);
    }
    Err(ScanError::StatsParse(
        "could not resolve 13 numeric fields from row".into(),
    ))
}

/// Strategy A: explicit `made/attempted` pairs.
///
/// With three or more pairs, the last three (by position) are the
/// field-goal, three-point, and free-throw splits. With exactly two, they
/// map in order to field-goal and three-point and the free-throw split
/// defaults to 0/0 (the trailing pair is the one the capture most often
/// cuts off). The seven counting stats must appear as exactly seven
/// integers before the field-goal pair, extending into the gap before the
/// three-point pair when the row interleaves them.
fn strategy_explicit_pairs(tokens: &[String]) -> Option<NumericFields> {
    let pair_positions: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| pair_re().is_match(t))
        .map(|(i, _)| i)
        .collect();
    if pair_positions.len() < 2 {
        return None;
    }

    let chosen: &[usize] = if pair_positions.len() >= 3 {
        &pair_positions[pair_positions.len() - 3..]
    } else {
        &pair_positions
    };
    let fg_idx = chosen[0];
    let three_idx = chosen[1];

    let collect_ints = |range: &[String]| -> Vec<u32> {
        range
            .iter()
            .filter(|t| int_re().is_match(t))
            .map(|t| parse_int_or_default(t, 0))
            .collect()
    };

    let mut counts = collect_ints(&tokens[..fg_idx]);
    if counts.len() < 7 {
        counts.extend(collect_ints(&tokens[fg_idx + 1..three_idx]));
    }
    if counts.len() != 7 {
        return None;
    }

    let pair_at = |i: usize| split_made_attempted(&tokens[i]);
    Some(NumericFields {
        counts: counts.try_into().expect("length checked above"),
        fg: pair_at(fg_idx),
        three: pair_at(three_idx),
        ft: chosen.get(2).map(|&i| pair_at(i)).unwrap_or((0, 0)),
    })
}

/// Strategy B: no reliable pairs; a plain run of at least 13 integers.
fn strategy_integer_run(tokens: &[String]) -> Option<NumericFields> {
    let ints: Vec<u32> = tokens
        .iter()
        .filter(|t| int_re().is_match(t))
        .map(|t| parse_int_or_default(t, 0))
        .collect();
    allocate_integer_run(&ints)
}

/// Strategy C: last resort; every digit run in the original row text,
/// ignoring token boundaries entirely.
fn strategy_digit_scan(row_text: &str) -> Option<NumericFields> {
    let ints: Vec<u32> = digit_run_re()
        .find_iter(row_text)
        .map(|m| parse_int_or_default(m.as_str(), 0))
        .collect();
    allocate_integer_run(&ints)
}

/// Shared allocation for strategies B and C.
///
/// The last six integers are the shooting splits in layout order (FG, 3PT,
/// FT, made before attempted); the seven integers immediately before them
/// are the counting stats. Leading extras (a grade misread as a number) are
/// dropped.
fn allocate_integer_run(ints: &[u32]) -> Option<NumericFields> {
    if ints.len() < 13 {
        return None;
    }
    let n = ints.len();
    let shooting = &ints[n - 6..];
    let counts = &ints[n - 13..n - 6];

    Some(NumericFields {
        counts: counts.try_into().expect("slice of 7"),
        fg: (shooting[0], shooting[1]),
        three: (shooting[2], shooting[3]),
        ft: (shooting[4], shooting[5]),
    })
}
