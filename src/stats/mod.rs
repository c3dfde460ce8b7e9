//! Per-player box score records and numeric coercion helpers.

pub mod lookup;

use serde::{Deserialize, Serialize};

/// One player's parsed statistics line for one game.
///
/// All counting fields are non-negative. Shooting pairs are kept as read;
/// `made <= attempted` is deliberately not enforced because OCR noise can
/// violate it without the rest of the row being wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxScoreRecord {
    pub username: String,
    /// Letter grade `A`-`F` with optional `+`/`-`, when one was visible.
    pub grade: Option<String>,
    /// Team marker (`away`/`home`), present only on the lookup path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    pub points: u32,
    pub rebounds: u32,
    pub assists: u32,
    pub steals: u32,
    pub blocks: u32,
    pub fouls: u32,
    pub turnovers: u32,
    pub fg_made: u32,
    pub fg_attempted: u32,
    pub three_made: u32,
    pub three_attempted: u32,
    pub ft_made: u32,
    pub ft_attempted: u32,
    /// Capture date (ISO `YYYY-MM-DD`), never read from the image.
    pub date: String,
}

/// Best-effort integer conversion. Anything that does not parse as a
/// non-negative integer becomes `default`.
///
/// Lossy on purpose: an unreadable cell and a true zero are indistinguishable
/// in the output, which keeps rows structurally complete at the cost of
/// hiding individual misreads.
pub fn parse_int_or_default(text: &str, default: u32) -> u32 {
    text.trim().parse::<u32>().unwrap_or(default)
}

/// Splits a `"made/attempted"` string into integers. Missing or malformed
/// values come back as `0/0`.
pub fn split_made_attempted(text: &str) -> (u32, u32) {
    match text.split_once('/') {
        Some((made, attempted)) => (
            parse_int_or_default(made, 0),
            parse_int_or_default(attempted, 0),
        ),
        None => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_or_default() {
        assert_eq!(parse_int_or_default("21", 0), 21);
        assert_eq!(parse_int_or_default(" 7 ", 0), 7);
        assert_eq!(parse_int_or_default("N/A", 0), 0);
        assert_eq!(parse_int_or_default("", 0), 0);
        assert_eq!(parse_int_or_default("-3", 0), 0);
    }

    #[test]
    fn test_split_made_attempted() {
        assert_eq!(split_made_attempted("9/16"), (9, 16));
        assert_eq!(split_made_attempted("0/0"), (0, 0));
        assert_eq!(split_made_attempted("bad"), (0, 0));
        assert_eq!(split_made_attempted("3/x"), (3, 0));
        assert_eq!(split_made_attempted(""), (0, 0));
    }
}
