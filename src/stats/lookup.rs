//! Lookup of a player's stats inside pre-structured row dictionaries.
//!
//! Upstream scrapes hand over rows as loose key/value maps whose key casing
//! and naming drift between sources. Each logical field carries an ordered
//! list of accepted key names; the first present key wins.

use std::collections::HashMap;

use chrono::Local;
use serde_json::Value;

use super::{parse_int_or_default, split_made_attempted, BoxScoreRecord};

const GRADE_KEYS: &[&str] = &["grd", "grade"];
const POINTS_KEYS: &[&str] = &["pts", "points"];
const REBOUNDS_KEYS: &[&str] = &["reb", "rebounds"];
const ASSISTS_KEYS: &[&str] = &["ast", "assists"];
const STEALS_KEYS: &[&str] = &["stl", "steals"];
const BLOCKS_KEYS: &[&str] = &["blk", "blocks"];
const FOULS_KEYS: &[&str] = &["fouls", "pf"];
const TURNOVERS_KEYS: &[&str] = &["to", "tov", "turnovers"];

const FG_PAIR_KEYS: &[&str] = &["fgm/fga", "fg"];
const FG_MADE_KEYS: &[&str] = &["fgm"];
const FG_ATT_KEYS: &[&str] = &["fga"];
const THREE_PAIR_KEYS: &[&str] = &["3pm/3pa", "3pt"];
const THREE_MADE_KEYS: &[&str] = &["3pm", "tpm"];
const THREE_ATT_KEYS: &[&str] = &["3pa", "tpa"];
const FT_PAIR_KEYS: &[&str] = &["ftm/fta", "ft"];
const FT_MADE_KEYS: &[&str] = &["ftm"];
const FT_ATT_KEYS: &[&str] = &["fta"];

/// Returns the stats record for `username` from `rows`, or `None` when no
/// row matches. Username comparison is case-insensitive; the first matching
/// row wins.
pub fn get_player_stats(
    rows: &[HashMap<String, Value>],
    username: &str,
) -> Option<BoxScoreRecord> {
    let target = username.to_lowercase();

    for row in rows {
        // Case-fold keys once per row; sources disagree on casing.
        let normalized: HashMap<String, &Value> = row
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();

        let name = text_field(&normalized, &["username"]);
        let name = name.trim();
        if name.is_empty() || name.to_lowercase() != target {
            continue;
        }

        let (fg_made, fg_attempted) =
            shooting_pair(&normalized, FG_PAIR_KEYS, FG_MADE_KEYS, FG_ATT_KEYS);
        let (three_made, three_attempted) =
            shooting_pair(&normalized, THREE_PAIR_KEYS, THREE_MADE_KEYS, THREE_ATT_KEYS);
        let (ft_made, ft_attempted) =
            shooting_pair(&normalized, FT_PAIR_KEYS, FT_MADE_KEYS, FT_ATT_KEYS);

        let grade = text_field(&normalized, GRADE_KEYS);
        let team = text_field(&normalized, &["team"]);

        return Some(BoxScoreRecord {
            username: name.to_string(),
            grade: (!grade.is_empty()).then_some(grade),
            team: (!team.is_empty()).then_some(team),
            points: int_field(&normalized, POINTS_KEYS),
            rebounds: int_field(&normalized, REBOUNDS_KEYS),
            assists: int_field(&normalized, ASSISTS_KEYS),
            steals: int_field(&normalized, STEALS_KEYS),
            blocks: int_field(&normalized, BLOCKS_KEYS),
            fouls: int_field(&normalized, FOULS_KEYS),
            turnovers: int_field(&normalized, TURNOVERS_KEYS),
            fg_made,
            fg_attempted,
            three_made,
            three_attempted,
            ft_made,
            ft_attempted,
            date: Local::now().format("%Y-%m-%d").to_string(),
        });
    }

    None
}

/// Renders a JSON value the way a scraped cell reads: strings as-is, numbers
/// printed, everything else empty.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn first_value<'a>(row: &HashMap<String, &'a Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| row.get(*k).copied())
}

fn text_field(row: &HashMap<String, &Value>, keys: &[&str]) -> String {
    first_value(row, keys).map(value_text).unwrap_or_default()
}

fn int_field(row: &HashMap<String, &Value>, keys: &[&str]) -> u32 {
    first_value(row, keys)
        .map(|v| parse_int_or_default(&value_text(v), 0))
        .unwrap_or(0)
}

/// Resolves one shooting pair, preferring a combined `"made/attempted"` cell
/// and falling back to separately keyed made/attempted cells.
fn shooting_pair(
    row: &HashMap<String, &Value>,
    pair_keys: &[&str],
    made_keys: &[&str],
    att_keys: &[&str],
) -> (u32, u32) {
    if let Some(v) = first_value(row, pair_keys) {
        return split_made_attempted(&value_text(v));
    }
    (int_field(row, made_keys), int_field(row, att_keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(entries: &[(&str, Value)]) -> HashMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn sample_rows() -> Vec<HashMap<String, Value>> {
        vec![
            row(&[
                ("team", json!("away")),
                ("username", json!("AUSWEN")),
                ("GRD", json!("A")),
                ("PTS", json!("21")),
                ("REB", json!("5")),
                ("AST", json!("11")),
                ("STL", json!("2")),
                ("BLK", json!("0")),
                ("FOULS", json!("4")),
                ("TO", json!("0")),
                ("FGM/FGA", json!("9/16")),
                ("3PM/3PA", json!("2/2")),
                ("FTM/FTA", json!("1/2")),
            ]),
            row(&[
                ("team", json!("home")),
                ("username", json!("OtherUser")),
                ("GRD", json!("B+")),
                ("PTS", json!("10")),
                ("FGM/FGA", json!("4/12")),
                ("3PM/3PA", json!("1/4")),
                ("FTM/FTA", json!("1/1")),
            ]),
        ]
    }

    #[test]
    fn test_find_player_case_insensitive() {
        let stats = get_player_stats(&sample_rows(), "auswen").unwrap();
        assert_eq!(stats.username, "AUSWEN");
        assert_eq!(stats.team.as_deref(), Some("away"));
        assert_eq!(stats.grade.as_deref(), Some("A"));
        assert_eq!(stats.points, 21);
        assert_eq!(stats.rebounds, 5);
        assert_eq!(stats.assists, 11);
        assert_eq!(stats.steals, 2);
        assert_eq!(stats.blocks, 0);
        assert_eq!(stats.fouls, 4);
        assert_eq!(stats.turnovers, 0);
        assert_eq!((stats.fg_made, stats.fg_attempted), (9, 16));
        assert_eq!((stats.three_made, stats.three_attempted), (2, 2));
        assert_eq!((stats.ft_made, stats.ft_attempted), (1, 2));
    }

    #[test]
    fn test_returns_none_when_missing() {
        assert!(get_player_stats(&sample_rows(), "missing").is_none());
    }

    #[test]
    fn test_handles_bad_numbers() {
        let rows = vec![row(&[
            ("team", json!("home")),
            ("username", json!("User")),
            ("GRD", json!("B")),
            ("PTS", json!("N/A")),
            ("REB", Value::Null),
            ("AST", json!("3")),
            ("FGM/FGA", json!("bad")),
            ("3PM/3PA", json!("1/3")),
            ("FTM/FTA", json!("")),
        ])];
        let stats = get_player_stats(&rows, "user").unwrap();
        assert_eq!(stats.points, 0);
        assert_eq!(stats.rebounds, 0);
        assert_eq!(stats.assists, 3);
        assert_eq!((stats.fg_made, stats.fg_attempted), (0, 0));
        assert_eq!((stats.three_made, stats.three_attempted), (1, 3));
        assert_eq!((stats.ft_made, stats.ft_attempted), (0, 0));
    }

    #[test]
    fn test_separately_keyed_pairs_and_synonyms() {
        let rows = vec![row(&[
            ("username", json!("Sharp")),
            ("grade", json!("C-")),
            ("points", json!(14)),
            ("rebounds", json!(6)),
            ("assists", json!(2)),
            ("steals", json!(1)),
            ("blocks", json!(1)),
            ("pf", json!(3)),
            ("tov", json!(2)),
            ("fgm", json!(5)),
            ("fga", json!(9)),
            ("tpm", json!(2)),
            ("tpa", json!(4)),
            ("ftm", json!(2)),
            ("fta", json!(2)),
        ])];
        let stats = get_player_stats(&rows, "SHARP").unwrap();
        assert_eq!(stats.grade.as_deref(), Some("C-"));
        assert_eq!(stats.points, 14);
        assert_eq!(stats.fouls, 3);
        assert_eq!(stats.turnovers, 2);
        assert_eq!((stats.fg_made, stats.fg_attempted), (5, 9));
        assert_eq!((stats.three_made, stats.three_attempted), (2, 4));
        assert_eq!((stats.ft_made, stats.ft_attempted), (2, 2));
    }

    #[test]
    fn test_first_matching_row_wins() {
        let rows = vec![
            row(&[("username", json!("Dup")), ("pts", json!("8"))]),
            row(&[("username", json!("dup")), ("pts", json!("30"))]),
        ];
        let stats = get_player_stats(&rows, "DUP").unwrap();
        assert_eq!(stats.points, 8);
    }
}
