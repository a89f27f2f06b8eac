//! Parser for the plaintext "lite" hiscores format.
//!
//! The body is one `rank,level,experience` line per skill in a fixed order,
//! starting with the overall row. Unranked skills report a rank of `-1`.

use crate::db::models::{SkillEntry, Stats};
use crate::error::AppError;

/// Skill rows in the order the hiscores service emits them.
pub const SKILLS: [&str; 24] = [
    "Overall",
    "Attack",
    "Defence",
    "Strength",
    "Hitpoints",
    "Ranged",
    "Prayer",
    "Magic",
    "Cooking",
    "Woodcutting",
    "Fletching",
    "Fishing",
    "Firemaking",
    "Crafting",
    "Smithing",
    "Mining",
    "Herblore",
    "Agility",
    "Thieving",
    "Slayer",
    "Farming",
    "Runecraft",
    "Hunter",
    "Construction",
];

pub fn skill_name(index: usize) -> Option<&'static str> {
    SKILLS.get(index).copied()
}

/// Parse a hiscores body that must contain exactly `expected_lines` rows.
///
/// Malformed input is rejected as a whole; no partially filled stats are
/// ever returned.
pub fn parse_hiscores(body: &str, expected_lines: usize) -> Result<Stats, AppError> {
    let body = body.trim_end();
    if body.is_empty() {
        return Err(AppError::parse("empty response body"));
    }

    let lines: Vec<&str> = body.split('\n').collect();
    if lines.len() != expected_lines {
        return Err(AppError::parse(format!(
            "expected {} lines, found {}",
            expected_lines,
            lines.len()
        )));
    }

    let entries = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            parse_line(line).map_err(|reason| AppError::parse(format!("line {}: {}", i + 1, reason)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Stats::from_entries(entries)
}

fn parse_line(line: &str) -> Result<SkillEntry, String> {
    let fields: Vec<&str> = line.trim_end_matches('\r').split(',').collect();
    if fields.len() != 3 {
        return Err(format!("expected 3 fields, found {}", fields.len()));
    }

    let number = |field: &str| {
        let field = field.trim();
        field
            .parse::<i64>()
            .map_err(|_| format!("invalid number '{}'", field))
    };

    Ok(SkillEntry {
        rank: number(fields[0])?,
        level: number(fields[1])?,
        xp: number(fields[2])?,
    })
}
