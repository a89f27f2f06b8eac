use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A tracked hiscores account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: i64,
    /// Account name as first registered; matched case-insensitively
    pub osrs_username: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `None` until the first successful sync
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl Player {
    /// Name shown on the page: the display name when set, else the account name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.osrs_username)
    }
}

/// One `rank,level,experience` row of the hiscores payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillEntry {
    /// `-1` when the account is unranked in this skill
    pub rank: i64,
    pub level: i64,
    pub xp: i64,
}

/// Parsed hiscores reading. `skills[0]` is always the overall row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_level: i64,
    pub total_experience: i64,
    pub skills: Vec<SkillEntry>,
}

impl Stats {
    /// Build stats from the ordered rows, taking the totals from the overall row.
    pub fn from_entries(skills: Vec<SkillEntry>) -> Result<Self, AppError> {
        let overall = *skills
            .first()
            .ok_or_else(|| AppError::parse("no overall entry"))?;
        Ok(Stats {
            total_level: overall.level,
            total_experience: overall.xp,
            skills,
        })
    }
}

/// A stored snapshot row of `player_stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub id: i64,
    pub player_id: i64,
    #[serde(flatten)]
    pub stats: Stats,
    pub created_at: DateTime<Utc>,
}

/// A free-text note a player left
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub id: i64,
    pub player_id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// A player with its most recent snapshot and status, as listed by `GET /players`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    #[serde(flatten)]
    pub player: Player,
    pub latest_stats: Option<StatsSnapshot>,
    pub latest_status: Option<StatusUpdate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rank: i64, level: i64, xp: i64) -> SkillEntry {
        SkillEntry { rank, level, xp }
    }

    #[test]
    fn test_stats_take_totals_from_overall() {
        let stats =
            Stats::from_entries(vec![entry(1234, 99, 200_000_000), entry(500, 50, 100_000)])
                .unwrap();
        assert_eq!(stats.total_level, 99);
        assert_eq!(stats.total_experience, 200_000_000);
        assert_eq!(stats.skills.len(), 2);
    }

    #[test]
    fn test_stats_require_overall() {
        let err = Stats::from_entries(vec![]).unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn test_stats_json_shape() {
        let stats = Stats::from_entries(vec![entry(-1, 32, 4_470)]).unwrap();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "totalLevel": 32,
                "totalExperience": 4470,
                "skills": [{ "rank": -1, "level": 32, "xp": 4470 }],
            })
        );
    }

    #[test]
    fn test_label_falls_back_to_username() {
        let now = Utc::now();
        let mut player = Player {
            id: 1,
            osrs_username: "Zezima".into(),
            display_name: None,
            created_at: now,
            updated_at: now,
            last_synced_at: None,
        };
        assert_eq!(player.label(), "Zezima");
        player.display_name = Some("Zez".into());
        assert_eq!(player.label(), "Zez");
    }
}
