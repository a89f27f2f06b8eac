use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::AppError;

pub mod models;
use models::*;

type Result<T> = std::result::Result<T, AppError>;

/// Thread-safe SQLite handle (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Private in-memory database, used by tests
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A panic while holding the lock leaves the connection itself usable.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Players ───────────────────────────────────────────────────────────────

    /// Insert a player, or overwrite the display name of the existing one.
    pub fn upsert_player(&self, osrs_username: &str, display_name: Option<&str>) -> Result<Player> {
        self.upsert_player_at(osrs_username, display_name, Utc::now())
    }

    fn upsert_player_at(
        &self,
        osrs_username: &str,
        display_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Player> {
        let conn = self.conn();
        let player = conn.query_row(
            "INSERT INTO players (osrs_username, display_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(osrs_username) DO UPDATE SET
                display_name=excluded.display_name,
                updated_at=excluded.updated_at
             RETURNING id, osrs_username, display_name, created_at, updated_at, last_synced_at",
            params![osrs_username, display_name, now],
            map_player,
        )?;
        Ok(player)
    }

    /// Look a player up by account name, ignoring case
    pub fn find_player_by_username(&self, osrs_username: &str) -> Result<Option<Player>> {
        let conn = self.conn();
        let player = conn
            .query_row(
                "SELECT id, osrs_username, display_name, created_at, updated_at, last_synced_at
                 FROM players WHERE osrs_username = ?1",
                params![osrs_username],
                map_player,
            )
            .optional()?;
        Ok(player)
    }

    pub fn find_player(&self, id: i64) -> Result<Option<Player>> {
        let conn = self.conn();
        let player = conn
            .query_row(
                "SELECT id, osrs_username, display_name, created_at, updated_at, last_synced_at
                 FROM players WHERE id = ?1",
                params![id],
                map_player,
            )
            .optional()?;
        Ok(player)
    }

    /// Players in registration order, each with its latest snapshot and status.
    pub fn list_players(&self) -> Result<Vec<PlayerSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, osrs_username, display_name, created_at, updated_at, last_synced_at
             FROM players ORDER BY created_at ASC, id ASC",
        )?;
        let players = stmt
            .query_map([], map_player)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        players
            .into_iter()
            .map(|player| -> Result<PlayerSummary> {
                let latest_stats = latest_snapshot(&conn, player.id)?;
                let latest_status = latest_status(&conn, player.id)?;
                Ok(PlayerSummary {
                    player,
                    latest_stats,
                    latest_status,
                })
            })
            .collect()
    }

    // ── Snapshots ─────────────────────────────────────────────────────────────

    /// Append a snapshot and move the player's sync marker, in one transaction.
    pub fn record_sync(&self, player_id: i64, stats: &Stats) -> Result<StatsSnapshot> {
        self.record_sync_at(player_id, stats, Utc::now())
    }

    fn record_sync_at(
        &self,
        player_id: i64,
        stats: &Stats,
        now: DateTime<Utc>,
    ) -> Result<StatsSnapshot> {
        let skills = serde_json::to_string(&stats.skills)?;

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO player_stats (player_id, total_level, overall_xp, skills, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![player_id, stats.total_level, stats.total_experience, skills, now],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE players SET last_synced_at=?1 WHERE id=?2",
            params![now, player_id],
        )?;
        tx.commit()?;
        debug!("Stored snapshot {} for player {}", id, player_id);

        Ok(StatsSnapshot {
            id,
            player_id,
            stats: stats.clone(),
            created_at: now,
        })
    }

    /// A player's snapshots, newest first
    pub fn list_snapshots(&self, player_id: i64, limit: i64) -> Result<Vec<StatsSnapshot>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, player_id, total_level, overall_xp, skills, created_at
             FROM player_stats WHERE player_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let snapshots = stmt
            .query_map(params![player_id, limit], map_snapshot)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(snapshots)
    }

    // ── Status updates ────────────────────────────────────────────────────────

    pub fn insert_status(&self, player_id: i64, message: &str) -> Result<StatusUpdate> {
        self.insert_status_at(player_id, message, Utc::now())
    }

    fn insert_status_at(
        &self,
        player_id: i64,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<StatusUpdate> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO status_updates (player_id, message, created_at) VALUES (?1, ?2, ?3)",
            params![player_id, message, now],
        )?;
        Ok(StatusUpdate {
            id: conn.last_insert_rowid(),
            player_id,
            message: message.to_string(),
            created_at: now,
        })
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn latest_snapshot(conn: &Connection, player_id: i64) -> rusqlite::Result<Option<StatsSnapshot>> {
    conn.query_row(
        "SELECT id, player_id, total_level, overall_xp, skills, created_at
         FROM player_stats WHERE player_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT 1",
        params![player_id],
        map_snapshot,
    )
    .optional()
}

fn latest_status(conn: &Connection, player_id: i64) -> rusqlite::Result<Option<StatusUpdate>> {
    conn.query_row(
        "SELECT id, player_id, message, created_at
         FROM status_updates WHERE player_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT 1",
        params![player_id],
        |row| {
            Ok(StatusUpdate {
                id: row.get(0)?,
                player_id: row.get(1)?,
                message: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    )
    .optional()
}

fn map_player(row: &rusqlite::Row) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        osrs_username: row.get(1)?,
        display_name: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        last_synced_at: row.get(5)?,
    })
}

fn map_snapshot(row: &rusqlite::Row) -> rusqlite::Result<StatsSnapshot> {
    let skills: String = row.get(4)?;
    let skills = serde_json::from_str(&skills).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(StatsSnapshot {
        id: row.get(0)?,
        player_id: row.get(1)?,
        stats: Stats {
            total_level: row.get(2)?,
            total_experience: row.get(3)?,
            skills,
        },
        created_at: row.get(5)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS players (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    osrs_username  TEXT    NOT NULL UNIQUE COLLATE NOCASE,
    display_name   TEXT,
    created_at     TEXT    NOT NULL,
    updated_at     TEXT    NOT NULL,
    last_synced_at TEXT
);

CREATE TABLE IF NOT EXISTS player_stats (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    player_id   INTEGER NOT NULL,
    total_level INTEGER NOT NULL,
    overall_xp  INTEGER NOT NULL,
    skills      TEXT    NOT NULL,
    created_at  TEXT    NOT NULL,
    FOREIGN KEY (player_id) REFERENCES players(id)
);

CREATE TABLE IF NOT EXISTS status_updates (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    player_id   INTEGER NOT NULL,
    message     TEXT    NOT NULL,
    created_at  TEXT    NOT NULL,
    FOREIGN KEY (player_id) REFERENCES players(id)
);

CREATE INDEX IF NOT EXISTS idx_player_stats_player ON player_stats(player_id, created_at);
CREATE INDEX IF NOT EXISTS idx_status_updates_player ON status_updates(player_id, created_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn stats(total_level: i64, xp: i64) -> Stats {
        Stats::from_entries(vec![
            SkillEntry { rank: 10, level: total_level, xp },
            SkillEntry { rank: -1, level: 1, xp: 0 },
        ])
        .unwrap()
    }

    #[test]
    fn test_upsert_is_idempotent_on_username() {
        let db = Database::open_in_memory().unwrap();
        let first = db.upsert_player_at("Zezima", Some("Zez"), t(0)).unwrap();
        let second = db.upsert_player_at("Zezima", Some("The Legend"), t(10)).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.display_name.as_deref(), Some("The Legend"));
        assert_eq!(second.created_at, t(0));
        assert_eq!(second.updated_at, t(10));
        assert_eq!(db.list_players().unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_matches_username_case_insensitively() {
        let db = Database::open_in_memory().unwrap();
        let first = db.upsert_player("Zezima", None).unwrap();
        let second = db.upsert_player("zEZIMA", Some("z")).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.osrs_username, "Zezima");
        assert_eq!(second.display_name.as_deref(), Some("z"));

        let found = db.find_player_by_username("ZEZIMA").unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[test]
    fn test_upsert_clears_display_name() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_player("Lynx Titan", Some("Lynx")).unwrap();
        let player = db.upsert_player("Lynx Titan", None).unwrap();
        assert_eq!(player.display_name, None);
    }

    #[test]
    fn test_find_unknown_player() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.find_player_by_username("nobody").unwrap().is_none());
        assert!(db.find_player(42).unwrap().is_none());
    }

    #[test]
    fn test_record_sync_appends_and_marks_player() {
        let db = Database::open_in_memory().unwrap();
        let player = db.upsert_player_at("Zezima", None, t(0)).unwrap();
        assert!(player.last_synced_at.is_none());

        let snapshot = db.record_sync_at(player.id, &stats(99, 200_000_000), t(5)).unwrap();
        assert_eq!(snapshot.player_id, player.id);

        let player = db.find_player(player.id).unwrap().unwrap();
        assert_eq!(player.last_synced_at, Some(t(5)));

        let stored = db.list_snapshots(player.id, 10).unwrap();
        assert_eq!(stored, vec![snapshot]);
    }

    #[test]
    fn test_record_sync_unknown_player_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let err = db.record_sync(999, &stats(1, 1)).unwrap_err();
        assert_eq!(err.kind(), "storage");
        assert!(db.list_snapshots(999, 10).unwrap().is_empty());
    }

    #[test]
    fn test_list_players_orders_by_creation() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_player_at("Second", None, t(20)).unwrap();
        db.upsert_player_at("First", None, t(10)).unwrap();
        db.upsert_player_at("Third", None, t(30)).unwrap();

        let names: Vec<String> = db
            .list_players()
            .unwrap()
            .into_iter()
            .map(|s| s.player.osrs_username)
            .collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_list_players_picks_latest_rows() {
        let db = Database::open_in_memory().unwrap();
        let a = db.upsert_player_at("Alpha", None, t(0)).unwrap();
        let b = db.upsert_player_at("Bravo", None, t(1)).unwrap();

        // Inserted out of timestamp order: latest is chosen by created_at.
        db.record_sync_at(a.id, &stats(1500, 3_000_000), t(300)).unwrap();
        db.record_sync_at(a.id, &stats(1400, 2_000_000), t(100)).unwrap();
        db.insert_status_at(a.id, "old news", t(50)).unwrap();
        db.insert_status_at(a.id, "maxed slayer", t(60)).unwrap();

        let summaries = db.list_players().unwrap();
        assert_eq!(summaries.len(), 2);

        let alpha = &summaries[0];
        assert_eq!(alpha.player.id, a.id);
        assert_eq!(alpha.player.last_synced_at, Some(t(100)));
        assert_eq!(alpha.latest_stats.as_ref().unwrap().stats.total_level, 1500);
        assert_eq!(alpha.latest_status.as_ref().unwrap().message, "maxed slayer");

        let bravo = &summaries[1];
        assert_eq!(bravo.player.id, b.id);
        assert!(bravo.latest_stats.is_none());
        assert!(bravo.latest_status.is_none());
    }

    #[test]
    fn test_latest_ties_break_on_row_id() {
        let db = Database::open_in_memory().unwrap();
        let p = db.upsert_player_at("Tied", None, t(0)).unwrap();
        db.record_sync_at(p.id, &stats(10, 100), t(5)).unwrap();
        let later = db.record_sync_at(p.id, &stats(11, 200), t(5)).unwrap();
        db.insert_status_at(p.id, "first", t(5)).unwrap();
        db.insert_status_at(p.id, "second", t(5)).unwrap();

        let summary = db.list_players().unwrap().remove(0);
        assert_eq!(summary.latest_stats.unwrap().id, later.id);
        assert_eq!(summary.latest_status.unwrap().message, "second");
    }

    #[test]
    fn test_list_snapshots_newest_first_with_limit() {
        let db = Database::open_in_memory().unwrap();
        let p = db.upsert_player_at("History", None, t(0)).unwrap();
        for i in 0..5 {
            db.record_sync_at(p.id, &stats(100 + i, 1_000 * i), t(i * 60)).unwrap();
        }

        let snapshots = db.list_snapshots(p.id, 3).unwrap();
        let levels: Vec<i64> = snapshots.iter().map(|s| s.stats.total_level).collect();
        assert_eq!(levels, vec![104, 103, 102]);
        assert_eq!(snapshots[0].stats.skills.len(), 2);
        assert_eq!(snapshots[0].stats.skills[1].rank, -1);
    }

    #[test]
    fn test_status_requires_existing_player() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_status(7, "hello").is_err());
    }
}
