//! Register, sync and status flows shared by the HTTP handlers.

use tracing::{info, warn};

use crate::db::models::{Player, Stats, StatsSnapshot, StatusUpdate};
use crate::db::Database;
use crate::error::AppError;
use crate::hiscores::HiscoresSource;

/// Register (or re-register) an account, then take its first snapshot.
///
/// The player row is kept even if the fetch fails, leaving it without
/// snapshots until a later sync succeeds.
pub async fn register_player(
    db: &Database,
    source: &dyn HiscoresSource,
    osrs_username: Option<&str>,
    display_name: Option<&str>,
) -> Result<(Player, Stats), AppError> {
    let osrs_username = non_empty(osrs_username)
        .ok_or_else(|| AppError::Validation("osrsUsername is required".into()))?;
    let display_name = non_empty(display_name);

    let player = db.upsert_player(osrs_username, display_name)?;
    info!("Registered player {} (id={})", player.osrs_username, player.id);

    let stats = sync_stats(db, source, &player).await?;
    let player = db
        .find_player(player.id)?
        .ok_or_else(|| AppError::NotFound("Player not found".into()))?;
    Ok((player, stats))
}

/// Take a new snapshot of an already registered account.
pub async fn sync_player(
    db: &Database,
    source: &dyn HiscoresSource,
    osrs_username: &str,
) -> Result<(i64, Stats), AppError> {
    let player = db
        .find_player_by_username(osrs_username.trim())?
        .ok_or_else(|| AppError::NotFound("Player not found".into()))?;

    let stats = sync_stats(db, source, &player).await?;
    Ok((player.id, stats))
}

/// Attach a status message to a player.
pub fn post_status(
    db: &Database,
    player_id: Option<i64>,
    message: Option<&str>,
) -> Result<StatusUpdate, AppError> {
    // Row ids start at 1, so zero or negative ids count as missing.
    let (player_id, message) = match (player_id.filter(|id| *id > 0), non_empty(message)) {
        (Some(id), Some(message)) => (id, message),
        _ => {
            return Err(AppError::Validation(
                "playerId and message are required".into(),
            ))
        }
    };

    if db.find_player(player_id)?.is_none() {
        return Err(AppError::NotFound("Player not found".into()));
    }

    let status = db.insert_status(player_id, message)?;
    info!("Player {} posted a status update", player_id);
    Ok(status)
}

/// A player together with its most recent snapshots, newest first.
pub fn player_history(
    db: &Database,
    osrs_username: &str,
    limit: i64,
) -> Result<(Player, Vec<StatsSnapshot>), AppError> {
    let player = db
        .find_player_by_username(osrs_username.trim())?
        .ok_or_else(|| AppError::NotFound("Player not found".into()))?;
    let snapshots = db.list_snapshots(player.id, limit)?;
    Ok((player, snapshots))
}

async fn sync_stats(
    db: &Database,
    source: &dyn HiscoresSource,
    player: &Player,
) -> Result<Stats, AppError> {
    let stats = match source.fetch_stats(&player.osrs_username).await {
        Ok(stats) => stats,
        Err(e) => {
            warn!(
                "{} lookup for {} failed: {}",
                source.name(),
                player.osrs_username,
                e
            );
            return Err(e);
        }
    };

    db.record_sync(player.id, &stats)?;
    info!(
        "Synced {}: total level {}, {} xp",
        player.osrs_username, stats.total_level, stats.total_experience
    );
    Ok(stats)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
