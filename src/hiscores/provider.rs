use async_trait::async_trait;

use crate::db::models::Stats;
use crate::error::AppError;

/// Anything that can produce a fresh hiscores reading for an account.
#[async_trait]
pub trait HiscoresSource: Send + Sync {
    /// Fetch and parse the current hiscores of `osrs_username`.
    async fn fetch_stats(&self, osrs_username: &str) -> Result<Stats, AppError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
