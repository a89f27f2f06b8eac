use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::parser::parse_hiscores;
use super::provider::HiscoresSource;
use crate::db::models::Stats;
use crate::error::AppError;

/// Client for the plaintext "index_lite" hiscores endpoint.
#[derive(Clone)]
pub struct HiscoresClient {
    http: Client,
    base_url: Url,
    timeout: Duration,
    expected_lines: usize,
}

impl HiscoresClient {
    pub fn new(base_url: &str, timeout: Duration, expected_lines: usize) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = Url::parse(base_url).context("Invalid hiscores URL")?;
        Ok(HiscoresClient {
            http,
            base_url,
            timeout,
            expected_lines,
        })
    }

    /// Lookup URL with the account name percent-encoded into the `player` parameter.
    fn lookup_url(&self, osrs_username: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("player", osrs_username);
        url
    }

    fn upstream_error(&self, err: reqwest::Error) -> AppError {
        let message = if err.is_timeout() {
            format!("timed out after {:?}", self.timeout)
        } else {
            err.to_string()
        };
        AppError::Upstream {
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }
}

#[async_trait]
impl HiscoresSource for HiscoresClient {
    fn name(&self) -> &str {
        "OSRS hiscores"
    }

    async fn fetch_stats(&self, osrs_username: &str) -> Result<Stats, AppError> {
        let url = self.lookup_url(osrs_username);
        debug!("Fetching hiscores from {}", url);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.upstream_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Upstream {
                status: Some(status.as_u16()),
                message: format!("status {}", status),
            });
        }

        let body = resp.text().await.map_err(|e| self.upstream_error(e))?;
        parse_hiscores(&body, self.expected_lines)
    }
}
