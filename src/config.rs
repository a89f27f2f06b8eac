use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

use crate::hiscores::SKILLS;

/// Tracks a group of friends' OSRS hiscores
#[derive(Parser, Debug, Clone)]
#[command(name = "osrs-friends", version, about)]
pub struct Config {
    /// HTTP listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen_addr: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "osrs-friends.db")]
    pub database_path: String,

    /// Hiscores "index_lite" endpoint
    #[arg(
        long,
        env = "HISCORES_URL",
        default_value = "https://secure.runescape.com/m=hiscore_oldschool/index_lite.ws"
    )]
    pub hiscores_url: String,

    /// Timeout for a single hiscores request, in seconds
    #[arg(long, env = "HISCORES_TIMEOUT_SECS", default_value = "10")]
    pub hiscores_timeout_secs: u64,

    /// Number of lines a valid hiscores payload must contain
    #[arg(long, env = "HISCORES_EXPECTED_LINES", default_value_t = SKILLS.len())]
    pub hiscores_expected_lines: usize,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            anyhow::bail!("listen_addr '{}' is not a socket address", self.listen_addr);
        }
        match Url::parse(&self.hiscores_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => anyhow::bail!("hiscores_url must be an absolute http(s) URL"),
        }
        if self.hiscores_timeout_secs == 0 {
            anyhow::bail!("hiscores_timeout_secs must be positive");
        }
        if self.hiscores_expected_lines == 0 {
            anyhow::bail!("hiscores_expected_lines must be positive");
        }
        Ok(())
    }

    pub fn hiscores_timeout(&self) -> Duration {
        Duration::from_secs(self.hiscores_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> Config {
        let mut argv = vec!["osrs-friends"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_validate() {
        let config = config(&[]);
        assert!(config.validate().is_ok());
        assert_eq!(config.hiscores_expected_lines, 24);
        assert_eq!(config.hiscores_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_rejects_bad_listen_addr() {
        assert!(config(&["--listen-addr", "localhost"]).validate().is_err());
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(config(&["--hiscores-url", "ftp://example.com/lite"])
            .validate()
            .is_err());
        assert!(config(&["--hiscores-url", "index_lite.ws"]).validate().is_err());
    }

    #[test]
    fn test_rejects_zero_values() {
        assert!(config(&["--hiscores-timeout-secs", "0"]).validate().is_err());
        assert!(config(&["--hiscores-expected-lines", "0"]).validate().is_err());
    }
}
