use std::time::Duration;

use anyhow::ensure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Pause of a worker that found the frontier empty
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Period at which the crawl is checked for quiescence
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive idle polls required before the crawl is declared finished
    #[serde(default = "default_quiescence_polls")]
    pub quiescence_polls: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            num_workers: default_num_workers(),
            request_timeout_secs: default_request_timeout_secs(),
            idle_backoff_ms: default_idle_backoff_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            quiescence_polls: default_quiescence_polls(),
        }
    }
}

impl CrawlerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.num_workers > 0, "Invalid crawler config, `numWorkers` must be at least 1");
        ensure!(
            self.quiescence_polls > 0,
            "Invalid crawler config, `quiescencePolls` must be at least 1"
        );
        ensure!(
            self.request_timeout_secs > 0,
            "Invalid crawler config, `requestTimeoutSecs` must be positive"
        );
        ensure!(
            self.poll_interval_ms > 0,
            "Invalid crawler config, `pollIntervalMs` must be positive"
        );
        ensure!(
            !self.user_agent.trim().is_empty(),
            "Invalid crawler config, `userAgent` cannot be empty"
        );
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_user_agent() -> String {
    String::from("Mozilla/5.0 (compatible; sitecrawl/0.1)")
}

fn default_num_workers() -> usize {
    10
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_idle_backoff_ms() -> u64 {
    100
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_quiescence_polls() -> u32 {
    6
}
