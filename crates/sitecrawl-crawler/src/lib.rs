mod config;
mod crawler;
mod fetch;
mod frontier;
mod robots;
mod sink;
mod stats;
mod visited;

pub use config::CrawlerConfig;
pub use crawler::{CrawlSummary, Crawler, PageError, Termination};
pub use fetch::{Fetch, Fetched, HttpFetcher};
pub use frontier::Frontier;
pub use robots::{RobotsError, RobotsGate};
pub use sink::{CrawlContent, DocumentSink};
pub use stats::{CrawlStats, StatsSnapshot};
pub use visited::VisitedSet;

pub use anyhow;
pub use sitecrawl_parser::PageRecord;
pub use tokio_util::sync::CancellationToken;
