use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitecrawl_parser::PageRecord;

/// What gets persisted for a crawled page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlContent {
    pub title: String,
    pub body: String,
    pub path: String,
    pub added_at: DateTime<Utc>,
}

impl From<PageRecord> for CrawlContent {
    fn from(page: PageRecord) -> Self {
        Self {
            title: page.title,
            body: page.body,
            path: page.source_url,
            added_at: Utc::now(),
        }
    }
}

/// Storage for crawled content.
///
/// A page counts as saved only once `add_content` returns `Ok`, the crawler never retries.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn connect(&mut self, credential: &str) -> anyhow::Result<()>;

    async fn add_content(&self, content: CrawlContent) -> anyhow::Result<()>;

    async fn close(&self) -> anyhow::Result<()>;
}
