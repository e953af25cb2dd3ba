#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::StatusCode;
use sitecrawl_crawler::{CrawlContent, CrawlerConfig, DocumentSink, Fetch, Fetched};

/// Settings that let a test crawl settle in milliseconds.
pub fn fast_config() -> CrawlerConfig {
    CrawlerConfig {
        num_workers: 4,
        idle_backoff_ms: 5,
        poll_interval_ms: 10,
        quiescence_polls: 3,
        ..Default::default()
    }
}

/// In-memory web: unknown URLs answer 404, including robots.txt.
#[derive(Default)]
pub struct FakeWeb {
    pages: HashMap<String, (StatusCode, String)>,
    requests: Mutex<Vec<String>>,
}

impl FakeWeb {
    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages
            .insert(url.to_string(), (StatusCode::OK, html.to_string()));
        self
    }

    pub fn status(mut self, url: &str, status: StatusCode) -> Self {
        self.pages
            .insert(url.to_string(), (status, String::new()));
        self
    }

    pub fn requests_to(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Fetch for FakeWeb {
    async fn get(&self, url: &str) -> anyhow::Result<Fetched> {
        self.requests.lock().push(url.to_string());
        let (status, body) = self
            .pages
            .get(url)
            .cloned()
            .unwrap_or((StatusCode::NOT_FOUND, String::new()));
        Ok(Fetched {
            status,
            body: Bytes::from(body),
        })
    }
}

/// Site where every page links to a page never seen before.
#[derive(Default)]
pub struct EndlessSite {
    served: AtomicUsize,
}

#[async_trait]
impl Fetch for EndlessSite {
    async fn get(&self, url: &str) -> anyhow::Result<Fetched> {
        if url.ends_with("/robots.txt") {
            return Ok(Fetched {
                status: StatusCode::NOT_FOUND,
                body: Bytes::new(),
            });
        }
        let n = self.served.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let html = format!(
            r#"<body>page {n}<a href="/p/{n}-a">a</a><a href="/p/{n}-b">b</a></body>"#
        );
        Ok(Fetched {
            status: StatusCode::OK,
            body: Bytes::from(html),
        })
    }
}

#[derive(Default)]
pub struct MemorySink {
    pub saved: Mutex<Vec<CrawlContent>>,
    failing_paths: Vec<String>,
}

impl MemorySink {
    pub fn failing_on(path: &str) -> Self {
        Self {
            failing_paths: vec![path.to_string()],
            ..Default::default()
        }
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths = self
            .saved
            .lock()
            .iter()
            .map(|c| c.path.clone())
            .collect::<Vec<_>>();
        paths.sort();
        paths
    }
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn connect(&mut self, _credential: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn add_content(&self, content: CrawlContent) -> anyhow::Result<()> {
        if self.failing_paths.contains(&content.path) {
            anyhow::bail!("duplicate key {}", content.path);
        }
        self.saved.lock().push(content);
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
