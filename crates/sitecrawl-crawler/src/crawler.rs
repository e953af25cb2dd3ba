use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use sitecrawl_parser::{is_same_domain, ParseError};
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::CrawlerConfig;
use crate::fetch::Fetch;
use crate::frontier::Frontier;
use crate::robots::{RobotsError, RobotsGate};
use crate::sink::DocumentSink;
use crate::stats::{CrawlStats, StatsSnapshot};
use crate::visited::VisitedSet;

/// Why a single page was abandoned.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error(transparent)]
    Robots(#[from] RobotsError),
    #[error("fetch failed: {0:#}")]
    Fetch(anyhow::Error),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("couldn't save page: {0:#}")]
    Persist(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Nothing left to crawl and no worker busy for long enough.
    Quiescent,
    /// Stopped from outside before running out of work.
    Cancelled,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quiescent => f.write_str("no more pages to crawl"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CrawlSummary {
    pub termination: Termination,
    pub stats: StatsSnapshot,
    pub elapsed: Duration,
}

/// Breadth-first crawler of the site a seed URL belongs to.
///
/// A fixed pool of workers drains the frontier: each page goes through the robots gate, is
/// fetched, parsed and saved, and its same-site links not visited yet are queued. The crawl
/// ends once the frontier stays empty with every worker idle for `quiescence_polls`
/// consecutive polls, or as soon as the cancellation token fires.
pub struct Crawler<F: ?Sized, S: ?Sized> {
    shared: Arc<Shared<F, S>>,
}

struct Shared<F: ?Sized, S: ?Sized> {
    config: CrawlerConfig,
    frontier: Frontier,
    visited: VisitedSet,
    stats: CrawlStats,
    active: AtomicUsize,
    gate: RobotsGate<F>,
    fetcher: Arc<F>,
    sink: Arc<S>,
}

impl<F, S> Crawler<F, S>
where
    F: Fetch + ?Sized + 'static,
    S: DocumentSink + ?Sized + 'static,
{
    pub fn new(config: CrawlerConfig, fetcher: Arc<F>, sink: Arc<S>) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                frontier: Frontier::new(),
                visited: VisitedSet::new(),
                stats: CrawlStats::new(),
                active: AtomicUsize::new(0),
                gate: RobotsGate::new(fetcher.clone()),
                fetcher,
                sink,
            }),
        })
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.shared.config
    }

    pub fn frontier(&self) -> &Frontier {
        &self.shared.frontier
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.shared.visited
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn active_workers(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Crawls from `seed` until quiescence or cancellation, all workers are joined on return.
    pub async fn run(&self, seed: &str, cancel: CancellationToken) -> CrawlSummary {
        let started = Instant::now();
        let shared = &self.shared;

        shared.frontier.enqueue(seed);
        shared.visited.mark_visited(seed);
        log::info!(
            "Crawling {seed} with {} workers",
            shared.config.num_workers
        );

        let stop = cancel.child_token();
        let mut workers = JoinSet::new();
        for id in 0..shared.config.num_workers {
            workers.spawn(worker(id, shared.clone(), stop.clone()));
        }

        let termination = self.wait_until_done(&cancel).await;

        stop.cancel();
        while let Some(res) = workers.join_next().await {
            if let Err(e) = res {
                log::error!("Crawl worker failed: {e}");
            }
        }

        let summary = CrawlSummary {
            termination,
            stats: shared.stats.snapshot(),
            elapsed: started.elapsed(),
        };
        log::info!(
            "Crawl of {seed} ended ({termination}) after {:.1}s: {}",
            summary.elapsed.as_secs_f64(),
            summary.stats
        );
        summary
    }

    async fn wait_until_done(&self, cancel: &CancellationToken) -> Termination {
        let shared = &self.shared;
        let mut ticker = time::interval(shared.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut idle_polls = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Termination::Cancelled,
                _ = ticker.tick() => {
                    if shared.is_idle() {
                        idle_polls += 1;
                        if idle_polls >= shared.config.quiescence_polls {
                            return Termination::Quiescent;
                        }
                    } else {
                        idle_polls = 0;
                    }
                }
            }
        }
    }
}

async fn worker<F, S>(id: usize, shared: Arc<Shared<F, S>>, stop: CancellationToken)
where
    F: Fetch + ?Sized,
    S: DocumentSink + ?Sized,
{
    log::debug!("Worker {id} started");
    while !stop.is_cancelled() {
        let Some(url) = shared.frontier.dequeue() else {
            time::sleep(shared.config.idle_backoff()).await;
            continue;
        };

        shared.active.fetch_add(1, Ordering::SeqCst);
        shared.crawl_page(&url).await;
        shared.active.fetch_sub(1, Ordering::SeqCst);
    }
    log::debug!("Worker {id} stopped");
}

impl<F, S> Shared<F, S>
where
    F: Fetch + ?Sized,
    S: DocumentSink + ?Sized,
{
    fn is_idle(&self) -> bool {
        self.frontier.is_empty() && self.active.load(Ordering::SeqCst) == 0
    }

    async fn crawl_page(&self, url: &str) {
        match self.process_url(url).await {
            Ok(links) => {
                self.stats.record_success();
                log::debug!("Saved {url}, {} links found", links.len());
                self.follow_links(url, links);
            }
            Err(e) => {
                self.stats.record_failure();
                log::warn!("Skipping {url}: {e}");
            }
        }
    }

    async fn process_url(&self, url: &str) -> Result<Vec<String>, PageError> {
        let url = self.gate.check_allowed(url).await?;

        let fetched = self.fetcher.get(&url).await.map_err(PageError::Fetch)?;
        if !fetched.status.is_success() {
            return Err(PageError::Status(fetched.status));
        }

        let mut page = sitecrawl_parser::parse(&fetched.body, &url)?;
        let links = std::mem::take(&mut page.links);

        self.sink
            .add_content(page.into())
            .await
            .map_err(PageError::Persist)?;

        Ok(links)
    }

    /// Queues the links of `page_url` that were never visited, resolved against it.
    ///
    /// A relative link may still leave the site once resolved (`//other.com/x`), so the host
    /// is checked again on the absolute form.
    fn follow_links(&self, page_url: &str, links: Vec<String>) {
        let base = match Url::parse(page_url) {
            Ok(base) => base,
            Err(e) => {
                log::warn!("Not following links of {page_url}: {e}");
                return;
            }
        };

        for link in links {
            let link = match base.join(&link) {
                Ok(link) => String::from(link),
                Err(e) => {
                    log::debug!("Ignoring link {link} on {page_url}: {e}");
                    continue;
                }
            };
            if !is_same_domain(page_url, &link) {
                log::debug!("Ignoring off-site link {link} on {page_url}");
                continue;
            }
            if self.visited.should_visit(&link) && self.visited.mark_visited(&link) {
                self.frontier.enqueue(&link);
            }
        }
    }
}
