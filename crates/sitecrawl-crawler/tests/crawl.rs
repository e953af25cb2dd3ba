use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use sitecrawl_crawler::{CancellationToken, Crawler, StatsSnapshot, Termination};
use tokio::time::timeout;

mod common;

use common::{fast_config, EndlessSite, FakeWeb, MemorySink};

const HOME: &str = r#"<html><head><title>Home</title></head>
<body>Hello World<a href="/next"></a></body></html>"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_page_then_quiescence() {
    let web = Arc::new(FakeWeb::default().page("https://ex.com/", HOME));
    let sink = Arc::new(MemorySink::default());
    let crawler = Crawler::new(fast_config(), web.clone(), sink.clone()).unwrap();

    let summary = timeout(
        Duration::from_secs(10),
        crawler.run("https://ex.com/", CancellationToken::new()),
    )
    .await
    .expect("crawl should end on its own");

    assert_eq!(summary.termination, Termination::Quiescent);
    assert_eq!(
        summary.stats,
        StatsSnapshot {
            attempted: 2,
            succeeded: 1,
            failed: 1
        }
    );

    let saved = sink.saved.lock();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].title, "Home");
    assert_eq!(saved[0].body, "Hello World");
    assert_eq!(saved[0].path, "https://ex.com/");
    drop(saved);

    assert!(crawler.visited().contains("https://ex.com"));
    assert!(crawler.visited().contains("https://ex.com/next"));
    assert_eq!(crawler.visited().len(), 2);
    assert_eq!(crawler.frontier().total_enqueued(), 2);
    assert!(crawler.frontier().is_empty());
    assert_eq!(crawler.active_workers(), 0);
    assert_eq!(web.requests_to("https://ex.com/next"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cycles_are_crawled_once() {
    let web = Arc::new(
        FakeWeb::default()
            .page(
                "https://ex.com/",
                r#"<body>home <a href="/a">a</a> <a href="https://www.ex.com/b">b</a></body>"#,
            )
            .page(
                "https://ex.com/a",
                r#"<body>a <a href="/">home</a> <a href="https://www.ex.com/b/">b</a> <a href="https://other.com/">x</a></body>"#,
            )
            .page(
                "https://www.ex.com/b",
                r#"<body>b <a href="https://ex.com/a/">a</a></body>"#,
            ),
    );
    let sink = Arc::new(MemorySink::default());
    let crawler = Crawler::new(fast_config(), web.clone(), sink.clone()).unwrap();

    let summary = timeout(
        Duration::from_secs(10),
        crawler.run("https://ex.com/", CancellationToken::new()),
    )
    .await
    .unwrap();

    assert_eq!(summary.termination, Termination::Quiescent);
    assert_eq!(summary.stats.attempted, 3);
    assert_eq!(summary.stats.succeeded, 3);
    assert_eq!(
        sink.paths(),
        vec!["https://ex.com/", "https://ex.com/a", "https://www.ex.com/b"]
    );
    assert_eq!(web.requests_to("https://other.com/"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn protocol_relative_links_stay_on_site() {
    let web = Arc::new(
        FakeWeb::default()
            .page(
                "https://ex.com/",
                r#"<body><a href="//other.com/x">x</a><a href="//www.ex.com/ok">ok</a></body>"#,
            )
            .page("https://other.com/x", r#"<body><a href="/y">y</a></body>"#)
            .page("https://www.ex.com/ok", "<body>ok</body>"),
    );
    let sink = Arc::new(MemorySink::default());
    let crawler = Crawler::new(fast_config(), web.clone(), sink.clone()).unwrap();

    let summary = timeout(
        Duration::from_secs(10),
        crawler.run("https://ex.com/", CancellationToken::new()),
    )
    .await
    .unwrap();

    assert_eq!(summary.termination, Termination::Quiescent);
    assert_eq!(summary.stats.succeeded, 2);
    assert_eq!(sink.paths(), vec!["https://ex.com/", "https://www.ex.com/ok"]);
    assert_eq!(web.requests_to("https://other.com/x"), 0);
    assert_eq!(web.requests_to("https://other.com/robots.txt"), 0);
    assert!(!crawler.visited().contains("https://other.com/x"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn robots_rules_are_enforced() {
    let web = Arc::new(
        FakeWeb::default()
            .page(
                "https://ex.com/robots.txt",
                "User-agent: *\nDisallow: /private\n",
            )
            .page(
                "https://ex.com/",
                r#"<body><a href="/private/x">p</a><a href="/public">q</a></body>"#,
            )
            .page("https://ex.com/private/x", "<body>secret</body>")
            .page("https://ex.com/public", "<body>open</body>"),
    );
    let sink = Arc::new(MemorySink::default());
    let crawler = Crawler::new(fast_config(), web.clone(), sink.clone()).unwrap();

    let summary = crawler
        .run("https://ex.com/", CancellationToken::new())
        .await;

    assert_eq!(sink.paths(), vec!["https://ex.com/", "https://ex.com/public"]);
    assert_eq!(summary.stats.failed, 1);
    assert_eq!(web.requests_to("https://ex.com/private/x"), 0);
    // robots.txt is fetched again for every page
    assert_eq!(web.requests_to("https://ex.com/robots.txt"), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_robots_skips_the_site() {
    let web = Arc::new(
        FakeWeb::default()
            .status("https://ex.com/robots.txt", StatusCode::INTERNAL_SERVER_ERROR)
            .page("https://ex.com/", HOME),
    );
    let sink = Arc::new(MemorySink::default());
    let crawler = Crawler::new(fast_config(), web.clone(), sink.clone()).unwrap();

    let summary = crawler
        .run("https://ex.com/", CancellationToken::new())
        .await;

    assert_eq!(summary.stats.attempted, 1);
    assert_eq!(summary.stats.failed, 1);
    assert!(sink.paths().is_empty());
    assert_eq!(web.requests_to("https://ex.com/"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn persistence_failure_is_a_failure() {
    let web = Arc::new(
        FakeWeb::default()
            .page("https://ex.com/", HOME)
            .page("https://ex.com/next", "<body>next</body>"),
    );
    let sink = Arc::new(MemorySink::failing_on("https://ex.com/"));
    let crawler = Crawler::new(fast_config(), web.clone(), sink.clone()).unwrap();

    let summary = crawler
        .run("https://ex.com/", CancellationToken::new())
        .await;

    assert_eq!(
        summary.stats,
        StatsSnapshot {
            attempted: 1,
            succeeded: 0,
            failed: 1
        }
    );
    // links of an unsaved page are not followed
    assert_eq!(web.requests_to("https://ex.com/next"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn server_errors_are_not_retried() {
    let web = Arc::new(FakeWeb::default().status("https://ex.com/", StatusCode::BAD_GATEWAY));
    let sink = Arc::new(MemorySink::default());
    let crawler = Crawler::new(fast_config(), web.clone(), sink.clone()).unwrap();

    let summary = crawler
        .run("https://ex.com/", CancellationToken::new())
        .await;

    assert_eq!(summary.termination, Termination::Quiescent);
    assert_eq!(summary.stats.failed, 1);
    assert_eq!(web.requests_to("https://ex.com/"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn endless_site_runs_until_cancelled() {
    let site = Arc::new(EndlessSite::default());
    let sink = Arc::new(MemorySink::default());
    let crawler = Crawler::new(fast_config(), site, sink.clone()).unwrap();

    let cancel = CancellationToken::new();
    let deadline = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        deadline.cancel();
    });

    let summary = timeout(
        Duration::from_secs(10),
        crawler.run("https://ex.com/", cancel),
    )
    .await
    .expect("cancellation should end the crawl");

    assert_eq!(summary.termination, Termination::Cancelled);
    assert!(summary.stats.succeeded > 0);
    assert_eq!(
        summary.stats.attempted,
        summary.stats.succeeded + summary.stats.failed
    );
    assert_eq!(crawler.active_workers(), 0);
    assert!(!crawler.frontier().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn already_cancelled_crawl_returns_at_once() {
    let web = Arc::new(FakeWeb::default().page("https://ex.com/", HOME));
    let sink = Arc::new(MemorySink::default());
    let crawler = Crawler::new(fast_config(), web, sink).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = timeout(Duration::from_secs(5), crawler.run("https://ex.com/", cancel))
        .await
        .unwrap();

    assert_eq!(summary.termination, Termination::Cancelled);
    assert_eq!(crawler.active_workers(), 0);
}
