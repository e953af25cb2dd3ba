use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use sitecrawl_crawler::{
    CancellationToken, CrawlSummary, Crawler, CrawlerConfig, DocumentSink, HttpFetcher,
};
use sitecrawl_store::{CsvSink, CsvSinkConfig, FileMode};
use tokio::runtime;
use url::Url;

/// Breadth-first same-site web crawler
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[command(name = "crawl")]
    Crawl(CrawlArgs),
    #[command(name = "scrap")]
    Scrap(ScrapArgs),
    #[command(hide = true)]
    Completion,
}

/// Crawl a site from a seed page and store the content of every page
#[derive(Debug, clap::Args)]
pub struct CrawlArgs {
    /// Page the crawl starts from, only links to the same site are followed
    pub seed: String,
    /// Document store connection: a CSV file path, or `-` for stdout
    #[arg(long, env = "SITECRAWL_DB", hide_env_values = true)]
    pub store: String,
    /// Append to an existing CSV file instead of truncating it
    #[arg(long)]
    pub append: bool,
    /// Optional default crawler yaml configuration file
    #[arg(long, env = "SITECRAWL_CRAWLER_CONFIG")]
    pub crawler_config: Option<PathBuf>,
    /// Override crawler's user agent
    #[arg(long)]
    pub user_agent: Option<String>,
    /// Override crawler's number of concurrent workers
    #[arg(long)]
    pub num_workers: Option<usize>,
    /// Override crawler's request timeout, in seconds
    #[arg(long)]
    pub request_timeout: Option<u64>,
    /// Override crawler's quiescence poll interval, in milliseconds
    #[arg(long)]
    pub poll_interval: Option<u64>,
    /// Override crawler's number of idle polls before the crawl is considered done
    #[arg(long)]
    pub quiescence_polls: Option<u32>,
    /// Stop the crawl after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
    /// No SIGINT/SIGTERM handling, the crawl can only end by itself or on timeout
    #[arg(long)]
    pub no_signals: bool,
    /// When quiet no logs are outputted
    #[arg(long, short)]
    pub quiet: bool,
}

impl TryFrom<&CrawlArgs> for CrawlerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &CrawlArgs) -> Result<Self, Self::Error> {
        let mut conf = if let Some(path) = &args.crawler_config {
            let file = File::open(path)
                .with_context(|| format!("Couldn't open {}", path.display()))?;
            serde_yaml::from_reader(file)?
        } else {
            CrawlerConfig::default()
        };
        if let Some(user_agent) = &args.user_agent {
            conf.user_agent = user_agent.to_string();
        }
        if let Some(num_workers) = args.num_workers {
            conf.num_workers = num_workers;
        }
        if let Some(request_timeout) = args.request_timeout {
            conf.request_timeout_secs = request_timeout;
        }
        if let Some(poll_interval) = args.poll_interval {
            conf.poll_interval_ms = poll_interval;
        }
        if let Some(quiescence_polls) = args.quiescence_polls {
            conf.quiescence_polls = quiescence_polls;
        }
        conf.validate()?;
        Ok(conf)
    }
}

pub fn crawl(args: CrawlArgs) -> anyhow::Result<()> {
    let crawler_conf: CrawlerConfig = (&args).try_into()?;
    let sink_conf = CsvSinkConfig {
        file_mode: if args.append {
            FileMode::Append
        } else {
            FileMode::Truncate
        },
        ..Default::default()
    };
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let summary = rt.block_on(run_crawl(&args, crawler_conf, sink_conf))?;
    print_report(&summary);
    Ok(())
}

async fn run_crawl(
    args: &CrawlArgs,
    crawler_conf: CrawlerConfig,
    sink_conf: CsvSinkConfig,
) -> anyhow::Result<CrawlSummary> {
    Url::parse(&args.seed).with_context(|| format!("Invalid seed URL {}", args.seed))?;

    let mut sink = CsvSink::new(sink_conf);
    sink.connect(&args.store)
        .await
        .context("Couldn't connect to the document store")?;
    let sink = Arc::new(sink);

    let fetcher = Arc::new(HttpFetcher::new(&crawler_conf)?);
    let crawler = Crawler::new(crawler_conf, fetcher, sink.clone())?;

    let cancel = CancellationToken::new();
    if !args.no_signals {
        tokio::spawn(cancel_on_signal(cancel.clone()));
    }
    if let Some(secs) = args.timeout {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            log::info!("Crawl timeout of {secs}s reached");
            cancel.cancel();
        });
    }

    println!("Starting crawler on {}", args.seed);
    let summary = crawler.run(&args.seed, cancel).await;

    if let Err(e) = sink.close().await {
        log::error!("Couldn't close the document store: {e:#}");
    }
    Ok(summary)
}

async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::warn!("Couldn't listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                log::warn!("Couldn't listen for SIGINT: {e}");
                return;
            }
        }
        _ = terminate => {}
    }
    println!("\nShutting down crawler...");
    cancel.cancel();
}

fn print_report(summary: &CrawlSummary) {
    let stats = &summary.stats;
    println!(
        "Crawler finished in {:.2?} ({})",
        summary.elapsed, summary.termination
    );
    println!("Pages crawled: {}", stats.attempted);
    println!("Succeeded: {}", stats.succeeded);
    println!("Failed: {}", stats.failed);
    println!(
        "Average: {:.3}s/page",
        stats.average_secs_per_page(summary.elapsed)
    );
}

/// Extract a single page and print it as JSON
#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("page").required(true))]
pub struct ScrapArgs {
    /// A local html page to extract
    #[arg(group = "page", long)]
    pub file: Option<PathBuf>,
    /// A distant html page to extract
    #[arg(group = "page", long)]
    pub url: Option<String>,
    /// Address a local page is considered served from, for link filtering
    #[arg(long, conflicts_with = "url", default_value = "http://localhost/")]
    pub base_url: String,
    /// Custom user agent to download the page
    #[arg(long, conflicts_with = "file")]
    pub ua: Option<String>,
}

pub fn scrap(args: ScrapArgs) -> anyhow::Result<()> {
    let page = if let Some(url) = args.url {
        let defaults = CrawlerConfig::default();
        let client = reqwest::blocking::ClientBuilder::new()
            .user_agent(args.ua.unwrap_or(defaults.user_agent.clone()))
            .timeout(defaults.request_timeout())
            .build()?;
        let resp = client.get(&url).send()?.error_for_status()?;
        sitecrawl_parser::parse_reader(resp, &url)?
    } else if let Some(path) = args.file {
        let file =
            File::open(&path).with_context(|| format!("Couldn't open {}", path.display()))?;
        sitecrawl_parser::parse_reader(BufReader::new(file), &args.base_url)?
    } else {
        anyhow::bail!("Missing `url` or `file`");
    };
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

fn init_logs(default_filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Crawl(args) => {
            if !args.quiet {
                init_logs("sitecrawl_crawler=info,sitecrawl_store=info");
            }
            crawl(args)
        }
        SubCommand::Scrap(args) => {
            init_logs("warn");
            scrap(args)
        }
        SubCommand::Completion => {
            generate(
                Shell::Bash,
                &mut Args::command(),
                "sitecrawl",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn crawl_args(extra: &[&str]) -> CrawlArgs {
        let argv = ["sitecrawl", "crawl", "https://ex.com/", "--store", "out.csv"]
            .iter()
            .chain(extra)
            .copied();
        match Args::try_parse_from(argv).unwrap().cmd {
            SubCommand::Crawl(args) => args,
            cmd => panic!("unexpected subcommand {cmd:?}"),
        }
    }

    #[test]
    fn cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let args = crawl_args(&["--num-workers", "3", "--quiescence-polls", "2", "--no-signals"]);
        let conf = CrawlerConfig::try_from(&args).unwrap();
        assert_eq!(conf.num_workers, 3);
        assert_eq!(conf.quiescence_polls, 2);
        assert!(args.no_signals);
        assert_eq!(conf.request_timeout_secs, 10);
    }

    #[test]
    fn yaml_config_is_loaded_then_overridden() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "numWorkers: 2\nuserAgent: test-agent\npollIntervalMs: 50").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = crawl_args(&["--crawler-config", &path, "--num-workers", "7"]);
        let conf = CrawlerConfig::try_from(&args).unwrap();
        assert_eq!(conf.num_workers, 7);
        assert_eq!(conf.user_agent, "test-agent");
        assert_eq!(conf.poll_interval_ms, 50);
        assert_eq!(conf.quiescence_polls, 6);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let args = crawl_args(&["--num-workers", "0"]);
        assert!(CrawlerConfig::try_from(&args).is_err());
        let args = crawl_args(&["--request-timeout", "0"]);
        assert!(CrawlerConfig::try_from(&args).is_err());
    }

    #[test]
    fn missing_store_is_an_error() {
        if std::env::var_os("SITECRAWL_DB").is_some() {
            return;
        }
        assert!(Args::try_parse_from(["sitecrawl", "crawl", "https://ex.com/"]).is_err());
    }

    #[test]
    fn scrap_requires_a_page() {
        assert!(Args::try_parse_from(["sitecrawl", "scrap"]).is_err());
        assert!(Args::try_parse_from(["sitecrawl", "scrap", "--file", "a.html", "--url", "x"]).is_err());
    }
}
