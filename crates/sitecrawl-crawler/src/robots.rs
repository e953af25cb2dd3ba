use std::sync::Arc;

use reqwest::StatusCode;
use texting_robots::Robot;
use url::Url;

use crate::fetch::Fetch;

/// Agent whose group is applied, the wildcard one.
const ROBOTS_AGENT: &str = "*";

#[derive(Debug, thiserror::Error)]
pub enum RobotsError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("couldn't fetch {robots_url}: {reason:#}")]
    Unreachable {
        robots_url: String,
        reason: anyhow::Error,
    },
    #[error("couldn't fetch {robots_url}: HTTP {status}")]
    Unavailable {
        robots_url: String,
        status: StatusCode,
    },
    #[error("couldn't parse {robots_url}: {reason}")]
    Malformed { robots_url: String, reason: String },
    #[error("{url} is disallowed by robots.txt")]
    Disallowed { url: String },
}

/// Checks pages against the robots.txt of their host before they are fetched.
///
/// The robots file is downloaded again for every check. Any failure to obtain or read it
/// disallows the page, except a 4xx answer which means the site publishes no rules.
#[derive(Debug)]
pub struct RobotsGate<F: ?Sized> {
    fetcher: Arc<F>,
}

impl<F> RobotsGate<F>
where
    F: Fetch + ?Sized,
{
    pub fn new(fetcher: Arc<F>) -> Self {
        Self { fetcher }
    }

    /// Returns `url` back when it may be crawled.
    pub async fn check_allowed(&self, url: &str) -> Result<String, RobotsError> {
        let robots_url = robots_url(url)?;

        let fetched = self
            .fetcher
            .get(&robots_url)
            .await
            .map_err(|reason| RobotsError::Unreachable {
                robots_url: robots_url.clone(),
                reason,
            })?;

        if fetched.status.is_client_error() {
            log::debug!("No robots.txt for {url} ({}), allowing", fetched.status);
            return Ok(url.to_string());
        }
        if !fetched.status.is_success() {
            return Err(RobotsError::Unavailable {
                robots_url,
                status: fetched.status,
            });
        }

        let robot =
            Robot::new(ROBOTS_AGENT, &fetched.body).map_err(|e| RobotsError::Malformed {
                robots_url: robots_url.clone(),
                reason: e.to_string(),
            })?;

        if robot.allowed(url) {
            Ok(url.to_string())
        } else {
            Err(RobotsError::Disallowed {
                url: url.to_string(),
            })
        }
    }
}

/// `scheme://host[:port]/robots.txt` for the host serving `url`.
pub fn robots_url(url: &str) -> Result<String, RobotsError> {
    Url::parse(url)
        .and_then(|parsed| parsed.join("/robots.txt"))
        .map(String::from)
        .map_err(|source| RobotsError::InvalidUrl {
            url: url.to_string(),
            source,
        })
}
