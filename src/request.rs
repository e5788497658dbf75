use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indicatif::ProgressBar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::{Error, FetchFailure, Result};

/// Issues a single GET and hands back the body text.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn get_text(&self, url: &str) -> core::result::Result<String, FetchFailure>;
}

/// `reqwest` backed transport with browser-like headers and a total timeout per request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> core::result::Result<String, FetchFailure> {
        let res = self.client.get(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status));
        }
        Ok(res.text().await?)
    }
}

/// Fetches pages under a global cap on in-flight requests, pacing every attempt
/// and retrying failures with a linearly growing backoff.
pub struct Fetcher<T: Transport> {
    transport: Arc<T>,
    slots: Arc<Semaphore>,
    request_delay: Duration,
    backoff_step: Duration,
    max_attempts: u32,
}

// Derive would require `T: Clone`.
impl<T: Transport> Clone for Fetcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            slots: Arc::clone(&self.slots),
            request_delay: self.request_delay,
            backoff_step: self.backoff_step,
            max_attempts: self.max_attempts,
        }
    }
}

impl Fetcher<HttpTransport> {
    pub fn http(config: &FetchConfig) -> Result<Self> {
        Ok(Self::new(HttpTransport::new(config)?, config))
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, config: &FetchConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            slots: Arc::new(Semaphore::new(config.concurrency_limit.max(1))),
            request_delay: config.request_delay,
            backoff_step: config.backoff_step,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Fetches one URL, holding a single slot for all of its attempts.
    /// After the last failed attempt the last failure is returned as `Error::Fetch`.
    pub async fn fetch_one(&self, url: &str) -> Result<String> {
        let _permit = self.slots.acquire().await?;

        let mut attempt = 1;
        loop {
            tokio::time::sleep(self.request_delay).await;
            match self.transport.get_text(url).await {
                Ok(body) => {
                    debug!(url, attempt, bytes = body.len(), "fetched");
                    return Ok(body);
                }
                Err(failure) if attempt < self.max_attempts => {
                    let backoff = self.backoff_step * attempt;
                    warn!(url, attempt, error = %failure, "attempt failed, retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(failure) => {
                    return Err(Error::Fetch {
                        url: url.to_string(),
                        attempts: attempt,
                        source: failure,
                    });
                }
            }
        }
    }

    /// Spawns one task per URL and waits for all of them.
    /// A failed URL never cancels its siblings; every URL gets an outcome.
    pub async fn fetch_all(&self, urls: &[String], progress: &ProgressBar) -> Result<FetchBatch> {
        let mut task_set = JoinSet::new();
        for (idx, url) in urls.iter().enumerate() {
            task_set.spawn({
                let fetcher = self.clone();
                let url = url.clone();
                async move {
                    let outcome = fetcher.fetch_one(&url).await;
                    (idx, url, outcome)
                }
            });
        }

        let mut outcomes = Vec::with_capacity(urls.len());
        while let Some(task) = task_set.join_next().await {
            outcomes.push(task?);
            progress.inc(1);
        }
        outcomes.sort_unstable_by_key(|(idx, _, _)| *idx);

        Ok(FetchBatch {
            outcomes: outcomes
                .into_iter()
                .map(|(_, url, outcome)| (url, outcome))
                .collect(),
        })
    }
}

/// Per-URL outcomes of `Fetcher::fetch_all`, in the order the URLs were given.
#[derive(Debug)]
pub struct FetchBatch {
    outcomes: Vec<(String, Result<String>)>,
}

impl FetchBatch {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, url: &str) -> Option<&Result<String>> {
        self.outcomes
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, outcome)| outcome)
    }

    pub fn failed_urls(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_err())
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// All bodies in request order, or `Error::BatchFetch` naming every failed URL.
    pub fn into_bodies(self) -> Result<Vec<String>> {
        let failed = self.failed_urls();
        if !failed.is_empty() {
            return Err(Error::BatchFetch(failed));
        }
        self.outcomes
            .into_iter()
            .map(|(_, outcome)| outcome)
            .collect()
    }

    pub fn into_outcomes(self) -> Vec<(String, Result<String>)> {
        self.outcomes
    }
}
