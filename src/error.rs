use thiserror::Error;
use tokio::sync::AcquireError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),

    #[error("Could not find program list for category '{0}'.")]
    CategoryNotFound(String),

    #[error("Failed to fetch {url} after {attempts} attempt(s): {source}")]
    Fetch {
        url: String,
        attempts: u32,
        #[source]
        source: FetchFailure,
    },
    #[error("{} program page(s) failed to fetch: {}", .0.len(), .0.join(", "))]
    BatchFetch(Vec<String>),

    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
    #[error("The request slot limiter was closed.")]
    RuntimeSlotsClosed,

    #[error("Progress bar template error: {0}")]
    ProgressTemplate(#[from] indicatif::style::TemplateError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl From<AcquireError> for Error {
    fn from(_value: AcquireError) -> Self {
        Error::RuntimeSlotsClosed
    }
}

/// Why a single request attempt failed.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
}

impl From<reqwest::Error> for FetchFailure {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            FetchFailure::Timeout
        } else if let Some(status) = value.status() {
            FetchFailure::Status(status)
        } else {
            FetchFailure::Transport(value)
        }
    }
}
