use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::{
    BACKOFF_STEP_MS, INDEX_URL, MAJOR_SCRAPE_LIMIT, MAX_ATTEMPTS, MAX_CONCURRENT_REQUESTS,
    OUTPUT_DIR, REQUEST_DELAY_MS, REQUEST_TIMEOUT_SECS, USER_AGENT,
};

/// A grouping of programs on the catalog index page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Major,
    Minor,
    Certificate,
}

impl Category {
    /// Label used on the index page next to the category's program list.
    pub fn label(self) -> &'static str {
        match self {
            Category::Major => "Major",
            Category::Minor => "Minor",
            Category::Certificate => "Certificate",
        }
    }

    pub fn output_filename(self) -> &'static str {
        match self {
            Category::Major => "majors.json",
            Category::Minor => "minors.json",
            Category::Certificate => "certificates.json",
        }
    }

    /// Test-mode prefix limit for this category, if one is configured.
    pub fn scrape_limit(self) -> Option<usize> {
        match self {
            Category::Major => MAJOR_SCRAPE_LIMIT,
            Category::Minor | Category::Certificate => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What to do with the document when some program pages could not be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Leave the failed programs out of the document and report them.
    #[default]
    RecordGaps,
    /// Fail the whole category run.
    Abort,
}

/// Limits and pacing for every network request made during a run.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Total number of requests in flight at once, across all hosts.
    pub concurrency_limit: usize,
    /// Pause before every attempt, retries included.
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    /// Backoff after a failed attempt is `attempt * backoff_step`.
    pub backoff_step: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: MAX_CONCURRENT_REQUESTS,
            request_delay: Duration::from_millis(REQUEST_DELAY_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            max_attempts: MAX_ATTEMPTS,
            backoff_step: Duration::from_millis(BACKOFF_STEP_MS),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Everything needed to run one category end-to-end.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub index_url: String,
    pub category: Category,
    pub scrape_limit: Option<usize>,
    pub output_path: PathBuf,
    pub failure_policy: FailurePolicy,
    pub fetch: FetchConfig,
}

impl CrawlConfig {
    pub fn for_category(category: Category) -> Self {
        Self {
            index_url: INDEX_URL.to_string(),
            category,
            scrape_limit: category.scrape_limit(),
            output_path: PathBuf::from(OUTPUT_DIR).join(category.output_filename()),
            failure_policy: FailurePolicy::default(),
            fetch: FetchConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_config_uses_fixed_constants() {
        let config = CrawlConfig::for_category(Category::Major);
        assert_eq!(config.scrape_limit, MAJOR_SCRAPE_LIMIT);
        assert_eq!(config.output_path, PathBuf::from("output/majors.json"));
        assert_eq!(config.fetch.concurrency_limit, 12);
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.failure_policy, FailurePolicy::RecordGaps);
    }

    #[test]
    fn only_majors_are_limited() {
        assert_eq!(Category::Minor.scrape_limit(), None);
        assert_eq!(Category::Certificate.scrape_limit(), None);
        assert_eq!(Category::Certificate.output_filename(), "certificates.json");
    }
}
