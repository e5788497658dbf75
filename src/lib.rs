//! CATALOG SCRAPER
//! Crawls a program catalog index, follows every program link of one category
//! and turns each program page into a tree of nested sections.

mod macros;
mod parse;

pub mod config;
pub mod error;
pub mod links;
pub mod normalize;
pub mod process;
pub mod request;
pub mod sections;

pub use error::{Error, FetchFailure, Result};

const INDEX_URL: &str = "https://catalog.unt.edu/content.php?catoid=37&navoid=4292";
const COURSE_URL_BASE: &str = "https://catalog.unt.edu/preview_course_nopop.php";
const TRACKING_QUERY_PARAM: &str = "returnto";
const PROGRAM_ID_PARAM: &str = "poid";
const STOP_HEADING_PREFIX: &str = "four-year degree plan";
const OUTPUT_DIR: &str = "output";

const MAX_CONCURRENT_REQUESTS: usize = 12;
const REQUEST_DELAY_MS: u64 = 200;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_STEP_MS: u64 = 500;
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Only scrape the first N majors for quicker test runs. `None` scrapes all of them.
const MAJOR_SCRAPE_LIMIT: Option<usize> = Some(10);
