use std::collections::HashSet;
use std::path::Path;

use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio::{fs, fs::File, io::AsyncWriteExt, task::JoinSet};
use tracing::{info, warn};
use url::Url;

use crate::config::{Category, CrawlConfig, FailurePolicy};
use crate::links::{extract_program_links, ProgramLink};
use crate::normalize::program_id_suffix;
use crate::parse::parse_blocking;
use crate::request::{Fetcher, Transport};
use crate::sections::{build_sections, Section};
use crate::{info_time, Error, Result};

/// One program's entry in the output document.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProgramEntry {
    pub url: String,
    pub sections: Vec<Section>,
}

/// Program entries keyed by a unique program key, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDocument {
    entries: Vec<(String, ProgramEntry)>,
    keys: HashSet<String>,
}

impl CatalogDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn get(&self, key: &str) -> Option<&ProgramEntry> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, entry)| entry)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Inserts under the unique key derived from `name`. Returns the key used.
    pub fn insert_program(&mut self, name: &str, url: &Url, sections: Vec<Section>) -> String {
        let key = unique_program_key(&self.keys, name, url);
        self.keys.insert(key.clone());
        self.entries.push((
            key.clone(),
            ProgramEntry {
                url: url.to_string(),
                sections,
            },
        ));
        key
    }
}

impl Serialize for CatalogDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

/// `name` if it's free, else `name (<program id>)`, else `name (2)`, `name (3)`, ...
pub fn unique_program_key(existing: &HashSet<String>, name: &str, url: &Url) -> String {
    if !existing.contains(name) {
        return name.to_string();
    }
    if let Some(suffix) = program_id_suffix(url) {
        let candidate = format!("{name} {suffix}");
        if !existing.contains(&candidate) {
            return candidate;
        }
    }
    let mut i = 2;
    loop {
        let candidate = format!("{name} ({i})");
        if !existing.contains(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

/// A program page that couldn't be fetched and is missing from the document.
#[derive(Debug)]
pub struct FailedProgram {
    pub name: String,
    pub url: String,
    pub error: Error,
}

/// Result of one category run.
#[derive(Debug)]
pub struct CategoryReport {
    pub category: Category,
    pub document: CatalogDocument,
    pub failures: Vec<FailedProgram>,
}

/// Scrapes one category end-to-end: index page, program links, program pages, sections.
///
/// A failed index fetch or a missing program list fails the run. What happens to
/// failed program pages is decided by `config.failure_policy`.
pub async fn assemble_category<T: Transport>(
    fetcher: &Fetcher<T>,
    config: &CrawlConfig,
) -> Result<CategoryReport> {
    let start_time = Local::now();
    let category = config.category;
    let index_url = Url::parse(&config.index_url)?;

    info!(%index_url, %category, "fetching catalog index");
    let index_html = fetcher.fetch_one(index_url.as_str()).await?;

    let mut programs = parse_blocking({
        let index_url = index_url.clone();
        move || extract_program_links(&index_html, category.label(), &index_url)
    })
    .await?;
    if let Some(limit) = config.scrape_limit {
        programs.truncate(limit);
    }
    info_time!(start_time, "Found {} {category} programs", programs.len());

    let urls: Vec<String> = programs.iter().map(|p| p.url.to_string()).collect();
    let progress = program_progress_bar(programs.len(), category)?;
    let batch = fetcher.fetch_all(&urls, &progress).await?;
    progress.finish_and_clear();

    if config.failure_policy == FailurePolicy::Abort {
        let failed = batch.failed_urls();
        if !failed.is_empty() {
            return Err(Error::BatchFetch(failed));
        }
    }

    let mut parsed: Vec<Option<Vec<Section>>> = vec![None; programs.len()];
    let mut failures = Vec::new();
    let mut parse_set = JoinSet::new();
    for (idx, (program, (_, outcome))) in programs.iter().zip(batch.into_outcomes()).enumerate() {
        match outcome {
            Ok(html) => {
                let page_url = program.url.clone();
                parse_set.spawn(async move {
                    let sections =
                        parse_blocking(move || build_sections(&html, &page_url)).await;
                    (idx, sections)
                });
            }
            Err(error) => {
                warn!(url = %program.url, name = %program.name, %error, "program page skipped");
                failures.push(FailedProgram {
                    name: program.name.clone(),
                    url: program.url.to_string(),
                    error,
                });
            }
        }
    }
    while let Some(task) = parse_set.join_next().await {
        let (idx, sections) = task?;
        parsed[idx] = Some(sections?);
    }

    let document = merge_programs(&programs, parsed);
    info_time!(
        start_time,
        "Assembled {} {category} programs ({} failed)",
        document.len(),
        failures.len()
    );

    Ok(CategoryReport {
        category,
        document,
        failures,
    })
}

/// Inserts programs in request order. Programs without parsed sections are left out.
fn merge_programs(programs: &[ProgramLink], parsed: Vec<Option<Vec<Section>>>) -> CatalogDocument {
    let mut document = CatalogDocument::new();
    for (program, sections) in programs.iter().zip(parsed) {
        if let Some(sections) = sections {
            document.insert_program(&program.name, &program.url, sections);
        }
    }
    document
}

fn program_progress_bar(len: usize, category: Category) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );
    pb.set_message(format!("Scraping {category}s"));
    Ok(pb)
}

/// Writes the document as pretty JSON, creating parent directories as needed.
pub async fn write_document(path: &Path, document: &CatalogDocument) -> Result<()> {
    let local_now = Local::now();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let bytes = serde_json::to_vec_pretty(document)?;
    let mut file = File::create(path).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;
    info_time!(local_now, "Wrote {} programs to {}", document.len(), path.display());

    Ok(())
}
