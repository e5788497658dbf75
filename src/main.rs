use catalog_scrap::config::{Category, CrawlConfig};
use catalog_scrap::process::{assemble_category, write_document};
use catalog_scrap::request::Fetcher;
use catalog_scrap::{info_time, Result};
use chrono::Local;
use tracing::warn;

const CATEGORY: Category = Category::Major;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let start_time = Local::now();
    let config = CrawlConfig::for_category(CATEGORY);
    let fetcher = Fetcher::http(&config.fetch)?;

    let report = assemble_category(&fetcher, &config).await?;
    write_document(&config.output_path, &report.document).await?;

    for failed in &report.failures {
        warn!(url = %failed.url, name = %failed.name, error = %failed.error, "failed to fetch");
    }
    info_time!(
        start_time,
        "Wrote {} programs to {} ({} failed to fetch)",
        report.document.len(),
        config.output_path.display(),
        report.failures.len()
    );

    Ok(())
}
