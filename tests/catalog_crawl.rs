use std::time::Duration;

use catalog_scrap::config::{Category, CrawlConfig, FailurePolicy, FetchConfig};
use catalog_scrap::process::{assemble_category, write_document};
use catalog_scrap::request::{Fetcher, HttpTransport};
use catalog_scrap::{Error, FetchFailure};
use httpmock::prelude::*;
use httpmock::Mock;
use tempfile::TempDir;

const INDEX_HTML: &str = r#"
<html><body>
  <div id="header"><a href="/other.php">Other catalog</a></div>
  <div class="block_content">
    <p><strong>Majors</strong></p>
    <ul class="program-list">
      <li><a href="preview_program.php?catoid=37&amp;poid=100&amp;returnto=4292">Biology</a></li>
      <li><a href="preview_program.php?catoid=37&amp;poid=200&amp;returnto=4292">Biology</a></li>
      <li><a href="preview_program.php?catoid=37&amp;poid=300&amp;returnto=4292">Chemistry</a></li>
    </ul>
    <p><strong>Minors</strong></p>
    <ul class="program-list">
      <li><a href="preview_program.php?catoid=37&amp;poid=900">Dance</a></li>
    </ul>
  </div>
</body></html>"#;

fn program_html(title: &str) -> String {
    format!(
        r##"<html><body>
          <table><tr><td class="block_content">
            <h1 id="acalog-content">{title}</h1>
            <p>Welcome to {title}.</p>
            <h2>Requirements</h2>
            <h3>Major Requirements</h3>
            <ul>
              <li class="acalog-course"><a href="#" onclick="showCourse('37', '170683', this, 'x')">BIOL 1710</a></li>
            </ul>
            <h2>Four-Year Degree Plan</h2>
            <p>Semester one</p>
          </td></tr></table>
        </body></html>"##
    )
}

fn fast_fetch() -> FetchConfig {
    FetchConfig {
        concurrency_limit: 2,
        request_delay: Duration::from_millis(1),
        request_timeout: Duration::from_secs(5),
        max_attempts: 3,
        backoff_step: Duration::from_millis(1),
        ..FetchConfig::default()
    }
}

fn crawl_config(server: &MockServer, dir: &TempDir, failure_policy: FailurePolicy) -> CrawlConfig {
    CrawlConfig {
        index_url: server.url("/content.php?catoid=37&navoid=4292"),
        category: Category::Major,
        scrape_limit: None,
        output_path: dir.path().join("majors.json"),
        failure_policy,
        fetch: fast_fetch(),
    }
}

async fn mock_index<'a>(server: &'a MockServer, html: &str) -> Mock<'a> {
    let html = html.to_string();
    server
        .mock_async(|when, then| {
            when.method(GET).path("/content.php");
            then.status(200).header("content-type", "text/html").body(html);
        })
        .await
}

async fn mock_program<'a>(server: &'a MockServer, poid: &str, status: u16, body: String) -> Mock<'a> {
    let poid = poid.to_string();
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/preview_program.php")
                .query_param("catoid", "37")
                .query_param("poid", poid);
            then.status(status).header("content-type", "text/html").body(body);
        })
        .await
}

fn http_fetcher(config: &CrawlConfig) -> Fetcher<HttpTransport> {
    Fetcher::http(&config.fetch).unwrap()
}

#[tokio::test]
async fn records_failed_programs_as_gaps() {
    let server = MockServer::start_async().await;
    let dir = TempDir::new().unwrap();
    let config = crawl_config(&server, &dir, FailurePolicy::RecordGaps);

    let index = mock_index(&server, INDEX_HTML).await;
    let first = mock_program(&server, "100", 200, program_html("Biology BS")).await;
    let second = mock_program(&server, "200", 200, program_html("Biology BA")).await;
    let broken = mock_program(&server, "300", 500, String::new()).await;
    let minor = mock_program(&server, "900", 200, program_html("Dance")).await;

    let report = assemble_category(&http_fetcher(&config), &config).await.unwrap();

    index.assert_hits_async(1).await;
    first.assert_hits_async(1).await;
    second.assert_hits_async(1).await;
    broken.assert_hits_async(3).await;
    minor.assert_hits_async(0).await;

    let doc = &report.document;
    assert_eq!(doc.keys().collect::<Vec<_>>(), ["Biology", "Biology (200)"]);
    assert!(doc.get("Biology").unwrap().url.ends_with("preview_program.php?catoid=37&poid=100"));

    assert_eq!(report.failures.len(), 1);
    let failed = &report.failures[0];
    assert_eq!(failed.name, "Chemistry");
    assert!(failed.url.ends_with("poid=300"));
    assert!(matches!(
        failed.error,
        Error::Fetch { attempts: 3, source: FetchFailure::Status(status), .. } if status.as_u16() == 500
    ));

    let sections = &doc.get("Biology").unwrap().sections;
    let titles: Vec<_> = sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, ["Overview", "Requirements"]);
    assert_eq!(sections[0].paragraphs, ["Welcome to Biology BS."]);
    let course = &sections[1].subsections[0].lists[0][0];
    assert_eq!(course.text, "BIOL 1710");
    assert_eq!(
        course.href.as_deref(),
        Some("https://catalog.unt.edu/preview_course_nopop.php?catoid=37&coid=170683")
    );

    write_document(&config.output_path, doc).await.unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&config.output_path).unwrap()).unwrap();
    assert_eq!(written.as_object().unwrap().len(), 2);
    assert_eq!(written["Biology (200)"]["sections"][1]["subsections"][0]["level"], 3);
}

#[tokio::test]
async fn abort_policy_fails_the_run() {
    let server = MockServer::start_async().await;
    let dir = TempDir::new().unwrap();
    let config = crawl_config(&server, &dir, FailurePolicy::Abort);

    mock_index(&server, INDEX_HTML).await;
    mock_program(&server, "100", 200, program_html("Biology BS")).await;
    mock_program(&server, "200", 200, program_html("Biology BA")).await;
    mock_program(&server, "300", 503, String::new()).await;

    let err = assemble_category(&http_fetcher(&config), &config).await.unwrap_err();

    match err {
        Error::BatchFetch(failed) => {
            assert_eq!(failed.len(), 1);
            assert!(failed[0].ends_with("poid=300"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_category_stops_before_program_requests() {
    let server = MockServer::start_async().await;
    let dir = TempDir::new().unwrap();
    let mut config = crawl_config(&server, &dir, FailurePolicy::RecordGaps);
    config.category = Category::Certificate;

    let index = mock_index(&server, INDEX_HTML).await;
    let program = mock_program(&server, "100", 200, program_html("Biology BS")).await;

    let err = assemble_category(&http_fetcher(&config), &config).await.unwrap_err();

    assert!(matches!(err, Error::CategoryNotFound(label) if label == "Certificate"));
    index.assert_hits_async(1).await;
    program.assert_hits_async(0).await;
}

#[tokio::test]
async fn index_failure_aborts_the_run() {
    let server = MockServer::start_async().await;
    let dir = TempDir::new().unwrap();
    let config = crawl_config(&server, &dir, FailurePolicy::RecordGaps);

    let index = server
        .mock_async(|when, then| {
            when.method(GET).path("/content.php");
            then.status(404);
        })
        .await;

    let err = assemble_category(&http_fetcher(&config), &config).await.unwrap_err();

    assert!(matches!(err, Error::Fetch { attempts: 3, .. }));
    index.assert_hits_async(3).await;
}

#[tokio::test]
async fn scrape_limit_keeps_a_prefix_of_programs() {
    let server = MockServer::start_async().await;
    let dir = TempDir::new().unwrap();
    let mut config = crawl_config(&server, &dir, FailurePolicy::RecordGaps);
    config.scrape_limit = Some(1);

    mock_index(&server, INDEX_HTML).await;
    let first = mock_program(&server, "100", 200, program_html("Biology BS")).await;
    let second = mock_program(&server, "200", 200, program_html("Biology BA")).await;

    let report = assemble_category(&http_fetcher(&config), &config).await.unwrap();

    first.assert_hits_async(1).await;
    second.assert_hits_async(0).await;
    assert_eq!(report.document.keys().collect::<Vec<_>>(), ["Biology"]);
    assert!(report.failures.is_empty());
}

fn single_attempt(request_timeout: Duration) -> FetchConfig {
    FetchConfig {
        max_attempts: 1,
        request_timeout,
        ..fast_fetch()
    }
}

#[tokio::test]
async fn slow_response_is_a_timeout() {
    let server = MockServer::start_async().await;
    let slow = server
        .mock_async(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_millis(500)).body("late");
        })
        .await;
    let fetcher = Fetcher::http(&single_attempt(Duration::from_millis(50))).unwrap();

    let err = fetcher.fetch_one(&server.url("/slow")).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Fetch { attempts: 1, source: FetchFailure::Timeout, .. }
    ));
    slow.assert_hits_async(1).await;
}

#[tokio::test]
async fn error_status_is_classified_as_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/gone");
            then.status(410);
        })
        .await;
    let fetcher = Fetcher::http(&single_attempt(Duration::from_secs(5))).unwrap();

    let err = fetcher.fetch_one(&server.url("/gone")).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Fetch { source: FetchFailure::Status(status), .. } if status.as_u16() == 410
    ));
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    // Bind and drop a listener to get a local port nothing listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let fetcher = Fetcher::http(&single_attempt(Duration::from_secs(5))).unwrap();

    let err = fetcher
        .fetch_one(&format!("http://127.0.0.1:{port}/"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Fetch { source: FetchFailure::Transport(_), .. }
    ));
}
