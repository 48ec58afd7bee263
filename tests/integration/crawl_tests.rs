//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the submissions site and run
//! the full harvest cycle end-to-end over HTTP.

use std::io::Write;
use std::path::Path;
use submission_harvester::config::{
    load_config, Config, HarvesterConfig, OutputConfig, SessionConfig, SortDirection, SortOption,
    SourceConfig,
};
use submission_harvester::crawler::Coordinator;
use submission_harvester::linker::link_supplementary;
use submission_harvester::storage::{RecordStore, SqliteStorage};
use submission_harvester::{HarvestError, PageTracker};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING_PATH: &str = "/en/pb/sc/evidence-submissions/";

/// A listing row: identifier, submitter label, date text
type Entry<'a> = (&'a str, &'a str, &'a str);

/// Creates a test configuration pointed at the mock server
fn create_test_config(base_url: &str, dir: &Path, page_size: usize) -> Config {
    Config {
        harvester: HarvesterConfig {
            concurrency: 2,
            page_size,
            settle_delay_ms: 1,
            failure_cooldown_secs: 0,
        },
        source: SourceConfig {
            base_url: base_url.to_string(),
            keyword: "Test Bill".to_string(),
            sort: SortOption::PublicationDate,
            direction: SortDirection::Ascending,
        },
        session: SessionConfig::default(),
        output: OutputConfig {
            database_path: dir.join("db.sqlite"),
            document_dir: dir.join("pdf"),
            backup_dir: None,
        },
    }
}

fn slug(label: &str) -> String {
    label.to_lowercase().replace(' ', "-")
}

fn listing_html(entries: &[Entry<'_>], total_pages: u32) -> String {
    let rows: String = entries
        .iter()
        .map(|(id, label, date)| {
            format!(
                r#"<tr><td><div class="list__cell-body"><a href="/en/pb/sc/submissions-and-advice/document/{id}/{slug}" title="{label}">{label}</a></div></td><td>Justice Committee</td><td>{date}</td></tr>"#,
                id = id,
                slug = slug(label),
                label = label,
                date = date
            )
        })
        .collect();

    format!(
        r#"<html><body><table class="table--list"><tbody>{}</tbody></table><div class="pagination__item--mobile">Page 1 of {}</div></body></html>"#,
        rows, total_pages
    )
}

fn detail_html(external_id: &str) -> String {
    format!(
        r#"<html><body><h1 class="beta">Test Bill - Submitter</h1><span class="related-links__legacy-link"><a href="/resource/en-NZ/{id}/hash-{id}">PDF</a></span></body></html>"#,
        id = external_id
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

async fn mount_listing(server: &MockServer, page: u32, entries: &[Entry<'_>], total_pages: u32) {
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("Criteria.PageNumber", page.to_string()))
        .respond_with(html(listing_html(entries, total_pages)))
        .mount(server)
        .await;
}

/// Mounts the detail page and document of every entry
async fn mount_documents(server: &MockServer, entries: &[Entry<'_>]) {
    for (id, label, _) in entries {
        Mock::given(method("GET"))
            .and(path(format!(
                "/en/pb/sc/submissions-and-advice/document/{}/{}",
                id,
                slug(label)
            )))
            .respond_with(html(detail_html(id)))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/resource/en-NZ/{}/hash-{}", id, id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(format!("%PDF-1.4 {}", id).into_bytes(), "application/pdf"),
            )
            .mount(server)
            .await;
    }
}

async fn mount_page(server: &MockServer, page: u32, entries: &[Entry<'_>], total_pages: u32) {
    mount_listing(server, page, entries, total_pages).await;
    mount_documents(server, entries).await;
}

fn open_db(config: &Config) -> SqliteStorage {
    SqliteStorage::new(&config.output.database_path).expect("Failed to open database")
}

#[tokio::test]
async fn test_full_harvest_downloads_every_document() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), 2);

    mount_page(
        &mock_server,
        1,
        &[("PAR_1", "Ann Smith", "1 May 2024"), ("PAR_2", "Bob Jones", "1 May 2024")],
        2,
    )
    .await;
    mount_page(
        &mock_server,
        2,
        &[("PAR_3", "Cat Brown", "2 May 2024"), ("PAR_4", "Dan Green", "3 May 2024")],
        2,
    )
    .await;

    let report = Coordinator::new(&config)
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Harvest failed");

    assert_eq!(report.total_pages, 2);
    assert_eq!(report.pages_scraped, 2);
    assert_eq!(report.records_discovered, 4);
    assert_eq!(report.documents_acquired, 4);
    assert_eq!(report.remaining_backlog, 0);

    let storage = open_db(&config);
    assert_eq!(storage.count_records().unwrap(), 4);
    assert_eq!(storage.count_downloaded().unwrap(), 4);
    assert_eq!(storage.count_scraped_pages().unwrap(), 2);
    assert_eq!(storage.get_hash("PAR_3").unwrap().as_deref(), Some("hash-PAR_3"));

    let document = std::fs::read(config.output.document_dir.join("PAR_4.pdf")).unwrap();
    assert_eq!(document, b"%PDF-1.4 PAR_4");
}

#[tokio::test]
async fn test_second_run_skips_completed_work() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), 1);

    mount_page(&mock_server, 1, &[("PAR_1", "Ann Smith", "1 May 2024")], 1).await;

    let first = Coordinator::new(&config).unwrap().run().await.unwrap();
    assert_eq!(first.documents_acquired, 1);

    let second = Coordinator::new(&config).unwrap().run().await.unwrap();
    assert_eq!(second.backlog, 0);
    assert_eq!(second.workers, 0);
    assert_eq!(second.documents_acquired, 0);

    // One document request across both runs
    let downloads = mock_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().starts_with("/resource/"))
        .count();
    assert_eq!(downloads, 1);
}

#[tokio::test]
async fn test_partial_tail_page_is_revisited() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), 2);

    let full = [("PAR_1", "Ann Smith", "1 May 2024"), ("PAR_2", "Bob Jones", "1 May 2024")];
    mount_page(&mock_server, 1, &full, 2).await;
    mount_page(&mock_server, 2, &[("PAR_3", "Cat Brown", "2 May 2024")], 2).await;

    let report = Coordinator::new(&config).unwrap().run().await.unwrap();
    assert_eq!(report.pages_scraped, 1);
    assert_eq!(report.partial_pages, 1);
    assert_eq!(report.remaining_backlog, 1);
    assert!(!open_db(&config).get_page(2).unwrap().unwrap().scraped);

    // A new submission fills the tail page
    mock_server.reset().await;
    let tail = [("PAR_3", "Cat Brown", "2 May 2024"), ("PAR_5", "Eve White", "4 May 2024")];
    mount_page(&mock_server, 1, &full, 2).await;
    mount_page(&mock_server, 2, &tail, 2).await;

    let report = Coordinator::new(&config).unwrap().run().await.unwrap();
    assert_eq!(report.backlog, 1);
    assert_eq!(report.records_discovered, 1);
    assert_eq!(report.documents_acquired, 1);
    assert_eq!(report.remaining_backlog, 0);

    let storage = open_db(&config);
    assert_eq!(storage.count_downloaded().unwrap(), 4);
    assert!(storage.get_page(2).unwrap().unwrap().scraped);
}

#[tokio::test]
async fn test_failing_page_is_retried_until_it_succeeds() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), 1);

    // Page 2 errors once before serving its listing
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("Criteria.PageNumber", "2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, 1, &[("PAR_1", "Ann Smith", "1 May 2024")], 2).await;
    mount_page(&mock_server, 2, &[("PAR_2", "Bob Jones", "2 May 2024")], 2).await;

    let report = Coordinator::new(&config).unwrap().run().await.unwrap();

    assert_eq!(report.failures, 1);
    assert_eq!(report.pages_scraped, 2);
    assert_eq!(report.remaining_backlog, 0);
    assert!(open_db(&config).is_downloaded("PAR_2").unwrap());
}

#[tokio::test]
async fn test_rejected_download_is_retried_with_the_page() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), 1);

    Mock::given(method("GET"))
        .and(path("/resource/en-NZ/PAR_1/hash-PAR_1"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, 1, &[("PAR_1", "Ann Smith", "1 May 2024")], 1).await;

    let report = Coordinator::new(&config).unwrap().run().await.unwrap();

    assert_eq!(report.failures, 1);
    assert_eq!(report.documents_acquired, 1);
    let storage = open_db(&config);
    assert!(storage.is_downloaded("PAR_1").unwrap());
    assert_eq!(storage.count_records().unwrap(), 1);
}

#[tokio::test]
async fn test_resume_pass_acquires_interrupted_records() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), 1);

    // An earlier run discovered the record but stopped before downloading it
    {
        let mut storage = open_db(&config);
        storage.create("PAR_9", "Zoe Black", None).unwrap();
        storage.set_submitter_reference("PAR_9", "zoe-black").unwrap();
    }

    mount_page(&mock_server, 1, &[("PAR_1", "Ann Smith", "1 May 2024")], 1).await;
    mount_documents(&mock_server, &[("PAR_9", "Zoe Black", "")]).await;

    let report = Coordinator::new(&config).unwrap().run().await.unwrap();

    assert_eq!(report.resumed.pending, 1);
    assert_eq!(report.resumed.acquired, 1);
    assert_eq!(report.documents_acquired, 1);
    assert!(config.output.document_dir.join("PAR_9.pdf").exists());
    assert_eq!(open_db(&config).count_downloaded().unwrap(), 2);
}

#[tokio::test]
async fn test_empty_listing_ends_the_run() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), 20);

    mount_listing(&mock_server, 1, &[], 1).await;

    let report = Coordinator::new(&config).unwrap().run().await.unwrap();

    assert_eq!(report.total_pages, 0);
    assert_eq!(open_db(&config).count_pages().unwrap(), 0);
}

#[tokio::test]
async fn test_supplementary_linked_after_harvest() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), 2);

    mount_page(
        &mock_server,
        1,
        &[("PAR_1", "Jane Doe", "5 December 2024"), ("PAR_2", "Ann Smith", "5 December 2024")],
        2,
    )
    .await;
    mount_page(&mock_server, 2, &[("PAR_3", "Jane Doe Supp 1", "6 December 2024")], 2).await;

    let coordinator = Coordinator::new(&config).unwrap();
    coordinator.run().await.unwrap();
    let links = coordinator
        .storage()
        .with(|s| link_supplementary(s))
        .unwrap();

    assert_eq!(links.links_created, 1);

    let storage = open_db(&config);
    let parent = storage.get_record_id("PAR_1").unwrap().unwrap();
    let child = storage.get_record_id("PAR_3").unwrap().unwrap();
    assert_eq!(storage.get_parent_link(child).unwrap().unwrap().parent_id, parent);
    assert_eq!(storage.list_top_level().unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_parent_surfaces_after_harvest() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), 1);

    mount_page(&mock_server, 1, &[("PAR_1", "Jane Doe Supp 2", "6 December 2024")], 1).await;

    let coordinator = Coordinator::new(&config).unwrap();
    coordinator.run().await.unwrap();
    let err = coordinator
        .storage()
        .with(|s| link_supplementary(s))
        .unwrap_err();

    assert!(matches!(err, HarvestError::ParentNotFound { .. }));
}

#[tokio::test]
async fn test_harvest_from_config_file() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[harvester]
concurrency = 1
page-size = 1
settle-delay-ms = 1
failure-cooldown-secs = 0

[source]
base-url = "{}"
keyword = "Test Bill"

[output]
database-path = "{}"
document-dir = "{}"
"#,
        mock_server.uri(),
        dir.path().join("db.sqlite").display(),
        dir.path().join("pdf").display()
    )
    .unwrap();
    file.flush().unwrap();

    mount_page(&mock_server, 1, &[("PAR_1", "Ann Smith", "1 May 2024")], 1).await;

    let config = load_config(file.path()).expect("Failed to load config");
    let report = Coordinator::new(&config).unwrap().run().await.unwrap();

    assert_eq!(report.documents_acquired, 1);
    assert!(dir.path().join("pdf").join("PAR_1.pdf").exists());

    // The listing request carries the quoted keyword and sort order
    let requests = mock_server.received_requests().await.unwrap();
    let listing = requests
        .iter()
        .find(|r| r.url.path() == LISTING_PATH)
        .expect("listing was requested");
    let query: Vec<(String, String)> = listing.url.query_pairs().into_owned().collect();
    assert!(query.contains(&("Criteria.Keyword".to_string(), "\"Test Bill\"".to_string())));
    assert!(query.contains(&("Criteria.Direction".to_string(), "Ascending".to_string())));
}
