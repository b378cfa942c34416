use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use harvester::{
    edgar::{ArchiveFetcher, FilingCatalogClient, PackageSource, RateLimiter},
    utils::http::build_client,
    Entity, FilingDescriptor, Ledger, Orchestrator, PackageExtractor, PipelineError,
};
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const USER_AGENT: &str = "harvest-tests@example.com";
const ACCESSION: &str = "0000320193-23-000106";

#[derive(Default)]
struct FakeEdgar {
    catalog_hits: AtomicUsize,
    package_hits: AtomicUsize,
    fail_packages: AtomicBool,
    stall_packages: AtomicBool,
    user_agents: Mutex<Vec<String>>,
}

impl FakeEdgar {
    fn saw(&self, headers: &HeaderMap) {
        let agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.user_agents.lock().unwrap().push(agent);
    }
}

fn xbrl_package() -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("aapl-20230930.xml", options).unwrap();
    writer.write_all(b"<xbrl>instance</xbrl>").unwrap();
    writer.start_file("aapl-20230930.xsd", options).unwrap();
    writer.write_all(b"<schema/>").unwrap();
    writer.finish().unwrap().into_inner()
}

async fn submissions(
    State(edgar): State<Arc<FakeEdgar>>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Response {
    edgar.saw(&headers);
    edgar.catalog_hits.fetch_add(1, Ordering::SeqCst);
    if file != "CIK0000320193.json" {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(serde_json::json!({
        "cik": "320193",
        "name": "Apple Inc.",
        "filings": {
            "recent": {
                "accessionNumber": [ACCESSION, "0000320193-23-000105"],
                "form": ["10-K", "8-K"],
                "reportDate": ["2023-09-30", "2023-11-02"]
            },
            "files": []
        }
    }))
    .into_response()
}

async fn package(
    State(edgar): State<Arc<FakeEdgar>>,
    Path((_cik, dir, file)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    edgar.saw(&headers);
    edgar.package_hits.fetch_add(1, Ordering::SeqCst);
    if edgar.stall_packages.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
    if edgar.fail_packages.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    if dir != "000032019323000106" || file != format!("{}-xbrl.zip", ACCESSION) {
        return StatusCode::NOT_FOUND.into_response();
    }
    ([(header::CONTENT_TYPE, "application/zip")], xbrl_package()).into_response()
}

async fn serve(edgar: Arc<FakeEdgar>) -> String {
    let app = Router::new()
        .route("/submissions/:file", get(submissions))
        .route("/Archives/edgar/data/:cik/:dir/:file", get(package))
        .with_state(edgar);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

struct Harness {
    edgar: Arc<FakeEdgar>,
    base: String,
    root: tempfile::TempDir,
}

impl Harness {
    async fn start() -> Self {
        let edgar = Arc::new(FakeEdgar::default());
        let base = serve(Arc::clone(&edgar)).await;
        Self {
            edgar,
            base,
            root: tempfile::tempdir().unwrap(),
        }
    }

    fn database_url(&self) -> String {
        format!("sqlite://{}", self.root.path().join("filings.db").display())
    }

    fn fetcher(&self, max_retries: u32) -> ArchiveFetcher {
        self.fetcher_with(reqwest::Client::new(), max_retries)
    }

    fn fetcher_with(&self, client: reqwest::Client, max_retries: u32) -> ArchiveFetcher {
        ArchiveFetcher::new(
            client,
            format!("{}/Archives/edgar/data", self.base),
            USER_AGENT,
        )
        .with_max_retries(max_retries)
        .with_retry_delay(Duration::from_millis(5))
    }

    fn orchestrator(
        &self,
        ledger: Ledger,
        max_retries: u32,
    ) -> Orchestrator<FilingCatalogClient, ArchiveFetcher> {
        let catalog = FilingCatalogClient::new(
            reqwest::Client::new(),
            Arc::new(RateLimiter::new(10, Duration::from_millis(20))),
            &self.base,
            USER_AGENT,
        );
        Orchestrator::new(
            catalog,
            self.fetcher(max_retries),
            PackageExtractor::new(self.root.path().join("filings")),
            ledger,
        )
    }
}

fn xyz() -> Entity {
    Entity::new("XYZ", "0000320193")
}

#[tokio::test]
async fn harvests_a_new_filing_end_to_end() {
    let harness = Harness::start().await;
    let ledger = Ledger::open(&harness.database_url()).await.unwrap();

    let summary = harness
        .orchestrator(ledger, 3)
        .run(&[xyz()])
        .await
        .unwrap();

    assert_eq!(summary.filings_fetched, 1);
    assert_eq!(summary.entities_failed, 0);
    assert_eq!(harness.edgar.package_hits.load(Ordering::SeqCst), 1);

    let document = harness
        .root
        .path()
        .join("filings/XYZ/10-k/[10-K][2023-09-30][XYZ].xbrl");
    assert_eq!(std::fs::read_to_string(&document).unwrap(), "<xbrl>instance</xbrl>");
    let leftovers: Vec<_> = std::fs::read_dir(document.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1);

    // A fresh connection only sees the record if the entity was committed.
    let reopened = Ledger::open(&harness.database_url()).await.unwrap();
    let records = reopened.records_for("0000320193").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].accession_number, ACCESSION);
    assert_eq!(records[0].form_type, "10-k");
    assert_eq!(records[0].report_date, "2023-09-30");
    assert_eq!(records[0].file_path, document.to_string_lossy());

    assert!(harness
        .edgar
        .user_agents
        .lock()
        .unwrap()
        .iter()
        .all(|agent| agent == USER_AGENT));
}

#[tokio::test]
async fn rerun_downloads_nothing() {
    let harness = Harness::start().await;
    let ledger = Ledger::open(&harness.database_url()).await.unwrap();
    harness.orchestrator(ledger.clone(), 3).run(&[xyz()]).await.unwrap();

    let second = harness.orchestrator(ledger.clone(), 3).run(&[xyz()]).await.unwrap();

    assert_eq!(second.filings_fetched, 0);
    assert_eq!(second.filings_skipped, 1);
    assert_eq!(harness.edgar.package_hits.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.count().await.unwrap(), 1);
}

#[tokio::test]
async fn permanently_failing_archive_is_tried_exactly_max_retries_times() {
    let harness = Harness::start().await;
    harness.edgar.fail_packages.store(true, Ordering::SeqCst);
    let entity = xyz();
    let filing = FilingDescriptor {
        entity_id: entity.id.clone(),
        form_type: harvester::edgar::FormType::Form10K,
        report_date: chrono::NaiveDate::from_ymd_opt(2023, 9, 30).unwrap(),
        accession_number: ACCESSION.to_string(),
    };

    let err = harness.fetcher(4).fetch(&entity, &filing).await.unwrap_err();

    assert!(matches!(err, PipelineError::FetchExhausted { attempts: 4, .. }));
    assert_eq!(harness.edgar.package_hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn stalled_archive_times_out_and_uses_the_retry_budget() {
    let harness = Harness::start().await;
    harness.edgar.stall_packages.store(true, Ordering::SeqCst);
    let entity = xyz();
    let filing = FilingDescriptor {
        entity_id: entity.id.clone(),
        form_type: harvester::edgar::FormType::Form10K,
        report_date: chrono::NaiveDate::from_ymd_opt(2023, 9, 30).unwrap(),
        accession_number: ACCESSION.to_string(),
    };
    let client = build_client(Duration::from_millis(200)).unwrap();

    let err = harness
        .fetcher_with(client, 2)
        .fetch(&entity, &filing)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::FetchExhausted { attempts: 2, .. }));
    assert_eq!(harness.edgar.package_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failing_downloads_do_not_abort_the_run() {
    let harness = Harness::start().await;
    harness.edgar.fail_packages.store(true, Ordering::SeqCst);
    let ledger = Ledger::open(&harness.database_url()).await.unwrap();

    let summary = harness
        .orchestrator(ledger.clone(), 2)
        .run(&[xyz()])
        .await
        .unwrap();

    assert_eq!(summary.filings_failed, 1);
    assert_eq!(summary.entities_failed, 0);
    assert_eq!(harness.edgar.package_hits.load(Ordering::SeqCst), 2);
    assert_eq!(ledger.count().await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_entity_is_skipped_and_the_run_continues() {
    let harness = Harness::start().await;
    let ledger = Ledger::open(&harness.database_url()).await.unwrap();

    let summary = harness
        .orchestrator(ledger.clone(), 1)
        .run(&[Entity::new("NOPE", "0000000001"), xyz()])
        .await
        .unwrap();

    assert_eq!(summary.entities_attempted, 2);
    assert_eq!(summary.entities_failed, 1);
    assert_eq!(summary.filings_fetched, 1);
    assert_eq!(harness.edgar.catalog_hits.load(Ordering::SeqCst), 2);
    assert_eq!(ledger.count().await.unwrap(), 1);
}
