//! Integration tests for the scanner
//!
//! These tests use wiremock to stand in for the Reddit API and exercise
//! full scan runs against an in-memory or on-disk store.

use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use subreddit_scanner::client::{ApiClient, Response};
use subreddit_scanner::config::{ApiConfig, Config, Credentials, PacingConfig};
use subreddit_scanner::limiter::{RateLimiter, WindowLimits};
use subreddit_scanner::scanner::{dedupe_list, HaltReason, ItemResult, RunOutcome, Scanner};
use subreddit_scanner::state::{DeleteReason, ItemStatus};
use subreddit_scanner::storage::{SqliteStorage, Storage};
use subreddit_scanner::worklist::{self, WorkRow};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a configuration pointing at the mock server with pacing disabled
fn create_test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api = ApiConfig {
        auth_url: format!("{}/api/v1/access_token", server.uri()),
        api_base: server.uri(),
        request_timeout_secs: 10,
        ..ApiConfig::default()
    };
    config.pacing = PacingConfig {
        min_request_delay: 0.0,
        max_request_delay: 0.0,
        item_cooldown: 0.0,
        batch_pause_min: 0.0,
        batch_pause_max: 0.0,
        request_diversity: false,
        ..PacingConfig::default()
    };
    config
}

fn test_credentials() -> Credentials {
    Credentials {
        client_id: "id".to_string(),
        client_secret: "secret".to_string(),
        username: "bot".to_string(),
        password: "pw".to_string(),
    }
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

async fn mount_about(server: &MockServer, name: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/r/{}/about", name)))
        .respond_with(response)
        .mount(server)
        .await;
}

fn about(subscribers: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "kind": "t5",
        "data": {
            "subreddit_type": "public",
            "title": "Test",
            "subscribers": subscribers,
            "over18": false
        }
    }))
}

fn build_client(config: &Config) -> ApiClient {
    let limiter = Arc::new(RateLimiter::new(WindowLimits {
        per_second: 100,
        per_ten_seconds: 1000,
        per_minute: 10000,
    }));
    ApiClient::new(&config.api, &config.pacing, test_credentials(), limiter)
        .expect("Failed to build client")
}

async fn build_scanner(
    server: &MockServer,
    config: Config,
    storage: SqliteStorage,
) -> Scanner<SqliteStorage> {
    build_scanner_with_cancel(server, config, storage, CancellationToken::new()).await
}

async fn build_scanner_with_cancel(
    server: &MockServer,
    config: Config,
    storage: SqliteStorage,
    cancel: CancellationToken,
) -> Scanner<SqliteStorage> {
    mount_token(server).await;
    let client = build_client(&config);
    let mut scanner = Scanner::new(config, storage, client, cancel);
    scanner.initialize().await.expect("Failed to initialize");
    scanner
}

fn list_names(list: &std::path::Path) -> Vec<String> {
    worklist::load(list)
        .unwrap()
        .into_iter()
        .map(|row| row.name)
        .collect()
}

#[tokio::test]
async fn test_dedupe_list_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let list = dir.path().join("list.csv");
    worklist::save(
        &list,
        &[
            WorkRow::new("foo", 5000),
            WorkRow::new("bar", 1),
            WorkRow::new("Foo", 5000),
            WorkRow::new("known", 900),
        ],
    )
    .unwrap();

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    storage.upsert_pending("known").unwrap();

    let report = dedupe_list(&storage, &list, true).unwrap();

    assert_eq!(report.initial, 4);
    assert_eq!(report.internal_duplicates, 1);
    assert_eq!(report.store_duplicates, 1);
    assert_eq!(report.kept, 2);

    let rows = worklist::load(&list).unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["foo", "bar"]);
    assert_eq!(rows[0].popularity, 5000);

    // Store untouched
    assert_eq!(storage.total_count().unwrap(), 1);
}

#[tokio::test]
async fn test_forbidden_item_purged_on_third_strike() {
    let server = MockServer::start().await;
    mount_about(&server, "walled", ResponseTemplate::new(403)).await;

    let config = create_test_config(&server);
    let mut scanner = build_scanner(&server, config, SqliteStorage::new_in_memory().unwrap()).await;

    for expected in [1, 2] {
        let result = scanner.process_item("walled").await.unwrap();
        assert_eq!(result, ItemResult::Retrying(expected));
        let record = scanner.storage().get("walled").unwrap().unwrap();
        assert_eq!(record.retry_count, expected);
    }

    let result = scanner.process_item("walled").await.unwrap();
    assert_eq!(
        result,
        ItemResult::Deleted(DeleteReason::ForbiddenBudgetExhausted)
    );
    assert!(!scanner.storage().exists("walled").unwrap());
    assert_eq!(scanner.consecutive_forbidden(), 0);
}

#[tokio::test]
async fn test_not_found_item_deleted() {
    let server = MockServer::start().await;
    mount_about(&server, "vanished", ResponseTemplate::new(404)).await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    storage.upsert_pending("vanished").unwrap();
    storage.set_retry_count("vanished", 2).unwrap();

    let config = create_test_config(&server);
    let mut scanner = build_scanner(&server, config, storage).await;

    let result = scanner.process_item("vanished").await.unwrap();
    assert_eq!(result, ItemResult::Deleted(DeleteReason::NotFound));
    assert!(!scanner.storage().exists("vanished").unwrap());
}

#[tokio::test]
async fn test_refresh_repairs_inconsistent_rows_first() {
    let server = MockServer::start().await;
    mount_about(&server, "due", about(1200)).await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    storage.upsert_pending("stuck").unwrap();
    storage
        .set_processing_flags("stuck", ItemStatus::Pending, None, Some(true))
        .unwrap();
    storage.upsert_pending("due").unwrap();
    storage
        .set_processing_flags("due", ItemStatus::Active, None, Some(true))
        .unwrap();
    storage.upsert_pending("u_someone").unwrap();

    let config = create_test_config(&server);
    let mut scanner = build_scanner(&server, config, storage).await;

    let summary = scanner.run_refresh(None, false).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.stored, 1);

    // Pending rows never claim collected metadata
    let stuck = scanner.storage().get("stuck").unwrap().unwrap();
    assert_eq!(stuck.status, ItemStatus::Pending);
    assert!(!stuck.collected);

    let due = scanner.storage().get("due").unwrap().unwrap();
    assert_eq!(due.status, ItemStatus::Active);
    assert!(due.last_updated.is_some());
    assert_eq!(due.metadata.subscribers, Some(1200));

    assert!(!scanner.storage().exists("u_someone").unwrap());
}

#[tokio::test]
async fn test_rate_limited_request_waits_retry_after() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/r/slow/about"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "5"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_about(&server, "slow", about(10)).await;

    let config = create_test_config(&server);
    let mut client = build_client(&config);
    client.initialize().await.unwrap();

    let start = Instant::now();
    let response = client.send("/r/slow/about").await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(matches!(response, Response::Json(_)));
    assert_eq!(client.rate_limit_hits(), 1);
}

#[tokio::test]
async fn test_list_scan_consumes_rows() {
    let server = MockServer::start().await;
    mount_about(&server, "big", about(50_000)).await;
    mount_about(&server, "tiny", about(3)).await;
    mount_about(&server, "closed", ResponseTemplate::new(403)).await;
    mount_about(&server, "flaky", ResponseTemplate::new(400)).await;
    Mock::given(method("GET"))
        .and(path("/r/known/about"))
        .respond_with(about(1))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let list = dir.path().join("work.csv");
    worklist::save(
        &list,
        &[
            WorkRow::new("tiny", 90_000),
            WorkRow::new("big", 80_000),
            WorkRow::new("Known", 70_000),
            WorkRow::new("closed", 60_000),
            WorkRow::new("flaky", 50_000),
        ],
    )
    .unwrap();

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    storage.upsert_pending("known").unwrap();

    let config = create_test_config(&server);
    let mut scanner = build_scanner(&server, config, storage).await;

    let summary = scanner.run_list_scan(&list, None).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.stored, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.retrying, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.list_remaining, Some(2));

    let storage = scanner.storage();
    assert!(storage.exists("big").unwrap());
    assert!(!storage.exists("tiny").unwrap());
    assert!(!storage.exists("flaky").unwrap());
    assert!(!storage.exists("closed").unwrap());

    // The 403 strike travels with the list row
    let rows = worklist::load(&list).unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["closed", "flaky"]);
    assert_eq!(rows[0].retry_count, 1);
    assert_eq!(rows[1].retry_count, 0);
}

#[tokio::test]
async fn test_list_scan_purges_forbidden_item_on_third_pass() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/walled/about"))
        .respond_with(ResponseTemplate::new(403))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let list = dir.path().join("work.csv");
    worklist::save(&list, &[WorkRow::new("walled", 10_000)]).unwrap();

    let config = create_test_config(&server);
    let mut scanner = build_scanner(&server, config, SqliteStorage::new_in_memory().unwrap()).await;

    for strike in [1, 2] {
        let summary = scanner.run_list_scan(&list, None).await.unwrap();
        assert_eq!(summary.retrying, 1);
        assert_eq!(summary.duplicates, 0);

        let rows = worklist::load(&list).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].retry_count, strike);
        assert!(!scanner.storage().exists("walled").unwrap());
    }

    let summary = scanner.run_list_scan(&list, None).await.unwrap();
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.list_remaining, Some(0));
    assert!(!scanner.storage().exists("walled").unwrap());
    assert!(list_names(&list).is_empty());
}

#[tokio::test]
async fn test_list_scan_halt_keeps_unconsumed_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/first/about"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .expect(1)
        .mount(&server)
        .await;
    for name in ["second", "third"] {
        Mock::given(method("GET"))
            .and(path(format!("/r/{}/about", name)))
            .respond_with(about(5_000))
            .expect(0)
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let list = dir.path().join("work.csv");
    worklist::save(
        &list,
        &[
            WorkRow::new("first", 300),
            WorkRow::new("second", 200),
            WorkRow::new("third", 100),
        ],
    )
    .unwrap();

    let mut config = create_test_config(&server);
    config.safety.max_total_rate_limited = 1;
    let mut scanner = build_scanner(&server, config, SqliteStorage::new_in_memory().unwrap()).await;

    let summary = scanner.run_list_scan(&list, None).await.unwrap();

    assert_eq!(
        summary.outcome,
        RunOutcome::Halted(HaltReason::RateLimited(1))
    );
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(scanner.client().rate_limit_hits(), 1);
    assert_eq!(list_names(&list), vec!["first", "second", "third"]);
    assert_eq!(scanner.storage().total_count().unwrap(), 0);
}

#[tokio::test]
async fn test_interrupted_list_scan_keeps_every_row() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/one/about"))
        .respond_with(about(5_000))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let list = dir.path().join("work.csv");
    worklist::save(&list, &[WorkRow::new("one", 2), WorkRow::new("two", 1)]).unwrap();

    let cancel = CancellationToken::new();
    let config = create_test_config(&server);
    let mut scanner = build_scanner_with_cancel(
        &server,
        config,
        SqliteStorage::new_in_memory().unwrap(),
        cancel.clone(),
    )
    .await;

    cancel.cancel();
    let summary = scanner.run_list_scan(&list, None).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Interrupted);
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.list_remaining, Some(2));
    assert_eq!(list_names(&list), vec!["one", "two"]);
}

#[tokio::test]
async fn test_list_scan_respects_limit() {
    let server = MockServer::start().await;
    mount_about(&server, "one", about(5_000)).await;

    let dir = TempDir::new().unwrap();
    let list = dir.path().join("work.csv");
    worklist::save(
        &list,
        &[WorkRow::new("one", 3), WorkRow::new("two", 2), WorkRow::new("three", 1)],
    )
    .unwrap();

    let config = create_test_config(&server);
    let mut scanner = build_scanner(&server, config, SqliteStorage::new_in_memory().unwrap()).await;

    let summary = scanner.run_list_scan(&list, Some(1)).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.list_remaining, Some(2));
    let rows = worklist::load(&list).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].name, "two");
}
