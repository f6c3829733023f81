//! Integration tests for the HTTP item processor using wiremock.

use std::sync::Arc;
use std::time::Duration;

use mixtape_core::{
    FailureType, HttpItemProcessor, ItemProcessor, Orchestrator, OrchestratorConfig, OutputHints,
    Phase, ProcessError, ProcessRequest, ProgressReporter, WorkItem, classify_failure,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn process(
    item: &WorkItem,
    output_root: &std::path::Path,
    cancel: CancellationToken,
) -> Result<std::path::PathBuf, ProcessError> {
    let hints = OutputHints::for_item(item);
    HttpItemProcessor::new()
        .process(
            ProcessRequest {
                item,
                output_root,
                quality: "320k",
                hints: &hints,
            },
            cancel,
            ProgressReporter::disabled(),
        )
        .await
}

// ==================== Success Tests ====================

#[tokio::test]
async fn test_download_grouped_item_writes_into_group_folder() {
    let mock_server = MockServer::start().await;
    let body = b"ID3 fake audio payload".to_vec();
    Mock::given(method("GET"))
        .and(path("/media/t1.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let item = WorkItem::new("t1", "Night Drive")
        .with_artist("Kavinsky")
        .in_group("Outrun", 3, 10)
        .with_source_url(format!("{}/media/t1.mp3", mock_server.uri()));

    let saved = process(&item, temp_dir.path(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        saved,
        temp_dir
            .path()
            .join("Outrun")
            .join("03 - Kavinsky - Night Drive.mp3")
    );
    assert_eq!(std::fs::read(&saved).unwrap(), body);
}

#[tokio::test]
async fn test_download_single_item_without_extension_uses_fallback() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let item = WorkItem::new(format!("{}/stream", mock_server.uri()), "Live Set");

    let saved = process(&item, temp_dir.path(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(saved, temp_dir.path().join("Unknown Artist - Live Set.bin"));
}

#[tokio::test]
async fn test_orchestrated_download_publishes_progress_to_completion() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.ogg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7_u8; 64 * 1024]))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(HttpItemProcessor::new()),
        OrchestratorConfig::default().with_output_root(temp_dir.path()),
    );
    let mut rx = orchestrator.subscribe();
    let item = WorkItem::new("a", "Opening")
        .with_artist("Band")
        .with_source_url(format!("{}/a.ogg", mock_server.uri()));

    let summary = orchestrator
        .run(vec![item], CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.completed, 1);
    let expected = temp_dir.path().join("Band - Opening.ogg");
    assert_eq!(summary.outputs, vec![expected.clone()]);
    assert_eq!(std::fs::metadata(&expected).unwrap().len(), 64 * 1024);

    let mut phases = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        phases.push(snapshot.phase);
    }
    assert_eq!(phases.first(), Some(&Phase::Queued));
    assert!(phases.contains(&Phase::Downloading));
    assert_eq!(phases.last(), Some(&Phase::Completed));
}

// ==================== Failure Tests ====================

#[tokio::test]
async fn test_forbidden_response_is_retryable() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/locked.mp3"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let item = WorkItem::new(format!("{}/locked.mp3", mock_server.uri()), "Locked");

    let error = process(&item, temp_dir.path(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(error, ProcessError::HttpStatus { status: 403, .. }));
    assert_eq!(classify_failure(&error), FailureType::Retryable);
    assert!(!temp_dir.path().join("Unknown Artist - Locked.mp3").exists());
}

#[tokio::test]
async fn test_not_found_response_is_http_status_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.mp3"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let item = WorkItem::new(format!("{}/missing.mp3", mock_server.uri()), "Missing");

    let error = process(&item, temp_dir.path(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(error, ProcessError::HttpStatus { status: 404, .. }));
    assert_eq!(classify_failure(&error), FailureType::Terminal);
}

#[tokio::test]
async fn test_not_found_with_forbidden_in_url_is_not_deferred() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/x403Yz/forbidden-fruit.mp3"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(HttpItemProcessor::with_client(client)),
        OrchestratorConfig::default()
            .with_output_root(temp_dir.path())
            .with_max_retries(3)
            .with_retry_backoff(Duration::from_millis(20)),
    );
    let item = WorkItem::new("x403Yz", "Forbidden Fruit")
        .with_source_url(format!("{}/v/x403Yz/forbidden-fruit.mp3", mock_server.uri()));

    let summary = orchestrator
        .run(vec![item], CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.deferred, 0);
    assert_eq!(summary.retry_attempts, 0);
    assert!(orchestrator.retry_ledger().is_empty());
}

#[tokio::test]
async fn test_forbidden_response_is_deferred_and_recovered() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.mp3"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(HttpItemProcessor::new()),
        OrchestratorConfig::default()
            .with_output_root(temp_dir.path())
            .with_retry_backoff(Duration::from_millis(20)),
    );
    let item = WorkItem::new("flaky", "Flaky")
        .with_source_url(format!("{}/flaky.mp3", mock_server.uri()));

    let summary = orchestrator
        .run(vec![item], CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.deferred, 1);
    assert_eq!(summary.recovered, 1);
    assert_eq!(summary.retry_attempts, 1);
    assert_eq!(
        std::fs::read(temp_dir.path().join("Unknown Artist - Flaky.mp3")).unwrap(),
        b"ok"
    );
}

#[tokio::test]
async fn test_invalid_source_fails_without_request() {
    let temp_dir = TempDir::new().unwrap();
    let item = WorkItem::new("dQw4w9WgXcQ", "No Source");

    let error = process(&item, temp_dir.path(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(error, ProcessError::InvalidSource { .. }));
    assert_eq!(classify_failure(&error), FailureType::Terminal);
}

// ==================== Cancellation Tests ====================

#[tokio::test]
async fn test_cancel_during_slow_response_returns_cancelled() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.mp3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"late".to_vec())
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let item = WorkItem::new(format!("{}/slow.mp3", mock_server.uri()), "Slow");
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });
    }

    let result = tokio::time::timeout(
        Duration::from_secs(3),
        process(&item, temp_dir.path(), cancel),
    )
    .await
    .expect("processor must observe cancellation");

    assert!(result.unwrap_err().is_cancelled());
    assert!(!temp_dir.path().join("Unknown Artist - Slow.mp3").exists());
}
