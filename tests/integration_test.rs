use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use tender_task_client::binder::{FailureAction, NoticeLevel, TaskView};
use tender_task_client::client::types::{BidProposalOptions, TenderOptions, UploadFile};
use tender_task_client::download::ArtifactKind;
use tender_task_client::{ApiClient, BidProposalGenerator, ClientConfig, PollerState, TenderGenerator};
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Duration};
use tokio_test::{assert_err, assert_ok};

/// Workflow tests against a mocked service with a short polling interval

fn fast_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.ui.status_polling_interval_ms = 50;
    config
}

fn bid_generator(server: &Server) -> BidProposalGenerator {
    let config = fast_config();
    let api = Arc::new(ApiClient::new(&server.url(), Duration::from_secs(5)).unwrap());
    BidProposalGenerator::new(api, &config)
}

fn tender_json() -> UploadFile {
    UploadFile::new(
        "tender.json",
        json!({"title": "Road works", "content": ["Scope", "Schedule"]}).to_string(),
    )
}

async fn wait_for<F>(views: &mut watch::Receiver<TaskView>, mut done: F) -> TaskView
where
    F: FnMut(&TaskView) -> bool,
{
    let view = timeout(Duration::from_secs(5), async {
        loop {
            {
                let view = views.borrow_and_update();
                if done(&*view) {
                    return view.clone();
                }
            }
            views.changed().await.expect("view channel closed");
        }
    })
    .await;
    view.expect("Timed out waiting for view")
}

#[tokio::test]
async fn test_bid_generation_runs_to_completion() {
    let mut server = Server::new_async().await;
    let upload = server
        .mock("POST", "/api/gender_book/upload_json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"task_id": "t1", "status": "pending", "message": "created"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let processing = server
        .mock("GET", "/api/gender_book/status/t1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"task_id": "t1", "status": "processing", "progress": 40, "message": "Writing"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let completed = server
        .mock("GET", "/api/gender_book/status/t1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "task_id": "t1",
                "status": "completed",
                "progress": 100,
                "result": {"word_filename": "x.docx"},
                "updated_at": "2024-05-01T10:00:00"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let artifact = server
        .mock("GET", "/api/gender_book/download/word/x.docx")
        .with_status(200)
        .with_body("docx bytes")
        .create_async()
        .await;

    let generator = bid_generator(&server);
    let mut views = generator.subscribe();

    let created = generator
        .generate(Some(tender_json()), BidProposalOptions::default())
        .await
        .expect("Failed to create task");
    assert_eq!(created.task_id, "t1");
    assert_eq!(generator.state().await, PollerState::Polling);

    let done = wait_for(&mut views, |v| matches!(v, TaskView::Completed { .. })).await;
    let downloads = match done {
        TaskView::Completed { downloads, .. } => downloads,
        other => panic!("Expected completed view, got {:?}", other),
    };
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].kind, ArtifactKind::Word);
    assert!(downloads[0].url.ends_with("/api/gender_book/download/word/x.docx"));
    assert_eq!(generator.state().await, PollerState::Completed);

    // no ticks after the terminal snapshot
    sleep(Duration::from_millis(250)).await;
    upload.assert_async().await;
    processing.assert_async().await;
    completed.assert_async().await;

    let dir = tempfile::tempdir().unwrap();
    let path = generator
        .download(downloads[0].kind, &downloads[0].filename, dir.path())
        .await
        .expect("Download failed");
    assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "docx bytes");
    artifact.assert_async().await;
}

#[tokio::test]
async fn test_server_error_detail_is_surfaced() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/gender_book/upload_json")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"detail": "disk full"}"#)
        .create_async()
        .await;

    let generator = bid_generator(&server);
    let err = assert_err!(
        generator
            .generate(Some(tender_json()), BidProposalOptions::default())
            .await
    );

    assert_eq!(err.user_message(), "disk full");
    assert_eq!(
        generator.current_view(),
        TaskView::notice(NoticeLevel::Error, "disk full")
    );
    assert_eq!(generator.state().await, PollerState::Idle);
}

#[tokio::test]
async fn test_failed_task_can_be_retried() {
    let mut server = Server::new_async().await;
    let upload = server
        .mock("POST", "/api/gender_book/upload_json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"task_id": "t1", "status": "pending"}).to_string())
        .expect(2)
        .create_async()
        .await;
    server
        .mock("GET", "/api/gender_book/status/t1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"task_id": "t1", "status": "failed", "error": "模型不可用"}).to_string())
        .create_async()
        .await;

    let generator = bid_generator(&server);
    let mut views = generator.subscribe();

    generator
        .generate(Some(tender_json()), BidProposalOptions::default())
        .await
        .unwrap();
    let failed = wait_for(&mut views, |v| matches!(v, TaskView::Failed { .. })).await;
    assert_eq!(
        failed,
        TaskView::Failed {
            task_id: "t1".to_string(),
            error: "模型不可用".to_string(),
            actions: vec![FailureAction::Retry, FailureAction::Delete],
        }
    );
    assert_eq!(generator.state().await, PollerState::Failed);

    let retried = assert_ok!(generator.retry().await);
    assert_eq!(retried.task_id, "t1");
    wait_for(&mut views, |v| matches!(v, TaskView::Failed { .. })).await;
    upload.assert_async().await;
}

#[tokio::test]
async fn test_delete_stops_polling_and_clears_view() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/gender_book/upload_json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"task_id": "t1"}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/api/gender_book/status/t1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"task_id": "t1", "status": "processing", "progress": 20}).to_string())
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/api/gender_book/tasks/t1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "message": "deleted"}"#)
        .expect(1)
        .create_async()
        .await;

    let generator = bid_generator(&server);
    let mut views = generator.subscribe();
    generator
        .generate(Some(tender_json()), BidProposalOptions::default())
        .await
        .unwrap();
    wait_for(&mut views, |v| matches!(v, TaskView::Progress { percent: 20, .. })).await;

    assert_ok!(generator.delete("t1").await);

    assert_eq!(generator.state().await, PollerState::Idle);
    assert_eq!(
        generator.current_view(),
        TaskView::notice(NoticeLevel::Success, "Task deleted")
    );

    sleep(Duration::from_millis(200)).await;
    assert_eq!(
        generator.current_view(),
        TaskView::notice(NoticeLevel::Success, "Task deleted")
    );
    delete.assert_async().await;
}

#[tokio::test]
async fn test_inline_text_offered_when_no_files() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/gender_book/upload_json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"task_id": "t7"}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/api/gender_book/status/t7")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "success": true,
                "data": {"task_id": "t7", "status": "completed", "result": {"bid_content": "Full proposal"}}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let generator = bid_generator(&server);
    let mut views = generator.subscribe();
    generator
        .generate(Some(tender_json()), BidProposalOptions::default())
        .await
        .unwrap();
    wait_for(&mut views, |v| matches!(v, TaskView::Completed { .. })).await;

    let blob = generator
        .inline_download()
        .await
        .expect("Expected inline content");
    let dir = tempfile::tempdir().unwrap();
    let path = blob.save(dir.path()).await.unwrap();
    assert!(path.ends_with("bid_proposal_t7.txt"));
    assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "Full proposal");
    assert!(blob.release().await);
}

#[tokio::test]
async fn test_tender_failure_reason_comes_from_message() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/api/tender/generate")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("quality_level".into(), "standard".into()),
            Matcher::UrlEncoded("model_provider".into(), "deepseek".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"task_id": "t9", "status": "pending", "message": "queued"}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/api/tender/status/t9")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"task_id": "t9", "status": "failed", "progress": 30, "message": "LLM quota exceeded"}).to_string())
        .create_async()
        .await;

    let config = fast_config();
    let api = Arc::new(ApiClient::from_config(&ClientConfig {
        api: tender_task_client::config::ApiSettings {
            base_url: server.url(),
            ..Default::default()
        },
        ..config.clone()
    })
    .unwrap());
    let generator = TenderGenerator::new(api, &config);
    let mut views = generator.subscribe();

    generator
        .generate(
            Some(UploadFile::new("rfp.pdf", b"%PDF-1.4".to_vec())),
            generator.default_options(),
        )
        .await
        .unwrap();

    match wait_for(&mut views, |v| matches!(v, TaskView::Failed { .. })).await {
        TaskView::Failed { task_id, error, .. } => {
            assert_eq!(task_id, "t9");
            assert_eq!(error, "LLM quota exceeded");
        }
        other => panic!("Expected failed view, got {:?}", other),
    }
    create.assert_async().await;

    // a wrong input type never reaches the server
    let err = generator
        .generate(Some(UploadFile::new("scan.png", vec![1])), TenderOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_validation());
    create.assert_async().await;
}
