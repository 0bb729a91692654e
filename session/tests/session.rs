//! Session state transitions against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use docchat_api::{ApiClient, ChatReply, Config, UploadDocument};
use docchat_session::{BannerKind, Invocation, Phase, Role, Session, SkipReason};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pdf() -> UploadDocument {
    UploadDocument::new("policy.pdf", b"%PDF-1.4 fake".to_vec())
}

fn upload_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "request_id": "up-1",
        "data": {"status": "success", "message": "Indexed policy.pdf", "filename": "policy.pdf"}
    }))
}

fn chat_ok(answer: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "request_id": "chat-1",
        "data": {"type": "information", "answer": answer}
    }))
}

async fn mount_upload(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/api/v1/upload"))
        .respond_with(template)
        .mount(server)
        .await;
}

fn session_for(server: &MockServer) -> Session {
    Session::new(ApiClient::new(Config::new(server.uri())))
}

#[tokio::test]
async fn test_chat_is_gated_until_upload_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat"))
        .respond_with(chat_ok("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let session = session_for(&server);
    let before = session.snapshot();

    assert!(!session.chat_enabled());
    assert_eq!(
        session.send_chat("What is covered?").await,
        Invocation::Skipped(SkipReason::ChatGated)
    );
    assert_eq!(session.snapshot(), before);

    server.verify().await;
}

#[tokio::test]
async fn test_upload_then_chat() {
    let server = MockServer::start().await;
    mount_upload(&server, upload_ok()).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat"))
        .respond_with(chat_ok("Dental is covered."))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    let mut watcher = session.subscribe();

    assert_eq!(session.upload(pdf()).await, Invocation::Succeeded);
    assert!(watcher.has_changed().unwrap());
    {
        let snapshot = watcher.borrow_and_update();
        assert_eq!(snapshot.upload.phase, Phase::Success);
        assert_eq!(snapshot.upload.last_request_id.as_deref(), Some("up-1"));
        assert_eq!(snapshot.document.as_deref(), Some("policy.pdf"));
        let banner = snapshot.banner.as_ref().unwrap();
        assert_eq!(banner.kind, BannerKind::Success);
        assert_eq!(banner.message, "Indexed policy.pdf");
    }
    assert!(session.chat_enabled());

    assert_eq!(session.send_chat("  Is dental covered?  ").await, Invocation::Succeeded);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.chat.phase, Phase::Success);
    assert_eq!(snapshot.chat.last_request_id.as_deref(), Some("chat-1"));
    assert_eq!(
        snapshot.chat.result,
        Some(ChatReply::Answer("Dental is covered.".to_string()))
    );
    assert_eq!(snapshot.banner, None);

    let transcript: Vec<(Role, &str)> = snapshot
        .transcript
        .iter()
        .map(|m| (m.role, m.text.as_str()))
        .collect();
    assert_eq!(
        transcript,
        vec![
            (Role::User, "Is dental covered?"),
            (Role::Assistant, "Dental is covered."),
        ]
    );
}

#[tokio::test]
async fn test_blank_query_is_a_no_op() {
    let server = MockServer::start().await;
    mount_upload(&server, upload_ok()).await;

    let session = session_for(&server);
    session.upload(pdf()).await;
    let before = session.snapshot();

    assert_eq!(
        session.send_chat(" \n\t ").await,
        Invocation::Skipped(SkipReason::EmptyQuery)
    );
    assert_eq!(session.snapshot(), before);
}

#[tokio::test]
async fn test_duplicate_upload_while_loading_sends_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/upload"))
        .respond_with(upload_ok().set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    let (first, second) = tokio::join!(session.upload(pdf()), session.upload(pdf()));

    assert_eq!(first, Invocation::Succeeded);
    assert_eq!(second, Invocation::Skipped(SkipReason::Busy));
    server.verify().await;
}

#[tokio::test]
async fn test_duplicate_chat_while_loading_sends_one_request() {
    let server = MockServer::start().await;
    mount_upload(&server, upload_ok()).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat"))
        .respond_with(chat_ok("once").set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.upload(pdf()).await;

    let (first, second) = tokio::join!(session.send_chat("one"), session.send_chat("two"));
    assert_eq!(first, Invocation::Succeeded);
    assert_eq!(second, Invocation::Skipped(SkipReason::Busy));
    assert_eq!(session.snapshot().transcript.len(), 2);
    server.verify().await;
}

#[tokio::test]
async fn test_late_response_after_timeout_does_not_update_state() {
    let server = MockServer::start().await;
    mount_upload(&server, upload_ok()).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat"))
        .respond_with(chat_ok("too late").set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let config = Config::new(server.uri()).with_chat_timeout(Duration::from_millis(50));
    let session = Session::new(ApiClient::new(config));
    session.upload(pdf()).await;

    match session.send_chat("slow question").await {
        Invocation::Failed(error) => assert_eq!(error.code, "TIMEOUT"),
        other => panic!("expected timeout, got {:?}", other),
    }

    // Give the delayed response time to arrive.
    tokio::time::sleep(Duration::from_millis(400)).await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.chat.phase, Phase::Error);
    assert_eq!(snapshot.chat.last_error.as_ref().unwrap().code, "TIMEOUT");
    assert_eq!(snapshot.chat.result, None);
    assert_eq!(snapshot.transcript.len(), 1);
    assert_eq!(snapshot.banner.as_ref().unwrap().code.as_deref(), Some("TIMEOUT"));
    assert!(snapshot.banner.as_ref().unwrap().retryable);
}

#[tokio::test]
async fn test_missing_config_surfaces_config_error() {
    let session = Session::new(ApiClient::new(Config::unconfigured()));

    match session.upload(pdf()).await {
        Invocation::Failed(error) => assert_eq!(error.code, "CONFIG_ERROR"),
        other => panic!("expected config error, got {:?}", other),
    }

    let snapshot = session.snapshot();
    assert_eq!(snapshot.upload.phase, Phase::Error);
    assert_eq!(snapshot.upload.last_request_id, None);
    let banner = snapshot.banner.unwrap();
    assert_eq!(banner.kind, BannerKind::Error);
    assert_eq!(banner.code.as_deref(), Some("CONFIG_ERROR"));
    assert!(!banner.retryable);
    assert!(!session.chat_enabled());
}

#[tokio::test]
async fn test_backend_rejection_keeps_chat_gated() {
    let server = MockServer::start().await;
    mount_upload(
        &server,
        ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "request_id": "up-err",
            "error": {"code": "INVALID_FILE", "message": "Only PDF files are supported"}
        })),
    )
    .await;

    let session = session_for(&server);
    match session.upload(pdf()).await {
        Invocation::Failed(error) => {
            assert_eq!(error.code, "INVALID_FILE");
            assert_eq!(error.status, Some(400));
        }
        other => panic!("expected backend error, got {:?}", other),
    }

    let snapshot = session.snapshot();
    assert_eq!(snapshot.upload.last_request_id.as_deref(), Some("up-err"));
    assert_eq!(snapshot.document, None);
    assert_eq!(
        session.send_chat("anything").await,
        Invocation::Skipped(SkipReason::ChatGated)
    );
}

#[tokio::test]
async fn test_reupload_disables_chat_while_loading() {
    let server = MockServer::start().await;
    mount_upload(&server, upload_ok().set_delay(Duration::from_millis(100))).await;

    let session = Arc::new(session_for(&server));
    session.upload(pdf()).await;
    assert!(session.chat_enabled());

    let background = Arc::clone(&session);
    let handle = tokio::spawn(async move { background.upload(pdf()).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(session.snapshot().upload.phase, Phase::Loading);
    assert_eq!(
        session.send_chat("during upload").await,
        Invocation::Skipped(SkipReason::ChatGated)
    );

    assert_eq!(handle.await.unwrap(), Invocation::Succeeded);
    assert!(session.chat_enabled());
}

#[tokio::test]
async fn test_cancelled_upload_result_is_discarded() {
    let server = MockServer::start().await;
    mount_upload(&server, upload_ok().set_delay(Duration::from_millis(200))).await;

    let session = Arc::new(session_for(&server));
    let background = Arc::clone(&session);
    let handle = tokio::spawn(async move { background.upload(pdf()).await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(session.snapshot().upload.phase, Phase::Loading);

    session.cancel_all();
    let snapshot = session.snapshot();
    assert_eq!(snapshot.upload.phase, Phase::Idle);
    assert_eq!(snapshot.banner, None);

    assert_eq!(handle.await.unwrap(), Invocation::Discarded);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.upload.phase, Phase::Idle);
    assert_eq!(snapshot.document, None);
}

#[tokio::test]
async fn test_abandoned_upload_releases_loading_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/upload"))
        .respond_with(upload_ok().set_delay(Duration::from_millis(200)))
        .expect(2)
        .mount(&server)
        .await;

    let session = session_for(&server);
    let mut watcher = session.subscribe();

    let abandoned = tokio::time::timeout(Duration::from_millis(30), session.upload(pdf())).await;
    assert!(abandoned.is_err());
    assert!(watcher.has_changed().unwrap());
    {
        let snapshot = watcher.borrow_and_update();
        assert_eq!(snapshot.upload.phase, Phase::Idle);
        assert_eq!(snapshot.banner, None);
    }

    assert_eq!(session.upload(pdf()).await, Invocation::Succeeded);
    assert_eq!(session.snapshot().upload.phase, Phase::Success);
    server.verify().await;
}

#[tokio::test]
async fn test_abandoned_chat_releases_loading_state() {
    let server = MockServer::start().await;
    mount_upload(&server, upload_ok()).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat"))
        .respond_with(chat_ok("eventually").set_delay(Duration::from_millis(200)))
        .expect(2)
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.upload(pdf()).await;

    tokio::select! {
        _ = session.send_chat("first") => panic!("chat should still be in flight"),
        _ = tokio::time::sleep(Duration::from_millis(30)) => {}
    }
    let snapshot = session.snapshot();
    assert_eq!(snapshot.chat.phase, Phase::Idle);
    assert_eq!(snapshot.banner, None);

    assert_eq!(session.send_chat("second").await, Invocation::Succeeded);
    let texts: Vec<String> = session
        .snapshot()
        .transcript
        .iter()
        .map(|m| m.text.clone())
        .collect();
    assert_eq!(texts, vec!["first", "second", "eventually"]);
    server.verify().await;
}
