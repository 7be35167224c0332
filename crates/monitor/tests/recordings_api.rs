//! `RecordingsApi` against a mock REST server.

mod common;

use assert_matches::assert_matches;
use pingview_monitor::RecordingsApiError;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{json, rest_server};

const DEVICE: &str = "6f1c2a7e-3b55-4c1e-9d2a-0b7f3e4d5c6a";

fn device() -> Uuid {
    Uuid::parse_str(DEVICE).unwrap()
}

fn device_path(command: &str) -> String {
    format!("/recordings_manager/{DEVICE}/{command}")
}

// ---------------------------------------------------------------------------
// recordings manager
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_sessions_decodes_bulk_answer() {
    let (server, api) = rest_server().await;
    Mock::given(method("GET"))
        .and(path("/recordings_manager/list"))
        .respond_with(json(
            200,
            r#"{"AllRecordingStatus":[
                {"device_id":"6f1c2a7e-3b55-4c1e-9d2a-0b7f3e4d5c6a","file_path":"recordings/a.mcap","is_active":true,"start_time":"2025-01-01T12:00:00Z","device_type":"Ping360"},
                {"device_id":"b","is_active":false}
            ]}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let sessions = api.list_sessions().await.unwrap();

    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].device_id, DEVICE);
    assert_eq!(sessions[0].file_name(), Some("a.mcap"));
    assert_eq!(sessions[0].device_type.as_deref(), Some("Ping360"));
    assert!(!sessions[1].is_active);
}

#[tokio::test]
async fn start_recording_posts_device_command() {
    let (server, api) = rest_server().await;
    Mock::given(method("POST"))
        .and(path(device_path("StartRecording")))
        .respond_with(json(
            200,
            &format!(r#"{{"RecordingSession":{{"device_id":"{DEVICE}","is_active":true,"file_path":"recordings/x.mcap"}}}}"#),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let session = api.start_recording(device()).await.unwrap();

    assert!(session.is_active);
    assert_eq!(session.device_id, DEVICE);
    assert_eq!(session.file_name(), Some("x.mcap"));
}

#[tokio::test]
async fn recording_status_may_be_absent() {
    let (server, api) = rest_server().await;
    Mock::given(method("POST"))
        .and(path(device_path("GetRecordingStatus")))
        .respond_with(json(200, r#"{"RecordingStatus":null}"#))
        .mount(&server)
        .await;

    assert_eq!(api.recording_status(device()).await.unwrap(), None);
}

#[tokio::test]
async fn mismatched_answer_is_reported() {
    let (server, api) = rest_server().await;
    Mock::given(method("POST"))
        .and(path(device_path("StopRecording")))
        .respond_with(json(200, r#"{"AllRecordingStatus":[]}"#))
        .mount(&server)
        .await;

    let err = api.stop_recording(device()).await.unwrap_err();
    assert_matches!(
        err,
        RecordingsApiError::UnexpectedAnswer {
            expected: "RecordingSession",
            actual: "AllRecordingStatus"
        }
    );
}

#[tokio::test]
async fn server_error_carries_status_and_body() {
    let (server, api) = rest_server().await;
    Mock::given(method("POST"))
        .and(path(device_path("StartRecording")))
        .respond_with(ResponseTemplate::new(500).set_body_string("device not found"))
        .mount(&server)
        .await;

    let err = api.start_recording(device()).await.unwrap_err();
    assert_matches!(
        err,
        RecordingsApiError::ApiError { status: 500, ref body } if body == "device not found"
    );
}

// ---------------------------------------------------------------------------
// recordings file server
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_files_sends_listing_header_only_when_detailed() {
    let (server, api) = rest_server().await;
    // Mounted first so detailed requests match it before the plain listing.
    Mock::given(method("GET"))
        .and(path("/recordings/list"))
        .and(header("show-listing", "?1"))
        .respond_with(json(
            200,
            r#"[{"file_name":"a.mcap","file_size":2048,"modified":"2025-01-01T12:00:00+00:00"}]"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recordings/list"))
        .respond_with(json(
            200,
            r#"[{"file_name":"a.mcap","file_size":2048,"modified":"2025-01-01T12:00:00+00:00"},
                {"file_name":"notes.txt","file_size":3,"modified":"unknown"}]"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let files = api.list_files(false).await.unwrap();
    assert_eq!(files.len(), 2);
    assert!(files[0].is_mcap());
    assert_eq!(files[1].modified, "unknown");

    let detailed = api.list_files(true).await.unwrap();
    assert_eq!(detailed.len(), 1);
    assert_eq!(detailed[0].file_size, 2048);
}

#[tokio::test]
async fn download_to_writes_file() {
    let data = b"\x89MCAP0\r\n fake capture";
    let (server, api) = rest_server().await;
    Mock::given(method("GET"))
        .and(path("/recordings/download/a.mcap"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(data.to_vec()))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("a.mcap");

    let written = api.download_to("a.mcap", &destination).await.unwrap();

    assert_eq!(written, data.len() as u64);
    assert_eq!(std::fs::read(&destination).unwrap(), data);
}

#[tokio::test]
async fn missing_file_is_an_api_error() {
    let (_server, api) = rest_server().await;

    let err = api.download_file("gone.mcap").await.unwrap_err();
    assert_matches!(err, RecordingsApiError::ApiError { status: 404, .. });
}

#[tokio::test]
async fn delete_file_uses_delete_method() {
    let (server, api) = rest_server().await;
    Mock::given(method("DELETE"))
        .and(path("/recordings/delete/a.mcap"))
        .respond_with(ResponseTemplate::new(200).set_body_string("File deleted"))
        .expect(1)
        .mount(&server)
        .await;

    api.delete_file("a.mcap").await.unwrap();
}

#[tokio::test]
async fn traversal_names_never_reach_the_server() {
    let (server, api) = rest_server().await;

    assert_matches!(
        api.delete_file("../Cargo.toml").await,
        Err(RecordingsApiError::InvalidFileName(_))
    );
    assert_matches!(
        api.download_file("sub/dir.mcap").await,
        Err(RecordingsApiError::InvalidFileName(_))
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}
