//! REST client for the ping-viewer recordings endpoints.
//!
//! Covers the recordings manager (`recordings_manager/...`: session
//! listing, start, stop and status per device) and the recordings file
//! server (`recordings/...`: listing, download and deletion of capture
//! files), using [`reqwest`].

use std::path::Path;

use pingview_channel::endpoint::{http_base, EndpointError};
use pingview_core::recording::{RecordingFileInfo, RecordingSession};
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

/// Header asking `recordings/list` to include every file, newest first,
/// instead of only `.mcap` captures.
const SHOW_LISTING_HEADER: &str = "show-listing";
const SHOW_LISTING_ENABLED: &str = "?1";

/// HTTP client for the recordings API of one ping-viewer server.
#[derive(Debug, Clone)]
pub struct RecordingsApi {
    client: reqwest::Client,
    base_url: Url,
}

/// Answer envelope of every `recordings_manager` endpoint.
#[derive(Debug, Deserialize)]
enum Answer {
    RecordingSession(RecordingSession),
    RecordingStatus(Option<RecordingSession>),
    AllRecordingStatus(Vec<RecordingSession>),
}

impl Answer {
    fn kind(&self) -> &'static str {
        match self {
            Self::RecordingSession(_) => "RecordingSession",
            Self::RecordingStatus(_) => "RecordingStatus",
            Self::AllRecordingStatus(_) => "AllRecordingStatus",
        }
    }
}

/// Per-device command accepted by `recordings_manager/{device}/{command}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceCommand {
    StartRecording,
    StopRecording,
    GetRecordingStatus,
}

impl DeviceCommand {
    fn as_str(self) -> &'static str {
        match self {
            Self::StartRecording => "StartRecording",
            Self::StopRecording => "StopRecording",
            Self::GetRecordingStatus => "GetRecordingStatus",
        }
    }
}

/// Errors from the recordings REST layer.
#[derive(Debug, thiserror::Error)]
pub enum RecordingsApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("Recordings API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The server answered with a different envelope than the endpoint
    /// documents.
    #[error("Unexpected answer: expected {expected}, got {actual}")]
    UnexpectedAnswer {
        expected: &'static str,
        actual: &'static str,
    },

    /// The file name would escape the recordings directory.
    #[error("Invalid recording file name: {0:?}")]
    InvalidFileName(String),

    #[error("Invalid server address: {0}")]
    InvalidAddress(#[from] EndpointError),

    #[error("Failed to write recording: {0}")]
    Io(#[from] std::io::Error),
}

impl RecordingsApi {
    /// Create a client for the server whose HTTP root is `base_url`, e.g.
    /// `http://host:6060/`.
    pub fn new(base_url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }

    /// Create a client from a server address in the same forms the
    /// channel accepts (`host:port` or `http(s)://...`).
    pub fn from_address(address: &str) -> Result<Self, RecordingsApiError> {
        Ok(Self::new(http_base(address)?))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Status of every recording session the server knows about.
    ///
    /// `GET recordings_manager/list`
    pub async fn list_sessions(&self) -> Result<Vec<RecordingSession>, RecordingsApiError> {
        let response = self
            .client
            .get(self.endpoint(&["recordings_manager", "list"]))
            .send()
            .await?;

        match Self::parse_response::<Answer>(response).await? {
            Answer::AllRecordingStatus(sessions) => Ok(sessions),
            other => Err(unexpected("AllRecordingStatus", &other)),
        }
    }

    /// Start recording `device`. Returns the new session.
    pub async fn start_recording(
        &self,
        device: Uuid,
    ) -> Result<RecordingSession, RecordingsApiError> {
        match self.device_command(device, DeviceCommand::StartRecording).await? {
            Answer::RecordingSession(session) => Ok(session),
            other => Err(unexpected("RecordingSession", &other)),
        }
    }

    /// Stop recording `device`. Returns the closed session.
    pub async fn stop_recording(
        &self,
        device: Uuid,
    ) -> Result<RecordingSession, RecordingsApiError> {
        match self.device_command(device, DeviceCommand::StopRecording).await? {
            Answer::RecordingSession(session) => Ok(session),
            other => Err(unexpected("RecordingSession", &other)),
        }
    }

    /// Current session of `device`, or `None` if it never recorded.
    pub async fn recording_status(
        &self,
        device: Uuid,
    ) -> Result<Option<RecordingSession>, RecordingsApiError> {
        match self
            .device_command(device, DeviceCommand::GetRecordingStatus)
            .await?
        {
            Answer::RecordingStatus(session) => Ok(session),
            other => Err(unexpected("RecordingStatus", &other)),
        }
    }

    /// Files in the server's recordings directory.
    ///
    /// Without `detailed` only `.mcap` captures are listed. With it the
    /// server lists every file, newest first.
    pub async fn list_files(
        &self,
        detailed: bool,
    ) -> Result<Vec<RecordingFileInfo>, RecordingsApiError> {
        let mut request = self.client.get(self.endpoint(&["recordings", "list"]));
        if detailed {
            request = request.header(SHOW_LISTING_HEADER, SHOW_LISTING_ENABLED);
        }

        let response = request.send().await?;
        Self::parse_response(response).await
    }

    /// Download a recording file into memory.
    pub async fn download_file(&self, file_name: &str) -> Result<Vec<u8>, RecordingsApiError> {
        validate_file_name(file_name)?;

        let response = self
            .client
            .get(self.endpoint(&["recordings", "download", file_name]))
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Download a recording file to `destination`. Returns the number of
    /// bytes written.
    pub async fn download_to(
        &self,
        file_name: &str,
        destination: &Path,
    ) -> Result<u64, RecordingsApiError> {
        let data = self.download_file(file_name).await?;
        tokio::fs::write(destination, &data).await?;

        tracing::info!(
            file_name,
            destination = %destination.display(),
            bytes = data.len(),
            "Recording downloaded",
        );
        Ok(data.len() as u64)
    }

    /// Delete a recording file on the server.
    pub async fn delete_file(&self, file_name: &str) -> Result<(), RecordingsApiError> {
        validate_file_name(file_name)?;

        let response = self
            .client
            .delete(self.endpoint(&["recordings", "delete", file_name]))
            .send()
            .await?;

        Self::check_status(response).await?;
        tracing::info!(file_name, "Recording deleted");
        Ok(())
    }

    // ---- private helpers ----

    async fn device_command(
        &self,
        device: Uuid,
        command: DeviceCommand,
    ) -> Result<Answer, RecordingsApiError> {
        let device = device.to_string();
        let response = self
            .client
            .post(self.endpoint(&["recordings_manager", &device, command.as_str()]))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `base_url` with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`RecordingsApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, RecordingsApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RecordingsApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RecordingsApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<(), RecordingsApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

fn unexpected(expected: &'static str, actual: &Answer) -> RecordingsApiError {
    RecordingsApiError::UnexpectedAnswer {
        expected,
        actual: actual.kind(),
    }
}

/// Reject names that are empty or could address anything outside the
/// server's recordings directory.
pub fn validate_file_name(file_name: &str) -> Result<(), RecordingsApiError> {
    let invalid = file_name.trim().is_empty()
        || file_name.contains(['/', '\\', '\0'])
        || file_name.contains("..");

    if invalid {
        return Err(RecordingsApiError::InvalidFileName(file_name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn api(base: &str) -> RecordingsApi {
        RecordingsApi::new(Url::parse(base).unwrap())
    }

    #[test]
    fn from_address_uses_http_base() {
        let api = RecordingsApi::from_address("localhost:6060").unwrap();
        assert_eq!(api.base_url().as_str(), "http://localhost:6060/");

        let api = RecordingsApi::from_address("https://example.com").unwrap();
        assert_eq!(api.base_url().as_str(), "https://example.com/");
    }

    #[test]
    fn from_address_rejects_bad_address() {
        assert_matches!(
            RecordingsApi::from_address("ftp://example.com"),
            Err(RecordingsApiError::InvalidAddress(_))
        );
    }

    #[test]
    fn endpoint_appends_segments() {
        let api = api("http://localhost:6060");
        assert_eq!(
            api.endpoint(&["recordings_manager", "list"]).as_str(),
            "http://localhost:6060/recordings_manager/list"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let api = api("http://host:6060/viewer");
        assert_eq!(api.base_url().as_str(), "http://host:6060/viewer/");
        assert_eq!(
            api.endpoint(&["recordings", "list"]).as_str(),
            "http://host:6060/viewer/recordings/list"
        );
    }

    #[test]
    fn endpoint_encodes_file_names() {
        let api = api("http://localhost:6060/");
        assert_eq!(
            api.endpoint(&["recordings", "download", "run #1?.mcap"]).as_str(),
            "http://localhost:6060/recordings/download/run%20%231%3F.mcap"
        );
    }

    #[test]
    fn device_command_paths() {
        let api = api("http://localhost:6060/");
        let device = Uuid::nil();
        let url = api.endpoint(&[
            "recordings_manager",
            &device.to_string(),
            DeviceCommand::GetRecordingStatus.as_str(),
        ]);
        assert_eq!(
            url.as_str(),
            "http://localhost:6060/recordings_manager/00000000-0000-0000-0000-000000000000/GetRecordingStatus"
        );
    }

    #[test]
    fn valid_file_names() {
        assert!(validate_file_name("device_abc_20250101_120000.mcap").is_ok());
        assert!(validate_file_name("notes.txt").is_ok());
    }

    #[test]
    fn traversal_file_names_rejected() {
        for name in ["", "  ", "../secret", "..", "a/b.mcap", "a\\b.mcap", "x\0.mcap", "a..b"] {
            assert_matches!(
                validate_file_name(name),
                Err(RecordingsApiError::InvalidFileName(_)),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn answer_decodes_externally_tagged_envelopes() {
        let answer: Answer = serde_json::from_str(
            r#"{"AllRecordingStatus":[{"device_id":"a","is_active":true,"file_path":"recordings/a.mcap","start_time":"2025-01-01T00:00:00Z","device_type":"Ping1D"}]}"#,
        )
        .unwrap();
        assert_matches!(answer, Answer::AllRecordingStatus(sessions) if sessions.len() == 1);

        let answer: Answer = serde_json::from_str(r#"{"RecordingStatus":null}"#).unwrap();
        assert_matches!(answer, Answer::RecordingStatus(None));

        let answer: Answer =
            serde_json::from_str(r#"{"RecordingSession":{"device_id":"a","is_active":false}}"#)
                .unwrap();
        assert_matches!(answer, Answer::RecordingSession(session) if !session.is_active);
    }

    #[test]
    fn unexpected_answer_names_both_kinds() {
        let err = unexpected("AllRecordingStatus", &Answer::RecordingStatus(None));
        assert_eq!(
            err.to_string(),
            "Unexpected answer: expected AllRecordingStatus, got RecordingStatus"
        );
    }
}
