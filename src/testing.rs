//! Shared fixtures for unit and HTTP-level tests.

use crate::config::settings::AppConfig;
use crate::infrastructure::encoder::{EncodeOutput, EncoderError, Transcoder};
use crate::infrastructure::storage::artifacts::ArtifactStore;
use crate::modules::video::model::JobRecord;
use crate::modules::video::repository::{JobStore, MemoryJobStore};
use crate::state::AppState;
use crate::workers::TranscodePipeline;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Sources starting with these bytes fail the fake probe.
pub const CORRUPT_MARKER: &[u8] = b"corrupt";

pub fn test_config(root: &Path) -> AppConfig {
    AppConfig {
        server_port: 0,
        database_url: None,
        upload_dir: root.join("uploads"),
        hls_dir: root.join("hls"),
        ffmpeg_path: "ffmpeg".to_string(),
        ffprobe_path: "ffprobe".to_string(),
        hls_segment_seconds: 10,
        transcode_workers: 2,
        transcode_timeout_secs: 30,
        segment_cache_secs: 3600,
        max_upload_bytes: 16 * 1024 * 1024,
    }
}

/// In-process stand-in for ffmpeg.
///
/// Writes `segment_000.ts` first, then waits for the configured delay, then
/// writes `segment_001.ts` and the playlist. Reports 5 seconds of media.
#[derive(Default)]
pub struct FakeEncoder {
    delay: Option<Duration>,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

struct Active<'a>(&'a AtomicUsize);

impl Drop for Active<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for FakeEncoder {
    async fn transcode(&self, source_path: &Path, output_dir: &Path) -> Result<EncodeOutput, EncoderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _active = Active(&self.active);

        let body = tokio::fs::read(source_path).await?;
        if body.starts_with(CORRUPT_MARKER) {
            return Err(EncoderError::Probe("Invalid data found when processing input".to_string()));
        }

        tokio::fs::create_dir_all(output_dir).await?;
        tokio::fs::write(output_dir.join("segment_000.ts"), b"ts-0").await?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        tokio::fs::write(output_dir.join("segment_001.ts"), b"ts-1").await?;

        let manifest_path = output_dir.join("playlist.m3u8");
        tokio::fs::write(
            &manifest_path,
            "#EXTM3U\n#EXT-X-TARGETDURATION:3\n#EXTINF:2.5,\nsegment_000.ts\n#EXTINF:2.5,\nsegment_001.ts\n#EXT-X-ENDLIST\n",
        )
        .await?;

        Ok(EncodeOutput {
            manifest_path,
            duration_seconds: 5.0,
        })
    }
}

/// Full application state over a temp dir, an in-memory store and `encoder`.
pub async fn test_state(encoder: Arc<dyn Transcoder>) -> (tempfile::TempDir, AppState) {
    test_state_with(encoder, |_| {}).await
}

pub async fn test_state_with(
    encoder: Arc<dyn Transcoder>,
    configure: impl FnOnce(&mut AppConfig),
) -> (tempfile::TempDir, AppState) {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    configure(&mut config);
    let jobs: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let artifacts = ArtifactStore::new(config.upload_dir.clone(), config.hls_dir.clone());
    artifacts.ensure_roots().await.unwrap();

    let pipeline = TranscodePipeline::start(
        jobs.clone(),
        artifacts.clone(),
        encoder,
        config.transcode_workers,
        config.transcode_timeout(),
    );
    (root, AppState::new(config, jobs, artifacts, pipeline))
}

pub async fn wait_for_terminal(state: &AppState, id: Uuid) -> JobRecord {
    let poll = async {
        loop {
            if let Some(job) = state.jobs.get(id).await.unwrap() {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(10), poll)
        .await
        .expect("job did not finish in time")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::video::model::{JobStatus, NewJob};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "hls-test-boundary";

    fn multipart_body(title: Option<&str>, file: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(title) = title {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\n{title}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: video/mp4\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(title: Option<&str>, file: Option<(&str, &[u8])>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/videos")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(multipart_body(title, file)))
            .unwrap()
    }

    fn get(uri: String) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    async fn upload(app: &Router, bytes: &[u8]) -> Uuid {
        let (status, _, body) = send(app, upload_request(Some("Holiday"), Some(("holiday.mp4", bytes)))).await;
        assert_eq!(status, StatusCode::CREATED);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["status"], "PENDING");
        json["data"]["id"].as_str().unwrap().parse().unwrap()
    }

    async fn app_with(encoder: FakeEncoder) -> (tempfile::TempDir, AppState, Router) {
        let (root, state) = test_state(Arc::new(encoder)).await;
        let app = crate::app::create_app(state.clone());
        (root, state, app)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (_root, _state, app) = app_with(FakeEncoder::new()).await;
        let (status, _, body) = send(&app, get("/api/v1/health".into())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn valid_upload_is_transcoded_and_served() {
        let (_root, state, app) = app_with(FakeEncoder::new()).await;
        let id = upload(&app, b"a real video").await;

        let job = wait_for_terminal(&state, id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.original_file_name, "holiday.mp4");
        assert!(job.source_path.ends_with(&format!("{}.mp4", id)));

        let (status, headers, body) = send(&app, get(format!("/api/v1/videos/{}/playlist.m3u8", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/vnd.apple.mpegurl");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::CONTENT_DISPOSITION], "inline");
        assert!(String::from_utf8(body).unwrap().starts_with("#EXTM3U"));

        // Players resolve segment URIs relative to the playlist.
        let (status, headers, body) = send(&app, get(format!("/api/v1/videos/{}/segment_000.ts", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "video/mp2t");
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=3600");
        assert_eq!(headers[header::CONTENT_LENGTH], "4");
        assert_eq!(body, b"ts-0");

        let (status, _, _) = send(&app, get(format!("/api/v1/videos/{}/segments/segment_001.ts", id))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn corrupt_upload_fails_and_serves_nothing() {
        let (_root, state, app) = app_with(FakeEncoder::new()).await;
        let id = upload(&app, b"corrupt bytes").await;

        let job = wait_for_terminal(&state, id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.is_some());
        assert!(job.source_path().is_file());

        let (status, _, _) = send(&app, get(format!("/api/v1/videos/{}/playlist.m3u8", id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, body) = send(&app, get("/api/v1/videos?status=FAILED".into())).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"][0]["id"], id.to_string());
        assert_eq!(json["data"][0]["status"], "FAILED");
    }

    #[tokio::test]
    async fn pending_job_has_no_segments() {
        let (_root, state, app) = app_with(FakeEncoder::new()).await;
        let id = Uuid::new_v4();
        let source_path = state.artifacts.source_file_path(id, ".mp4");
        tokio::fs::write(&source_path, b"video").await.unwrap();
        let job = JobRecord::new(NewJob {
            id,
            title: "waiting".into(),
            original_file_name: "waiting.mp4".into(),
            source_path,
            content_type: None,
            file_size: 5,
            resubmitted_from: None,
        });
        state.jobs.insert(&job).await.unwrap();

        let (status, _, _) = send(&app, get(format!("/api/v1/videos/{}/segments/segment_000.ts", id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = send(&app, get(format!("/api/v1/videos/{}/playlist.m3u8", id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleting_completed_video_removes_everything() {
        let (_root, state, app) = app_with(FakeEncoder::new()).await;
        let id = upload(&app, b"a real video").await;
        let job = wait_for_terminal(&state, id).await;

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/videos/{}", id))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["record_existed"], true);

        for uri in [
            format!("/api/v1/videos/{}", id),
            format!("/api/v1/videos/{}/playlist.m3u8", id),
            format!("/api/v1/videos/{}/segment_000.ts", id),
        ] {
            let (status, _, _) = send(&app, get(uri.clone())).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        }
        assert!(!job.source_path().exists());
        assert!(!state.artifacts.output_dir(id).exists());
    }

    #[tokio::test]
    async fn deleting_unknown_video_is_ok() {
        let (_root, _state, app) = app_with(FakeEncoder::new()).await;
        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/videos/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn traversal_in_segment_name_is_rejected() {
        let (_root, _state, app) = app_with(FakeEncoder::new()).await;
        let uri = format!("/api/v1/videos/{}/segments/..%2F..%2Fsecret", Uuid::new_v4());
        let (status, _, _) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_without_title_is_rejected_and_leaves_no_file() {
        let (_root, state, app) = app_with(FakeEncoder::new()).await;

        let (status, _, _) = send(&app, upload_request(None, Some(("clip.mp4", &b"video"[..])))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = send(&app, upload_request(Some("No file"), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = send(&app, upload_request(Some("Empty"), Some(("clip.mp4", &b""[..])))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let leftovers = std::fs::read_dir(&state.config.upload_dir).unwrap().count();
        assert_eq!(leftovers, 0);
        assert!(state.jobs.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_with_413() {
        let (_root, state) = test_state_with(Arc::new(FakeEncoder::new()), |c| c.max_upload_bytes = 1024).await;
        let app = crate::app::create_app(state.clone());
        let big = vec![7u8; 64 * 1024];

        // No Content-Length, so the limit trips while the body is streaming.
        let req = upload_request(Some("Too big"), Some(("big.mp4", &big[..])));
        assert!(req.headers().get(header::CONTENT_LENGTH).is_none());
        let (status, _, body) = send(&app, req).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        let leftovers = std::fs::read_dir(&state.config.upload_dir).unwrap().count();
        assert_eq!(leftovers, 0);
        assert!(state.jobs.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_video_can_be_resubmitted_over_http() {
        let (_root, state, app) = app_with(FakeEncoder::new()).await;
        let id = upload(&app, b"corrupt").await;
        let failed = wait_for_terminal(&state, id).await;
        tokio::fs::write(failed.source_path(), b"fixed").await.unwrap();

        let req = Request::builder()
            .method("POST")
            .uri(format!("/api/v1/videos/{}/resubmit", id))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::CREATED);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["resubmitted_from"], id.to_string());

        let new_id: Uuid = json["data"]["id"].as_str().unwrap().parse().unwrap();
        assert_eq!(wait_for_terminal(&state, new_id).await.status, JobStatus::Completed);
    }
}
