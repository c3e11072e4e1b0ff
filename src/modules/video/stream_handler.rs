use super::resolver::ArtifactKind;
use crate::common::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::io::ErrorKind;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

fn cache_control(kind: ArtifactKind, segment_cache_secs: u64) -> String {
    match kind {
        // Playlists of running jobs still grow.
        ArtifactKind::Manifest => "no-cache".to_string(),
        ArtifactKind::Segment | ArtifactKind::Other => format!("public, max-age={}", segment_cache_secs),
    }
}

/// Resolves and streams one HLS artifact from disk.
async fn serve_artifact(state: &AppState, id: Uuid, name: &str) -> Response {
    let artifact = match state.resolver.resolve(id, name).await {
        Ok(a) => a,
        Err(e) => return e.into_response(),
    };

    // The file may vanish between resolution and open if the video is deleted.
    let file = match File::open(&artifact.path).await {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return AppError::not_found(format!("{} of video {}", name, id)).into_response();
        }
        Err(e) => return AppError::from(e).into_response(),
    };
    let length = match file.metadata().await {
        Ok(m) => m.len(),
        Err(e) => return AppError::from(e).into_response(),
    };

    let stream = ReaderStream::new(file);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.content_type)
        .header(header::CONTENT_LENGTH, length)
        .header(header::CONTENT_DISPOSITION, "inline")
        .header(header::CACHE_CONTROL, cache_control(artifact.kind, state.config.segment_cache_secs))
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// HLS playlist of a video
#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}/playlist.m3u8",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "HLS playlist", content_type = "application/vnd.apple.mpegurl"),
        (status = 404, description = "Not transcoded (yet) or unknown video"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Streaming"
)]
pub async fn get_manifest(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    let name = state.artifacts.manifest_file_name();
    serve_artifact(&state, id, name).await
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}/segments/{name}",
    params(
        ("id" = Uuid, Path, description = "Video ID"),
        ("name" = String, Path, description = "Segment file name, e.g. segment_000.ts")
    ),
    responses(
        (status = 200, description = "Media segment", content_type = "video/mp2t"),
        (status = 400, description = "Invalid file name"),
        (status = 404, description = "Segment not found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Streaming"
)]
pub async fn get_segment(State(state): State<AppState>, Path((id, name)): Path<(Uuid, String)>) -> impl IntoResponse {
    serve_artifact(&state, id, &name).await
}

/// Any file of the video's HLS set, addressed relative to the playlist.
///
/// Players resolve segment URIs against the playlist URL, so this is the
/// route they actually hit for `segment_000.ts` and friends.
#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}/{name}",
    params(
        ("id" = Uuid, Path, description = "Video ID"),
        ("name" = String, Path, description = "Artifact file name")
    ),
    responses(
        (status = 200, description = "Artifact content"),
        (status = 400, description = "Invalid file name"),
        (status = 404, description = "Artifact not found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Streaming"
)]
pub async fn get_artifact(State(state): State<AppState>, Path((id, name)): Path<(Uuid, String)>) -> impl IntoResponse {
    serve_artifact(&state, id, &name).await
}
