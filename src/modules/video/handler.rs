use super::cleanup::{remove_file_best_effort, DeleteOutcome};
use super::dto::{IngestRequest, ListVideosQuery};
use super::model::{JobRecord, NewJob};
use super::service::VideoService;
use crate::common::error::{AppError, AppResult};
use crate::common::response::{ApiResponse, ApiSuccess};
use crate::common::upload::stream_to_file;
use crate::infrastructure::storage::artifacts::{base_file_name, extension_of};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

struct StoredUpload {
    path: PathBuf,
    original_file_name: String,
    content_type: Option<String>,
    size: u64,
}

/// Reads the `title` and `file` parts. The file is streamed straight to its
/// final source path; nothing is buffered in memory.
async fn read_upload_form(state: &AppState, id: Uuid, multipart: &mut Multipart) -> AppResult<(Option<String>, Option<StoredUpload>)> {
    let mut title = None;
    let mut upload: Option<StoredUpload> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                if let Some(stored) = &upload {
                    remove_file_best_effort(&stored.path).await;
                }
                return Err(AppError::from(e));
            }
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => {
                match field.text().await.map_err(AppError::from) {
                    Ok(text) => title = Some(text.trim().to_string()),
                    Err(e) => {
                        if let Some(stored) = &upload {
                            remove_file_best_effort(&stored.path).await;
                        }
                        return Err(e);
                    }
                }
            }
            "file" if upload.is_none() => {
                let original_file_name = base_file_name(field.file_name().unwrap_or("")).to_string();
                let content_type = field.content_type().map(str::to_string);
                let path = state.artifacts.source_file_path(id, extension_of(&original_file_name));

                info!("Receiving upload {:?} for video {}", original_file_name, id);
                let size = stream_to_file(field, path.clone()).await?;
                upload = Some(StoredUpload {
                    path,
                    original_file_name,
                    content_type,
                    size,
                });
            }
            _ => {}
        }
    }

    Ok((title, upload))
}

#[utoipa::path(
    post,
    path = "/api/v1/videos",
    request_body(content = String, content_type = "multipart/form-data", description = "Form fields `title` and `file`"),
    responses(
        (status = 201, description = "Upload accepted, transcoding queued", body = ApiResponse<JobRecord>),
        (status = 400, description = "Missing title or file, or empty file"),
        (status = 413, description = "Upload exceeds the configured size limit"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos"
)]
pub async fn upload_video(State(state): State<AppState>, mut multipart: Multipart) -> impl IntoResponse {
    let id = Uuid::new_v4();

    let (title, upload) = match read_upload_form(&state, id, &mut multipart).await {
        Ok(parts) => parts,
        Err(e) => return e.into_response(),
    };

    let Some(upload) = upload else {
        return AppError::validation("No file field found in multipart request").into_response();
    };

    let request = IngestRequest {
        title: title.unwrap_or_default(),
    };
    if let Err(e) = request.validate() {
        remove_file_best_effort(&upload.path).await;
        return AppError::from(e).into_response();
    }

    let new_job = NewJob {
        id,
        title: request.title,
        original_file_name: upload.original_file_name,
        source_path: upload.path.clone(),
        content_type: upload.content_type,
        file_size: upload.size as i64,
        resubmitted_from: None,
    };

    match VideoService::register_upload(state, new_job).await {
        Ok(job) => ApiSuccess::created(job, "Video uploaded, transcoding queued").into_response(),
        Err(e) => {
            remove_file_best_effort(&upload.path).await;
            e.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/videos",
    params(ListVideosQuery),
    responses(
        (status = 200, description = "Videos, newest first", body = ApiResponse<Vec<JobRecord>>),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos"
)]
pub async fn list_videos(State(state): State<AppState>, Query(query): Query<ListVideosQuery>) -> impl IntoResponse {
    match VideoService::list(state, query.status).await {
        Ok(jobs) => ApiSuccess::ok(jobs, "Videos retrieved successfully").into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Get Video", body = ApiResponse<JobRecord>),
        (status = 404, description = "Video Not Found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos"
)]
pub async fn get_video(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match VideoService::get(state, id).await {
        Ok(job) => ApiSuccess::ok(job, "Video retrieved successfully").into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/videos/{id}",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Video and its files removed (no-op for unknown ids)", body = ApiResponse<DeleteOutcome>),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos"
)]
pub async fn delete_video(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match VideoService::delete(state, id).await {
        Ok(outcome) => ApiSuccess::ok(outcome, "Video deleted successfully").into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/videos/{id}/resubmit",
    params(
        ("id" = Uuid, Path, description = "ID of a FAILED video")
    ),
    responses(
        (status = 201, description = "New job created from the retained source", body = ApiResponse<JobRecord>),
        (status = 404, description = "Video or its source not found"),
        (status = 409, description = "Video is not FAILED"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos"
)]
pub async fn resubmit_video(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match VideoService::resubmit(state, id).await {
        Ok(job) => ApiSuccess::created(job, "Video resubmitted for transcoding").into_response(),
        Err(e) => e.into_response(),
    }
}
