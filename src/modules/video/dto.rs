use super::model::JobStatus;
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

/// Metadata fields of the multipart upload form.
#[derive(Debug, Validate)]
pub struct IngestRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
    pub title: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListVideosQuery {
    /// Only return videos in this status.
    pub status: Option<JobStatus>,
}
