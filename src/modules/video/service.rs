use super::cleanup::{self, DeleteOutcome};
use super::model::{JobRecord, JobStatus, NewJob};
use crate::common::error::{AppError, AppResult};
use crate::infrastructure::storage::artifacts::extension_of;
use crate::state::AppState;
use tracing::{info, warn};
use uuid::Uuid;

pub struct VideoService;

impl VideoService {
    /// Records a fully written upload and queues it for transcoding.
    ///
    /// The caller gets the PENDING record back straight away. If the queue is
    /// already shut down the record stays PENDING and is picked up by the
    /// recovery pass on the next start.
    pub async fn register_upload(state: AppState, new_job: NewJob) -> AppResult<JobRecord> {
        let job = JobRecord::new(new_job);
        state.jobs.insert(&job).await?;

        info!(
            "🎥 Accepted video {} ({:?}, {} bytes)",
            job.id, job.original_file_name, job.file_size
        );

        match state.pipeline.submit(job.clone()) {
            Ok(_completion) => {}
            Err(e) => warn!("Video {} stays PENDING until the next start: {}", job.id, e),
        }

        Ok(job)
    }

    pub async fn list(state: AppState, status: Option<JobStatus>) -> AppResult<Vec<JobRecord>> {
        match status {
            Some(status) => state.jobs.list_by_status(status).await,
            None => state.jobs.list().await,
        }
    }

    pub async fn get(state: AppState, id: Uuid) -> AppResult<JobRecord> {
        state
            .jobs
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Video {}", id)))
    }

    pub async fn delete(state: AppState, id: Uuid) -> AppResult<DeleteOutcome> {
        cleanup::delete_job(state.jobs.as_ref(), &state.artifacts, id).await
    }

    /// Starts a fresh job from the source a FAILED job left behind.
    ///
    /// The failed record is never modified; the new job points back to it
    /// through `resubmitted_from`.
    pub async fn resubmit(state: AppState, id: Uuid) -> AppResult<JobRecord> {
        let failed = Self::get(state.clone(), id).await?;
        if failed.status != JobStatus::Failed {
            return Err(AppError::InvalidTransition {
                from: failed.status.to_string(),
                to: JobStatus::Pending.to_string(),
            });
        }

        let metadata = tokio::fs::metadata(failed.source_path()).await;
        if !metadata.map(|m| m.is_file()).unwrap_or(false) {
            return Err(AppError::not_found(format!("Source file of video {}", id)));
        }

        let new_id = Uuid::new_v4();
        let source_path = state
            .artifacts
            .source_file_path(new_id, extension_of(&failed.source_path));
        let copied = tokio::fs::copy(failed.source_path(), &source_path).await?;

        let job = JobRecord::new(NewJob {
            id: new_id,
            title: failed.title.clone(),
            original_file_name: failed.original_file_name.clone(),
            source_path: source_path.clone(),
            content_type: failed.content_type.clone(),
            file_size: copied as i64,
            resubmitted_from: Some(failed.id),
        });

        if let Err(e) = state.jobs.insert(&job).await {
            cleanup::remove_file_best_effort(&source_path).await;
            return Err(e);
        }

        info!("🔁 Video {} resubmitted as {}", failed.id, job.id);
        if let Err(e) = state.pipeline.submit(job.clone()) {
            warn!("Video {} stays PENDING until the next start: {}", job.id, e);
        }

        Ok(job)
    }
}
