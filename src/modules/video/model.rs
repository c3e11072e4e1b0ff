use crate::common::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "job_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of one upload-to-HLS conversion.
///
/// Status only moves forward through the transition methods below, which
/// keep `manifest_path` set exactly when the job is `COMPLETED` and
/// `error_message` set exactly when it is `FAILED`.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq, ToSchema)]
pub struct JobRecord {
    pub id: Uuid,
    pub title: String,
    pub original_file_name: String,
    pub source_path: String,
    pub manifest_path: Option<String>,
    pub duration_seconds: Option<f64>,
    pub content_type: Option<String>,
    pub file_size: i64,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub resubmitted_from: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
}

/// Everything the ingest path knows about a freshly written upload.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: Uuid,
    pub title: String,
    pub original_file_name: String,
    pub source_path: PathBuf,
    pub content_type: Option<String>,
    pub file_size: i64,
    pub resubmitted_from: Option<Uuid>,
}

impl JobRecord {
    pub fn new(job: NewJob) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: job.id,
            title: job.title,
            original_file_name: job.original_file_name,
            source_path: job.source_path.to_string_lossy().into_owned(),
            manifest_path: None,
            duration_seconds: None,
            content_type: job.content_type,
            file_size: job.file_size,
            status: JobStatus::Pending,
            error_message: None,
            resubmitted_from: job.resubmitted_from,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn source_path(&self) -> &Path {
        Path::new(&self.source_path)
    }

    /// Directory holding the generated manifest, if the job ever completed.
    pub fn manifest_dir(&self) -> Option<&Path> {
        self.manifest_path.as_deref().and_then(|p| Path::new(p).parent())
    }

    fn transition(&mut self, next: JobStatus) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        // Keep updated_at strictly increasing even if two mutations land in the same clock tick.
        let now = OffsetDateTime::now_utc();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + time::Duration::microseconds(1)
        };
    }

    pub fn start_processing(&mut self) -> AppResult<()> {
        self.transition(JobStatus::Processing)
    }

    pub fn complete(&mut self, manifest_path: &Path, duration_seconds: f64) -> AppResult<()> {
        self.transition(JobStatus::Completed)?;
        self.manifest_path = Some(manifest_path.to_string_lossy().into_owned());
        self.duration_seconds = Some(duration_seconds);
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> AppResult<()> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(reason.into());
        Ok(())
    }
}
