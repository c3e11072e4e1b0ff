use super::model::{JobRecord, JobStatus};
use crate::common::error::{AppError, AppResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// Key-value persistence for job records.
///
/// A successful write is visible to every later read through the same store.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &JobRecord) -> AppResult<()>;

    /// Replaces an existing record. Fails with `NotFound` if it was deleted.
    async fn update(&self, job: &JobRecord) -> AppResult<()>;

    async fn get(&self, id: Uuid) -> AppResult<Option<JobRecord>>;

    /// All jobs, newest first.
    async fn list(&self) -> AppResult<Vec<JobRecord>>;

    /// Jobs in one status, newest first.
    async fn list_by_status(&self, status: JobStatus) -> AppResult<Vec<JobRecord>>;

    /// Returns whether a record existed.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

// --- IN-MEMORY ---

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut jobs: Vec<JobRecord>) -> Vec<JobRecord> {
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        jobs
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &JobRecord) -> AppResult<()> {
        let mut jobs = self.jobs.write();
        if jobs.contains_key(&job.id) {
            return Err(AppError::Conflict(format!("Video {} already exists", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn update(&self, job: &JobRecord) -> AppResult<()> {
        match self.jobs.write().get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!("Video {}", job.id))),
        }
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<JobRecord>> {
        Ok(self.jobs.read().get(&id).cloned())
    }

    async fn list(&self) -> AppResult<Vec<JobRecord>> {
        let jobs = self.jobs.read().values().cloned().collect();
        Ok(Self::sorted(jobs))
    }

    async fn list_by_status(&self, status: JobStatus) -> AppResult<Vec<JobRecord>> {
        let jobs = self
            .jobs
            .read()
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        Ok(Self::sorted(jobs))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.jobs.write().remove(&id).is_some())
    }
}

// --- POSTGRES ---

const JOB_COLUMNS: &str = "id, title, original_file_name, source_path, manifest_path, duration_seconds, \
     content_type, file_size, status, error_message, resubmitted_from, created_at, updated_at";

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: &JobRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transcode_jobs (
                id, title, original_file_name, source_path, manifest_path, duration_seconds,
                content_type, file_size, status, error_message, resubmitted_from, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(job.id)
        .bind(&job.title)
        .bind(&job.original_file_name)
        .bind(&job.source_path)
        .bind(&job.manifest_path)
        .bind(job.duration_seconds)
        .bind(&job.content_type)
        .bind(job.file_size)
        .bind(job.status)
        .bind(&job.error_message)
        .bind(job.resubmitted_from)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, job: &JobRecord) -> AppResult<()> {
        // Only the fields the pipeline owns are writable; identity and upload metadata are fixed at insert.
        let result = sqlx::query(
            r#"
            UPDATE transcode_jobs
            SET manifest_path = $2, duration_seconds = $3, status = $4, error_message = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(&job.manifest_path)
        .bind(job.duration_seconds)
        .bind(job.status)
        .bind(&job.error_message)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Video {}", job.id)));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<JobRecord>> {
        let job = sqlx::query_as::<_, JobRecord>(&format!(
            "SELECT {} FROM transcode_jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn list(&self) -> AppResult<Vec<JobRecord>> {
        let jobs = sqlx::query_as::<_, JobRecord>(&format!(
            "SELECT {} FROM transcode_jobs ORDER BY created_at DESC, id DESC",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    async fn list_by_status(&self, status: JobStatus) -> AppResult<Vec<JobRecord>> {
        let jobs = sqlx::query_as::<_, JobRecord>(&format!(
            "SELECT {} FROM transcode_jobs WHERE status = $1 ORDER BY created_at DESC, id DESC",
            JOB_COLUMNS
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM transcode_jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
