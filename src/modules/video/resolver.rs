use super::repository::JobStore;
use crate::common::error::{AppError, AppResult};
use crate::infrastructure::storage::artifacts::{extension_of, ArtifactStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Manifest,
    Segment,
    Other,
}

impl ArtifactKind {
    pub fn for_file_name(name: &str) -> Self {
        match extension_of(name).to_ascii_lowercase().as_str() {
            ".m3u8" => ArtifactKind::Manifest,
            ".ts" | ".mp4" => ArtifactKind::Segment,
            _ => ArtifactKind::Other,
        }
    }
}

pub fn content_type_for(name: &str) -> &'static str {
    match extension_of(name).to_ascii_lowercase().as_str() {
        ".m3u8" => "application/vnd.apple.mpegurl",
        ".ts" => "video/mp2t",
        ".mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Rejects anything that is not a single plain file name.
pub fn validate_file_name(name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::validation("File name must not be empty"));
    }
    if name.contains(['/', '\\', '\0']) || name.contains("..") {
        return Err(AppError::validation(format!("Invalid file name: {:?}", name)));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArtifact {
    pub path: PathBuf,
    pub content_type: &'static str,
    pub kind: ArtifactKind,
}

impl ResolvedArtifact {
    fn at(path: PathBuf, name: &str) -> Self {
        Self {
            path,
            content_type: content_type_for(name),
            kind: ArtifactKind::for_file_name(name),
        }
    }
}

/// Finds the file backing a requested HLS artifact.
///
/// Lookup order:
/// 1. `<hls_dir>/<id>/<name>`
/// 2. `<name>` next to the job's recorded manifest, if it has one
///
/// Only regular files count. Nothing is cached, so the answer always reflects
/// what is on disk right now.
#[derive(Clone)]
pub struct ArtifactResolver {
    artifacts: ArtifactStore,
    store: Arc<dyn JobStore>,
}

impl ArtifactResolver {
    pub fn new(artifacts: ArtifactStore, store: Arc<dyn JobStore>) -> Self {
        Self { artifacts, store }
    }

    pub async fn resolve(&self, job_id: Uuid, file_name: &str) -> AppResult<ResolvedArtifact> {
        validate_file_name(file_name)?;

        let canonical = self.artifacts.output_dir(job_id).join(file_name);
        if is_regular_file(&canonical).await {
            debug!("Resolved {} for video {} at canonical path", file_name, job_id);
            return Ok(ResolvedArtifact::at(canonical, file_name));
        }

        let job = self.store.get(job_id).await?;
        if let Some(dir) = job.as_ref().and_then(|j| j.manifest_dir()) {
            let derived = dir.join(file_name);
            if is_regular_file(&derived).await {
                debug!("Resolved {} for video {} next to its manifest", file_name, job_id);
                return Ok(ResolvedArtifact::at(derived, file_name));
            }
        }

        debug!("No {} for video {}", file_name, job_id);
        Err(AppError::not_found(format!("{} of video {}", file_name, job_id)))
    }
}

async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
