use super::repository::JobStore;
use crate::common::error::AppResult;
use crate::infrastructure::storage::artifacts::ArtifactStore;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use walkdir::WalkDir;

/// What a deletion actually managed to remove.
#[derive(Debug, Default, Clone, PartialEq, Serialize, ToSchema)]
pub struct DeleteOutcome {
    pub record_existed: bool,
    pub source_removed: bool,
    pub artifacts_removed: usize,
    pub cleanup_failures: usize,
}

/// Removes a directory tree, deepest entries first, continuing past failures.
///
/// Returns `(removed, failed)`. A missing root counts as nothing to do.
fn remove_tree(root: &Path) -> (usize, usize) {
    let mut removed = 0;
    let mut failed = 0;

    for entry in WalkDir::new(root).contents_first(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                if e.io_error().map(|io| io.kind()) != Some(ErrorKind::NotFound) {
                    warn!("Failed to walk {}: {}", root.display(), e);
                    failed += 1;
                }
                continue;
            }
        };

        let path = entry.path();
        let result = if entry.file_type().is_dir() {
            std::fs::remove_dir(path)
        } else {
            std::fs::remove_file(path)
        };

        match result {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                failed += 1;
            }
        }
    }

    (removed, failed)
}

pub async fn remove_tree_best_effort(root: PathBuf) -> (usize, usize) {
    let shown = root.display().to_string();
    match tokio::task::spawn_blocking(move || remove_tree(&root)).await {
        Ok(counts) => counts,
        Err(e) => {
            warn!("Cleanup task for {} did not finish: {}", shown, e);
            (0, 1)
        }
    }
}

/// Returns whether the file is gone afterwards.
pub async fn remove_file_best_effort(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

/// Deletes a job's source, its generated HLS set and finally its record.
///
/// Filesystem failures are logged and counted but never stop the record from
/// being removed; only store failures are returned as errors.
pub async fn delete_job(store: &dyn JobStore, artifacts: &ArtifactStore, id: Uuid) -> AppResult<DeleteOutcome> {
    let Some(job) = store.get(id).await? else {
        debug!("Delete of unknown video {} is a no-op", id);
        return Ok(DeleteOutcome::default());
    };

    let mut outcome = DeleteOutcome {
        record_existed: true,
        ..DeleteOutcome::default()
    };

    outcome.source_removed = remove_file_best_effort(job.source_path()).await;
    if !outcome.source_removed {
        outcome.cleanup_failures += 1;
    }

    let canonical_dir = artifacts.output_dir(id);
    let mut dirs: Vec<PathBuf> = job.manifest_dir().map(Path::to_path_buf).into_iter().collect();
    if !dirs.contains(&canonical_dir) {
        dirs.push(canonical_dir);
    }

    for dir in dirs {
        let (removed, failed) = remove_tree_best_effort(dir).await;
        outcome.artifacts_removed += removed;
        outcome.cleanup_failures += failed;
    }

    store.delete(id).await?;

    info!(
        "🗑️ Deleted video {} ({} artifacts removed, {} cleanup failures)",
        id, outcome.artifacts_removed, outcome.cleanup_failures
    );
    Ok(outcome)
}
