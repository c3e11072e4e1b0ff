use crate::common::error::{AppError, AppResult};
use crate::infrastructure::encoder::Transcoder;
use crate::infrastructure::storage::artifacts::ArtifactStore;
use crate::modules::video::cleanup::remove_tree_best_effort;
use crate::modules::video::model::{JobRecord, JobStatus};
use crate::modules::video::repository::JobStore;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Resolves with the terminal status once the job has been processed.
///
/// A job whose record was deleted while it ran resolves as `Failed`.
pub type Completion = oneshot::Receiver<JobStatus>;

/// Attempts at persisting `PENDING -> PROCESSING` before the task is deferred.
const START_ATTEMPTS: u32 = 3;
const START_BACKOFF: Duration = Duration::from_millis(100);
/// Delay before a deferred task goes back on the queue.
const REQUEUE_DELAY: Duration = Duration::from_secs(1);

struct TranscodeTask {
    job: JobRecord,
    claim: JobClaim,
    done: oneshot::Sender<JobStatus>,
}

/// Holds a job id in the in-flight set until dropped.
struct JobClaim {
    id: Uuid,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl Drop for JobClaim {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.id);
    }
}

struct WorkerContext {
    store: Arc<dyn JobStore>,
    artifacts: ArtifactStore,
    encoder: Arc<dyn Transcoder>,
    timeout: Duration,
    // Weak so the queue still closes once the pipeline is dropped.
    requeue: async_channel::WeakSender<TranscodeTask>,
}

/// What a worker hands back after one pass over a job.
enum Outcome {
    Finished(JobStatus),
    /// The job could not be moved to PROCESSING and is still PENDING.
    Deferred(JobRecord),
}

/// Background conversion of PENDING jobs on a fixed number of workers.
///
/// Enqueueing never waits for an encode. Each job id is held by at most one
/// execution at a time, and at most `workers` encoder processes run at once.
#[derive(Clone)]
pub struct TranscodePipeline {
    sender: async_channel::Sender<TranscodeTask>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
    ctx: Arc<WorkerContext>,
}

impl TranscodePipeline {
    /// Spawns the worker tasks. Must be called from inside a Tokio runtime.
    pub fn start(
        store: Arc<dyn JobStore>,
        artifacts: ArtifactStore,
        encoder: Arc<dyn Transcoder>,
        workers: usize,
        timeout: Duration,
    ) -> Self {
        let (sender, receiver) = async_channel::unbounded();
        let ctx = Arc::new(WorkerContext {
            store,
            artifacts,
            encoder,
            timeout,
            requeue: sender.downgrade(),
        });

        let workers = workers.max(1);
        info!("🎥 Starting {} transcode workers (timeout {}s)", workers, timeout.as_secs());
        for worker_id in 0..workers {
            tokio::spawn(run_worker(worker_id, receiver.clone(), ctx.clone()));
        }

        Self {
            sender,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            ctx,
        }
    }

    fn claim(&self, id: Uuid) -> AppResult<JobClaim> {
        if !self.in_flight.lock().insert(id) {
            return Err(AppError::Conflict(format!("Video {} is already queued for transcoding", id)));
        }
        Ok(JobClaim {
            id,
            in_flight: self.in_flight.clone(),
        })
    }

    /// Hands a PENDING job to the workers and returns immediately.
    pub fn submit(&self, job: JobRecord) -> AppResult<Completion> {
        if job.status != JobStatus::Pending {
            return Err(AppError::InvalidTransition {
                from: job.status.to_string(),
                to: JobStatus::Processing.to_string(),
            });
        }

        let claim = self.claim(job.id)?;
        let (done, completion) = oneshot::channel();
        let id = job.id;

        self.sender
            .try_send(TranscodeTask { job, claim, done })
            .map_err(|_| AppError::Unavailable("transcode queue is closed".to_string()))?;

        debug!("Queued video {} for transcoding ({} waiting)", id, self.sender.len());
        Ok(completion)
    }

    /// Reconciles jobs left behind by a previous process.
    ///
    /// PROCESSING jobs lost their encoder and are marked FAILED. PENDING jobs
    /// were never picked up and are queued, oldest first.
    pub async fn recover(&self) -> AppResult<usize> {
        let store = &self.ctx.store;

        for mut job in store.list_by_status(JobStatus::Processing).await? {
            job.fail("Interrupted by service restart")?;
            store.update(&job).await?;
            remove_tree_best_effort(self.ctx.artifacts.output_dir(job.id)).await;
            warn!("Video {} was interrupted mid-transcode, marked FAILED", job.id);
        }

        let mut pending = store.list_by_status(JobStatus::Pending).await?;
        pending.reverse();
        let requeued = pending.len();
        for job in pending {
            // Completion is only observable through the store after a restart.
            let _completion = self.submit(job)?;
        }

        if requeued > 0 {
            info!("Re-queued {} pending videos", requeued);
        }
        Ok(requeued)
    }
}

async fn run_worker(worker_id: usize, receiver: async_channel::Receiver<TranscodeTask>, ctx: Arc<WorkerContext>) {
    debug!("Transcode worker {} started", worker_id);

    while let Ok(task) = receiver.recv().await {
        let TranscodeTask { job, claim, done } = task;
        let id = job.id;
        info!("📦 Worker {} picked up video {}", worker_id, id);

        // A panicking encode must not take the worker down with it.
        let status = match tokio::spawn(process_job(ctx.clone(), job)).await {
            Ok(Outcome::Finished(status)) => status,
            Ok(Outcome::Deferred(job)) => {
                // The claim travels with the task so nobody else picks the id up meanwhile.
                tokio::spawn(requeue_later(ctx.clone(), TranscodeTask { job, claim, done }));
                continue;
            }
            Err(e) => {
                error!("❌ Transcode task for video {} aborted: {}", id, e);
                fail_aborted(&ctx, id, format!("Transcode aborted: {}", e)).await
            }
        };

        drop(claim);
        let _ = done.send(status);
    }

    debug!("Transcode worker {} stopped", worker_id);
}

async fn requeue_later(ctx: Arc<WorkerContext>, task: TranscodeTask) {
    tokio::time::sleep(REQUEUE_DELAY).await;
    let id = task.job.id;

    let sent = match ctx.requeue.upgrade() {
        Some(sender) => sender.try_send(task).map_err(|e| e.into_inner()),
        None => Err(task),
    };
    match sent {
        Ok(()) => info!("🔁 Re-queued video {} after a failed status update", id),
        Err(task) => {
            // Shutting down; startup recovery queues the PENDING record again.
            warn!("Could not re-queue video {}, it stays PENDING", id);
            let _ = task.done.send(JobStatus::Pending);
        }
    }
}

async fn fail_aborted(ctx: &WorkerContext, id: Uuid, reason: String) -> JobStatus {
    let mut job = match ctx.store.get(id).await {
        Ok(Some(job)) => job,
        Ok(None) => return JobStatus::Failed,
        Err(e) => {
            error!("❌ Could not load aborted video {}: {}", id, e);
            return JobStatus::Processing;
        }
    };

    if job.status.is_terminal() {
        return job.status;
    }
    if job.fail(reason).is_ok() {
        remove_tree_best_effort(ctx.artifacts.output_dir(id)).await;
        if let Err(e) = ctx.store.update(&job).await {
            error!("❌ Could not mark aborted video {} as FAILED: {}", id, e);
        }
    }
    job.status
}

/// Drives one job through PROCESSING to a terminal state.
///
/// The worker owns `job` exclusively; every transition is persisted before the
/// next step so readers going through the store see them in order.
async fn process_job(ctx: Arc<WorkerContext>, mut job: JobRecord) -> Outcome {
    let id = job.id;
    let pending = job.clone();

    if let Err(e) = job.start_processing() {
        error!("❌ Video {} cannot start processing: {}", id, e);
        return Outcome::Finished(job.status);
    }

    let mut attempt = 1;
    loop {
        match ctx.store.update(&job).await {
            Ok(()) => break,
            Err(AppError::NotFound(_)) => {
                warn!("Video {} was deleted before transcoding started", id);
                return Outcome::Finished(JobStatus::Failed);
            }
            Err(e) if attempt < START_ATTEMPTS => {
                warn!("Could not mark video {} as PROCESSING (attempt {}): {}", id, attempt, e);
                tokio::time::sleep(START_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => {
                // Nothing has been encoded yet; the stored record is still PENDING.
                error!("❌ Could not mark video {} as PROCESSING: {}", id, e);
                return Outcome::Deferred(pending);
            }
        }
    }

    let output_dir = ctx.artifacts.output_dir(id);
    let encode = ctx.encoder.transcode(job.source_path(), &output_dir);
    let result = match tokio::time::timeout(ctx.timeout, encode).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err(format!("Encode timed out after {:?}", ctx.timeout)),
    };

    let transition = match result {
        Ok(output) => {
            info!(
                "✅ Video {} transcoded ({:.1}s) -> {}",
                id,
                output.duration_seconds,
                output.manifest_path.display()
            );
            job.complete(&output.manifest_path, output.duration_seconds)
        }
        Err(reason) => {
            error!("❌ Transcode of video {} failed: {}", id, reason);
            let (_, failed) = remove_tree_best_effort(output_dir.clone()).await;
            if failed > 0 {
                warn!("Partial output of video {} could not be fully removed", id);
            }
            job.fail(reason)
        }
    };

    if let Err(e) = transition {
        error!("❌ Video {} ended in an impossible state: {}", id, e);
        return Outcome::Finished(job.status);
    }

    match ctx.store.update(&job).await {
        Ok(()) => Outcome::Finished(job.status),
        Err(AppError::NotFound(_)) => {
            warn!("Video {} was deleted while transcoding; discarding its output", id);
            remove_tree_best_effort(output_dir).await;
            Outcome::Finished(JobStatus::Failed)
        }
        Err(e) => {
            error!("❌ Could not persist final status of video {}: {}", id, e);
            Outcome::Finished(job.status)
        }
    }
}
