//! Background Task Pipeline
//!
//! Event-driven phase-2 worker: phase-1 persistence returns immediately, then
//! the pipeline embeds the task title in the background, stores the vector,
//! assigns a semantic canvas position (creation only), and emits a duplicate
//! warning when a near-identical task already exists.
//!
//! ## Two-phase model
//!
//! 1. Phase 1 (`TaskService`): synchronous writes, errors propagate.
//! 2. Phase 2 (this module): jobs flow through an mpsc queue into a spawned
//!    worker; results flow back as `EngineEvent`s on a notification channel.
//!    Phase-2 failures are logged and swallowed so they can never break the
//!    create/edit path.
//!
//! ## Per-task ordering
//!
//! Within one job the embedding is persisted before placement and the
//! position is written back before the duplicate event is emitted, so every
//! event the application observes refers to state already in the store.

use crate::models::{EngineConfig, Position};
use crate::services::error::TaskServiceError;
use crate::services::layout_service::LayoutService;
use crate::services::similarity_service::SimilarityService;
use crate::services::task_service::TaskService;
use std::sync::Arc;
use taskcanvas_nlp_engine::{fingerprint, EmbeddingError, EmbeddingService};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Abstraction over text embedding, so tests can run the full pipeline with
/// a deterministic stub instead of a model file.
pub trait TextEmbedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

impl TextEmbedder for EmbeddingService {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        EmbeddingService::embed(self, text)
    }
}

/// A unit of phase-2 work
#[derive(Debug, Clone)]
enum PipelineJob {
    /// New task: embed, place, duplicate-check
    Created { task_id: String, title: String },
    /// Title edit: re-embed and duplicate-check, keep the user's position
    TitleChanged { task_id: String, title: String },
}

impl PipelineJob {
    fn task_id(&self) -> &str {
        match self {
            Self::Created { task_id, .. } | Self::TitleChanged { task_id, .. } => task_id,
        }
    }
}

/// Notifications emitted by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The pipeline assigned a semantic canvas position to a new task
    PositionAssigned { task_id: String, position: Position },
    /// A stored task is a likely duplicate of the one just saved
    DuplicateFound {
        task_id: String,
        matched_id: String,
        matched_title: String,
        similarity: f32,
    },
}

/// Handle to the background pipeline
///
/// Holds the job queue sender; dropping the handle closes the queue and the
/// worker drains remaining jobs and exits.
pub struct TaskPipeline {
    job_tx: mpsc::Sender<PipelineJob>,
}

/// Queue depth for pending jobs; enqueueing is non-blocking and a full queue
/// drops the job with a warning rather than stalling the caller.
const JOB_QUEUE_CAPACITY: usize = 64;

/// Queue depth for outbound events
const EVENT_QUEUE_CAPACITY: usize = 64;

impl TaskPipeline {
    /// Spawn the background worker
    ///
    /// Returns the pipeline handle and the receiver for `EngineEvent`
    /// notifications.
    pub fn spawn(
        embedder: Arc<dyn TextEmbedder>,
        tasks: Arc<TaskService>,
        similarity: Arc<SimilarityService>,
        layout: Arc<LayoutService>,
        config: EngineConfig,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (job_tx, mut job_rx) = mpsc::channel::<PipelineJob>(JOB_QUEUE_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<EngineEvent>(EVENT_QUEUE_CAPACITY);

        tokio::spawn(async move {
            info!("Task pipeline started");
            // recv() yields None once every sender is dropped
            while let Some(job) = job_rx.recv().await {
                let task_id = job.task_id().to_string();
                if let Err(e) =
                    process(&job, &embedder, &tasks, &similarity, &layout, &config, &event_tx)
                        .await
                {
                    // Phase-2 failures never propagate to the caller
                    error!(task_id = %task_id, error = %e, "Pipeline job failed");
                }
            }
            info!("Task pipeline shut down");
        });

        (Self { job_tx }, event_rx)
    }

    /// Enqueue phase-2 work for a newly created task
    pub fn on_task_created(&self, task_id: &str, title: &str) {
        self.enqueue(PipelineJob::Created {
            task_id: task_id.to_string(),
            title: title.to_string(),
        });
    }

    /// Enqueue phase-2 work after a title edit
    pub fn on_task_title_changed(&self, task_id: &str, title: &str) {
        self.enqueue(PipelineJob::TitleChanged {
            task_id: task_id.to_string(),
            title: title.to_string(),
        });
    }

    /// Deletion hook, kept for API symmetry
    ///
    /// The embedding row is removed by FK cascade when the task row is
    /// deleted, so there is no phase-2 work to do.
    pub fn on_task_deleted(&self, task_id: &str) {
        debug!(task_id = %task_id, "Task deleted; embedding removed by cascade");
    }

    fn enqueue(&self, job: PipelineJob) {
        match self.job_tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(task_id = %job.task_id(), "Pipeline queue full, dropping job");
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(task_id = %job.task_id(), "Pipeline has shut down, job ignored");
            }
        }
    }
}

/// Run one job: embed, store, place (creation only), duplicate-check
async fn process(
    job: &PipelineJob,
    embedder: &Arc<dyn TextEmbedder>,
    tasks: &Arc<TaskService>,
    similarity: &Arc<SimilarityService>,
    layout: &Arc<LayoutService>,
    config: &EngineConfig,
    event_tx: &mpsc::Sender<EngineEvent>,
) -> Result<(), TaskServiceError> {
    let (task_id, title, is_creation) = match job {
        PipelineJob::Created { task_id, title } => (task_id, title, true),
        PipelineJob::TitleChanged { task_id, title } => (task_id, title, false),
    };

    let vector = embedder.embed(title)?;
    let content_hash = fingerprint(title);

    // Embedding persisted first so placement and duplicate queries (for this
    // and for concurrent tasks) see current state.
    similarity
        .upsert_embedding(task_id, &content_hash, &vector)
        .await?;
    debug!(task_id = %task_id, "Embedded and stored task vector");

    // Placement only on creation; an edited task stays where the user put it.
    if is_creation {
        let position = layout.suggest_position(task_id).await?;
        tasks.set_position(task_id, position).await?;
        debug!(
            task_id = %task_id,
            x = position.x,
            y = position.y,
            "Assigned semantic position"
        );
        let _ = event_tx
            .send(EngineEvent::PositionAssigned {
                task_id: task_id.clone(),
                position,
            })
            .await;
    }

    let duplicates = similarity
        .find_similar(task_id, config.duplicate_threshold, config.duplicate_limit)
        .await?;
    if let Some(best) = duplicates.first() {
        debug!(
            task_id = %task_id,
            matched_id = %best.task_id,
            similarity = best.similarity,
            "Duplicate candidate found"
        );
        let _ = event_tx
            .send(EngineEvent::DuplicateFound {
                task_id: task_id.clone(),
                matched_id: best.task_id.clone(),
                matched_title: best.title.clone(),
                similarity: best.similarity,
            })
            .await;
    }

    Ok(())
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
