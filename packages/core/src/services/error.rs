//! Service Error Types
//!
//! Errors surfaced by the task, similarity, and layout services. Wraps the
//! database and embedding layers and adds engine-level failures like
//! dimension mismatches between a query vector and the store.

use crate::db::DatabaseError;
use taskcanvas_nlp_engine::EmbeddingError;
use thiserror::Error;

/// Errors from the service layer
#[derive(Error, Debug)]
pub enum TaskServiceError {
    /// Task does not exist
    #[error("Task not found: {id}")]
    TaskNotFound { id: String },

    /// Task has no stored embedding yet
    #[error("No embedding stored for task: {id}")]
    MissingEmbedding { id: String },

    /// Underlying storage failure
    #[error("Storage failure: {0}")]
    StorageFailure(#[from] DatabaseError),

    /// Embedding generation failure
    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(#[from] EmbeddingError),

    /// Query vector dimension does not match the store's configured dimension
    #[error("Dimension mismatch for task {task_id}: expected {expected}, got {actual}")]
    ConfigurationMismatch {
        task_id: String,
        expected: usize,
        actual: usize,
    },

    /// Query produced a malformed result
    #[error("Query failed: {context}")]
    QueryFailed { context: String },

    /// Task input rejected by validation
    #[error("Invalid task: {0}")]
    InvalidTask(String),
}

impl TaskServiceError {
    /// Create a task not found error
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::TaskNotFound { id: id.into() }
    }

    /// Create a missing embedding error
    pub fn missing_embedding(id: impl Into<String>) -> Self {
        Self::MissingEmbedding { id: id.into() }
    }

    /// Create a configuration mismatch error
    pub fn configuration_mismatch(
        task_id: impl Into<String>,
        expected: usize,
        actual: usize,
    ) -> Self {
        Self::ConfigurationMismatch {
            task_id: task_id.into(),
            expected,
            actual,
        }
    }

    /// Create a query failed error with context
    pub fn query_failed(context: impl Into<String>) -> Self {
        Self::QueryFailed {
            context: context.into(),
        }
    }

    /// Create an invalid task error
    pub fn invalid_task(msg: impl Into<String>) -> Self {
        Self::InvalidTask(msg.into())
    }
}
