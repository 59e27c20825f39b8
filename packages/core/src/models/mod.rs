//! Data Models
//!
//! Core data structures used throughout the engine:
//!
//! - `Task` - task note with status, canvas position and phase-1 scalars
//! - `TaskEmbedding` - engine-owned vector record, one per task
//! - `SimilarTask` - similarity query result row
//! - `EngineConfig` / `LayoutConfig` - thresholds and placement tuning

mod embedding;
mod task;

pub use embedding::{
    vector_literal, EngineConfig, LayoutConfig, SimilarTask, TaskEmbedding, CLUSTERING_THRESHOLD,
    DUPLICATE_THRESHOLD, EMBEDDING_DIMENSION, SIMILARITY_LIMIT,
};
pub use task::{NewTask, Position, Task, TaskStatus, TaskUpdate};
