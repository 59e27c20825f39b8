//! TaskCanvas Core
//!
//! Semantic similarity and layout-placement engine for task notes on a
//! freeform 2D canvas. Task titles are embedded into 384-dimensional
//! unit-norm vectors, persisted one-per-task alongside a content hash, and
//! queried with exact threshold-ranked cosine similarity to power duplicate
//! warnings and semantic placement of new tasks near related ones.
//!
//! ## Architecture
//!
//! - [`models`] - task and embedding records, engine configuration
//! - [`db`] - libsql persistence with an `F32_BLOB(384)` vector column
//! - [`services`] - task CRUD, similarity search, layout placement, and the
//!   event-driven background pipeline that ties them together

pub mod db;
pub mod models;
pub mod services;

pub use db::{DatabaseError, DatabaseService};
pub use models::{
    vector_literal, EngineConfig, LayoutConfig, NewTask, Position, SimilarTask, Task,
    TaskEmbedding, TaskStatus, TaskUpdate, CLUSTERING_THRESHOLD, DUPLICATE_THRESHOLD,
    EMBEDDING_DIMENSION, SIMILARITY_LIMIT,
};
pub use services::{
    EngineEvent, LayoutService, SimilarityService, TaskPipeline, TaskService, TaskServiceError,
    TextEmbedder,
};
