//! Service Layer
//!
//! Business logic over the database layer:
//!
//! - `TaskService` - phase-1 task CRUD
//! - `SimilarityService` - embedding store + similarity search
//! - `LayoutService` - semantic canvas placement
//! - `TaskPipeline` - phase-2 background worker and its event channel

mod error;
mod layout_service;
mod pipeline;
mod similarity_service;
mod task_service;

pub use error::TaskServiceError;
pub use layout_service::LayoutService;
pub use pipeline::{EngineEvent, TaskPipeline, TextEmbedder};
pub use similarity_service::SimilarityService;
pub use task_service::TaskService;
