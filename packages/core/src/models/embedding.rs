//! Embedding Model and Engine Configuration
//!
//! Defines the engine-owned embedding record stored in the `embeddings`
//! table (exactly one per task), the similarity result row, and the
//! threshold/layout defaults used by the pipeline.

use crate::models::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use taskcanvas_nlp_engine::EMBEDDING_DIMENSION;

/// Duplicate detection: high cutoff, flags near-identical tasks
pub const DUPLICATE_THRESHOLD: f32 = 0.85;

/// Clustering for layout: lower cutoff, finds topically related tasks
pub const CLUSTERING_THRESHOLD: f32 = 0.70;

/// Result limit shared by both query flavors
pub const SIMILARITY_LIMIT: usize = 5;

/// Embedding record stored in the `embeddings` table
///
/// At most one per task (`task_id` is the primary key); replaced on every
/// title save, removed with its task by FK cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEmbedding {
    /// Owning task id (unique)
    pub task_id: String,

    /// SHA-256 hex digest of the exact title text last embedded
    pub content_hash: String,

    /// Unit-norm embedding vector (384 components)
    pub vector: Vec<f32>,

    /// When the embedding was first created
    pub created_at: DateTime<Utc>,

    /// When the embedding was last replaced
    pub modified_at: DateTime<Utc>,
}

/// One row of a similarity query result
///
/// Carries the neighbor's current position so layout placement can reuse the
/// same query primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarTask {
    pub task_id: String,
    pub title: String,
    /// Cosine similarity in [0, 1] (dot product of unit-norm vectors)
    pub similarity: f32,
    pub position: Position,
}

/// Layout placement tuning
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Center of the cold-start fallback region
    pub fallback_center: Position,
    /// Side length of the square fallback region
    pub fallback_extent: f64,
    /// Maximum jitter added to a centroid, per axis (uniform in +/- jitter)
    pub jitter: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            fallback_center: Position::new(250.0, 250.0),
            fallback_extent: 400.0,
            jitter: 100.0,
        }
    }
}

/// Engine-wide thresholds and layout defaults
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Similarity cutoff for duplicate warnings
    pub duplicate_threshold: f32,
    /// Result limit for duplicate queries
    pub duplicate_limit: usize,
    /// Similarity cutoff for layout clustering
    pub clustering_threshold: f32,
    /// Result limit for clustering queries
    pub clustering_limit: usize,
    /// Placement tuning
    pub layout: LayoutConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: DUPLICATE_THRESHOLD,
            duplicate_limit: SIMILARITY_LIMIT,
            clustering_threshold: CLUSTERING_THRESHOLD,
            clustering_limit: SIMILARITY_LIMIT,
            layout: LayoutConfig::default(),
        }
    }
}

/// Render a vector as a storage-boundary text literal:
/// bracketed, comma-separated decimals with no embedded spaces,
/// e.g. `[0.123,-0.004,1]`. Vector-literal parsers are whitespace-sensitive.
pub fn vector_literal(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 10 + 2);
    out.push('[');
    for (i, component) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&component.to_string());
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.duplicate_threshold, 0.85);
        assert_eq!(config.clustering_threshold, 0.70);
        assert_eq!(config.duplicate_limit, 5);
        assert_eq!(config.clustering_limit, 5);
        assert_eq!(config.layout.fallback_center, Position::new(250.0, 250.0));
        assert_eq!(config.layout.fallback_extent, 400.0);
        assert_eq!(config.layout.jitter, 100.0);
    }

    #[test]
    fn test_vector_literal_format() {
        assert_eq!(vector_literal(&[0.125, -0.5, 1.0]), "[0.125,-0.5,1]");
        assert_eq!(vector_literal(&[]), "[]");
    }

    #[test]
    fn test_vector_literal_has_no_whitespace() {
        let literal = vector_literal(&[0.1, -0.25, 3.5, -4.0]);
        assert!(!literal.contains(' '));
        assert!(literal.starts_with('['));
        assert!(literal.ends_with(']'));
        assert_eq!(literal.matches(',').count(), 3);
    }

    #[test]
    fn test_embedding_dimension_reexport() {
        assert_eq!(EMBEDDING_DIMENSION, 384);
    }
}
