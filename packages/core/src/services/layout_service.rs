//! Layout Service
//!
//! Suggests a canvas position for a task from its embedding: the centroid of
//! its semantic neighbors plus a small jitter, or a random spot in a central
//! fallback region when the task has no neighbors yet.
//!
//! Placement is split in two: `neighbors()` does the async similarity query,
//! `place()` is pure synchronous math over the result. That keeps the RNG
//! out of the async region and makes placement directly testable with a
//! seeded generator.

use crate::models::{EngineConfig, Position, SimilarTask};
use crate::services::error::TaskServiceError;
use crate::services::similarity_service::SimilarityService;
use rand::Rng;
use std::sync::Arc;
use tracing::debug;

/// Semantic canvas placement
pub struct LayoutService {
    similarity: Arc<SimilarityService>,
    config: EngineConfig,
}

impl LayoutService {
    pub fn new(similarity: Arc<SimilarityService>, config: EngineConfig) -> Self {
        Self { similarity, config }
    }

    /// Fetch the task's clustering neighbors for placement
    ///
    /// Uses the freshly generated vector directly, so a task whose embedding
    /// was just written does not need a store round-trip.
    pub async fn neighbors(
        &self,
        task_id: &str,
        vector: &[f32],
    ) -> Result<Vec<SimilarTask>, TaskServiceError> {
        self.similarity
            .search(
                task_id,
                vector,
                self.config.clustering_threshold,
                self.config.clustering_limit,
            )
            .await
    }

    /// Compute a suggested position from a neighbor set
    ///
    /// With neighbors: their position centroid, each axis offset by a
    /// uniform jitter in +/- `layout.jitter` so stacked tasks stay readable.
    /// Without neighbors: a uniform random point in the square fallback
    /// region centered on `layout.fallback_center`.
    pub fn place<R: Rng>(&self, neighbors: &[SimilarTask], rng: &mut R) -> Position {
        let layout = &self.config.layout;

        if neighbors.is_empty() {
            let half = layout.fallback_extent / 2.0;
            let position = Position::new(
                layout.fallback_center.x + rng.gen_range(-half..=half),
                layout.fallback_center.y + rng.gen_range(-half..=half),
            );
            debug!(x = position.x, y = position.y, "Placed task in fallback region");
            return position;
        }

        let n = neighbors.len() as f64;
        let cx = neighbors.iter().map(|t| t.position.x).sum::<f64>() / n;
        let cy = neighbors.iter().map(|t| t.position.y).sum::<f64>() / n;

        let position = Position::new(
            cx + rng.gen_range(-layout.jitter..=layout.jitter),
            cy + rng.gen_range(-layout.jitter..=layout.jitter),
        );
        debug!(
            neighbors = neighbors.len(),
            x = position.x,
            y = position.y,
            "Placed task near neighbor centroid"
        );
        position
    }

    /// Suggest a position for a task from its stored embedding
    ///
    /// # Errors
    ///
    /// Returns `MissingEmbedding` if the task has no stored vector yet.
    /// Placement needs a query vector; unlike similarity queries there is no
    /// sensible empty answer.
    pub async fn suggest_position(&self, task_id: &str) -> Result<Position, TaskServiceError> {
        let neighbors = self.stored_neighbors(task_id).await?;
        // thread_rng is not Send; keep it out of the await region
        Ok(self.place(&neighbors, &mut rand::thread_rng()))
    }

    /// `suggest_position` with a caller-supplied RNG, for deterministic tests
    pub async fn suggest_position_with_rng<R: Rng>(
        &self,
        task_id: &str,
        rng: &mut R,
    ) -> Result<Position, TaskServiceError> {
        let neighbors = self.stored_neighbors(task_id).await?;
        Ok(self.place(&neighbors, rng))
    }

    async fn stored_neighbors(&self, task_id: &str) -> Result<Vec<SimilarTask>, TaskServiceError> {
        let embedding = self
            .similarity
            .get_embedding(task_id)
            .await?
            .ok_or_else(|| TaskServiceError::missing_embedding(task_id))?;
        self.neighbors(task_id, &embedding.vector).await
    }
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "layout_service_test.rs"]
mod tests;
