//! Similarity Service
//!
//! Embedding store plus similarity search. Vectors are unit-norm, so cosine
//! similarity reduces to a dot product; the comparison runs engine-side over
//! fetched candidate rows, which lets a stored vector of the wrong length be
//! skipped (and logged) instead of failing the whole query.

use crate::db::DatabaseService;
use crate::models::{Position, SimilarTask, TaskEmbedding, TaskStatus, EMBEDDING_DIMENSION};
use crate::services::error::TaskServiceError;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;
use taskcanvas_nlp_engine::EmbeddingService;
use tracing::{debug, error};

/// Embedding store and similarity search over stored task vectors
pub struct SimilarityService {
    db: Arc<DatabaseService>,
}

impl SimilarityService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Store or replace a task's embedding (one row per task, last write wins)
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationMismatch` if the vector is not 384-dimensional;
    /// nothing is written in that case.
    pub async fn upsert_embedding(
        &self,
        task_id: &str,
        content_hash: &str,
        vector: &[f32],
    ) -> Result<(), TaskServiceError> {
        if vector.len() != EMBEDDING_DIMENSION {
            return Err(TaskServiceError::configuration_mismatch(
                task_id,
                EMBEDDING_DIMENSION,
                vector.len(),
            ));
        }

        let blob = EmbeddingService::to_blob(vector);
        self.db
            .db_upsert_embedding(task_id, content_hash, blob)
            .await?;

        debug!(task_id = %task_id, "Stored task embedding");
        Ok(())
    }

    /// Fetch a task's stored embedding, if any
    pub async fn get_embedding(
        &self,
        task_id: &str,
    ) -> Result<Option<TaskEmbedding>, TaskServiceError> {
        let row = match self.db.db_get_embedding(task_id).await? {
            Some(row) => row,
            None => return Ok(None),
        };

        let task_id: String = row
            .get(0)
            .map_err(|e| TaskServiceError::query_failed(format!("embedding task_id: {}", e)))?;
        let content_hash: String = row
            .get(1)
            .map_err(|e| TaskServiceError::query_failed(format!("embedding hash: {}", e)))?;
        let blob: Vec<u8> = row
            .get(2)
            .map_err(|e| TaskServiceError::query_failed(format!("embedding vector: {}", e)))?;
        let created_at: String = row
            .get(3)
            .map_err(|e| TaskServiceError::query_failed(format!("embedding created_at: {}", e)))?;
        let modified_at: String = row
            .get(4)
            .map_err(|e| TaskServiceError::query_failed(format!("embedding modified_at: {}", e)))?;

        Ok(Some(TaskEmbedding {
            task_id,
            content_hash,
            vector: EmbeddingService::from_blob(&blob),
            created_at: parse_timestamp(&created_at),
            modified_at: parse_timestamp(&modified_at),
        }))
    }

    /// Find tasks similar to `task_id`
    ///
    /// Returns candidates with similarity >= `threshold`, most similar first,
    /// at most `limit` results. The subject task is never its own result, and
    /// done tasks participate neither as subjects nor candidates. A task that
    /// has not been embedded yet (or does not exist) simply has no neighbors:
    /// the result is empty, not an error.
    pub async fn find_similar(
        &self,
        task_id: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarTask>, TaskServiceError> {
        let embedding = match self.get_embedding(task_id).await? {
            Some(embedding) => embedding,
            None => return Ok(Vec::new()),
        };

        // Done subjects get an empty result set as well
        if let Some(subject_row) = self.db.db_get_task(task_id).await? {
            let status_str: String = subject_row
                .get(2)
                .map_err(|e| TaskServiceError::query_failed(format!("task status: {}", e)))?;
            let status = TaskStatus::from_str(&status_str)
                .map_err(TaskServiceError::query_failed)?;
            if status == TaskStatus::Done {
                return Ok(Vec::new());
            }
        }

        self.search(task_id, &embedding.vector, threshold, limit)
            .await
    }

    /// Search candidates against an in-memory query vector
    ///
    /// Used by `find_similar` and by layout placement, which already holds
    /// the freshly generated vector and skips the store round-trip.
    pub async fn search(
        &self,
        exclude_task_id: &str,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarTask>, TaskServiceError> {
        if query.len() != EMBEDDING_DIMENSION {
            return Err(TaskServiceError::configuration_mismatch(
                exclude_task_id,
                EMBEDDING_DIMENSION,
                query.len(),
            ));
        }

        let mut rows = self.db.db_fetch_candidates(exclude_task_id).await?;
        let mut results: Vec<SimilarTask> = Vec::new();

        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| TaskServiceError::query_failed(format!("candidate row: {}", e)))?
        {
            let candidate_id: String = row
                .get(0)
                .map_err(|e| TaskServiceError::query_failed(format!("candidate id: {}", e)))?;
            let title: String = row
                .get(1)
                .map_err(|e| TaskServiceError::query_failed(format!("candidate title: {}", e)))?;
            let x: f64 = row
                .get(2)
                .map_err(|e| TaskServiceError::query_failed(format!("candidate x: {}", e)))?;
            let y: f64 = row
                .get(3)
                .map_err(|e| TaskServiceError::query_failed(format!("candidate y: {}", e)))?;
            let blob: Vec<u8> = row
                .get(4)
                .map_err(|e| TaskServiceError::query_failed(format!("candidate vector: {}", e)))?;

            let candidate = EmbeddingService::from_blob(&blob);
            if candidate.len() != EMBEDDING_DIMENSION {
                // Skip rows written under a different model configuration
                error!(
                    task_id = %candidate_id,
                    expected = EMBEDDING_DIMENSION,
                    actual = candidate.len(),
                    "Skipping stored embedding with mismatched dimension"
                );
                continue;
            }

            let similarity = dot(query, &candidate);
            if similarity >= threshold {
                results.push(SimilarTask {
                    task_id: candidate_id,
                    title,
                    similarity,
                    position: Position::new(x, y),
                });
            }
        }

        // Stable sort: candidates arrive in insertion order, so equal
        // similarities keep that order as the tie-break.
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }
}

/// Dot product; cosine similarity for unit-norm inputs
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Parse a SQLite CURRENT_TIMESTAMP string, falling back to now
pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)))
        .unwrap_or_else(|_| Utc::now())
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "similarity_service_test.rs"]
mod tests;
