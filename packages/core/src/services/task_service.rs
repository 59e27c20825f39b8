//! Task Service
//!
//! Phase-1 task CRUD: synchronous persistence whose errors propagate to the
//! caller. Creation assigns a random placeholder position immediately so the
//! task is visible on the canvas before the background pipeline computes a
//! semantic one.

use crate::db::DatabaseService;
use crate::models::{NewTask, Position, Task, TaskStatus, TaskUpdate};
use crate::services::error::TaskServiceError;
use crate::services::similarity_service::parse_timestamp;
use rand::Rng;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Side length of the square placeholder region for brand-new tasks
const PLACEHOLDER_EXTENT: f64 = 500.0;

/// Task persistence and phase-1 operations
pub struct TaskService {
    db: Arc<DatabaseService>,
}

impl TaskService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Create a task with a random placeholder position
    ///
    /// # Errors
    ///
    /// Returns `InvalidTask` if the title is empty or whitespace-only.
    pub async fn create_task(&self, new_task: NewTask) -> Result<Task, TaskServiceError> {
        if new_task.title.trim().is_empty() {
            return Err(TaskServiceError::invalid_task("title must not be empty"));
        }

        // Placeholder only: the pipeline replaces this with a semantic
        // position once the embedding exists.
        let position = {
            let mut rng = rand::thread_rng();
            Position::new(
                rng.gen_range(0.0..PLACEHOLDER_EXTENT),
                rng.gen_range(0.0..PLACEHOLDER_EXTENT),
            )
        };

        let task = Task::new(new_task, position);
        self.db.db_create_task(&task).await?;

        debug!(task_id = %task.id, "Created task");
        Ok(task)
    }

    /// Fetch a task by id
    pub async fn get_task(&self, id: &str) -> Result<Task, TaskServiceError> {
        let row = self
            .db
            .db_get_task(id)
            .await?
            .ok_or_else(|| TaskServiceError::task_not_found(id))?;
        row_to_task(&row)
    }

    /// List all tasks in creation order
    pub async fn list_tasks(&self) -> Result<Vec<Task>, TaskServiceError> {
        let mut rows = self.db.db_list_tasks().await?;
        let mut tasks = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| TaskServiceError::query_failed(format!("task row: {}", e)))?
        {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }

    /// Replace a task's editable fields
    pub async fn update_task(
        &self,
        id: &str,
        update: TaskUpdate,
    ) -> Result<Task, TaskServiceError> {
        if update.title.trim().is_empty() {
            return Err(TaskServiceError::invalid_task("title must not be empty"));
        }

        let affected = self.db.db_update_task_fields(id, &update).await?;
        if affected == 0 {
            return Err(TaskServiceError::task_not_found(id));
        }
        self.get_task(id).await
    }

    /// Set a task's completion status
    pub async fn set_status(&self, id: &str, status: TaskStatus) -> Result<(), TaskServiceError> {
        let affected = self.db.db_set_status(id, &status.to_string()).await?;
        if affected == 0 {
            return Err(TaskServiceError::task_not_found(id));
        }
        Ok(())
    }

    /// Move a task on the canvas
    pub async fn set_position(
        &self,
        id: &str,
        position: Position,
    ) -> Result<(), TaskServiceError> {
        let affected = self.db.db_set_position(id, position.x, position.y).await?;
        if affected == 0 {
            return Err(TaskServiceError::task_not_found(id));
        }
        Ok(())
    }

    /// Delete a task; its embedding row goes with it via FK cascade
    pub async fn delete_task(&self, id: &str) -> Result<(), TaskServiceError> {
        let affected = self.db.db_delete_task(id).await?;
        if affected == 0 {
            return Err(TaskServiceError::task_not_found(id));
        }
        debug!(task_id = %id, "Deleted task");
        Ok(())
    }
}

/// Convert a `tasks` row into a `Task`
fn row_to_task(row: &libsql::Row) -> Result<Task, TaskServiceError> {
    let field = |e: libsql::Error, name: &str| {
        TaskServiceError::query_failed(format!("task {}: {}", name, e))
    };

    let id: String = row.get(0).map_err(|e| field(e, "id"))?;
    let title: String = row.get(1).map_err(|e| field(e, "title"))?;
    let status_str: String = row.get(2).map_err(|e| field(e, "status"))?;
    let energy: i64 = row.get(3).map_err(|e| field(e, "energy"))?;
    let interest: i64 = row.get(4).map_err(|e| field(e, "interest"))?;
    let time_estimate: i64 = row.get(5).map_err(|e| field(e, "time_estimate"))?;
    let x: f64 = row.get(6).map_err(|e| field(e, "position_x"))?;
    let y: f64 = row.get(7).map_err(|e| field(e, "position_y"))?;
    let created_at: String = row.get(8).map_err(|e| field(e, "created_at"))?;
    let modified_at: String = row.get(9).map_err(|e| field(e, "modified_at"))?;

    Ok(Task {
        id,
        title,
        status: TaskStatus::from_str(&status_str).map_err(TaskServiceError::query_failed)?,
        energy,
        interest,
        time_estimate,
        position: Position::new(x, y),
        created_at: parse_timestamp(&created_at),
        modified_at: parse_timestamp(&modified_at),
    })
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "task_service_test.rs"]
mod tests;
