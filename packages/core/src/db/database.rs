//! Database Service
//!
//! libsql-backed persistence for tasks and their embeddings. Owns schema
//! bootstrap and the raw SQL primitives; services wrap these with model
//! conversion and business rules.
//!
//! # Schema
//!
//! - `tasks`: task records keyed by id with mutable status and position
//! - `embeddings`: one row per task (`task_id` primary key), unit-norm
//!   vector stored as `F32_BLOB(384)`, `ON DELETE CASCADE` so deleting a
//!   task removes its embedding in the same logical operation

use crate::db::error::DatabaseError;
use crate::models::{Task, TaskUpdate, EMBEDDING_DIMENSION};
use libsql::{params, Builder};
use std::path::PathBuf;
use std::sync::Arc;

/// Database service managing the libsql connection and schema
pub struct DatabaseService {
    db: Arc<libsql::Database>,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    /// 4. Enable SQLite features (WAL mode, foreign keys)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the parent directory cannot be created,
    /// the connection fails, or schema initialization fails.
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema(is_new_database).await?;

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so query() must be used instead of
    /// execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Idempotent (CREATE TABLE IF NOT EXISTS); safe to call multiple times.
    /// For newly created database files a WAL checkpoint flushes the schema
    /// to disk, preventing "no such table" races in tests that swap
    /// databases rapidly.
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        // WAL mode for better concurrency
        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        // Wait up to 5s instead of failing immediately on lock
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;

        // Foreign keys required for the embeddings cascade
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'todo',
                energy INTEGER NOT NULL DEFAULT 0,
                interest INTEGER NOT NULL DEFAULT 0,
                time_estimate INTEGER NOT NULL DEFAULT 0,
                position_x REAL NOT NULL DEFAULT 0,
                position_y REAL NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                modified_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create tasks table: {}", e))
        })?;

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS embeddings (
                    task_id TEXT PRIMARY KEY,
                    content_hash TEXT NOT NULL,
                    -- 384-dimensional unit-norm vectors, little-endian f32
                    vector F32_BLOB({}) NOT NULL,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    modified_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
                )",
                EMBEDDING_DIMENSION
            ),
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create embeddings table: {}", e))
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create status index: {}", e))
        })?;

        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// Get a synchronous connection to the database
    ///
    /// Only use this in synchronous, single-threaded contexts. In async
    /// functions use `connect_with_timeout()` to avoid SQLite thread-safety
    /// violations when the runtime moves futures between threads.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get an async connection with busy timeout configured
    ///
    /// The safe default for async code: the 5s busy timeout makes concurrent
    /// operations wait and retry instead of failing immediately when the
    /// database is locked.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        // Foreign keys are per-connection in SQLite; the embeddings cascade
        // depends on them.
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;
        Ok(conn)
    }

    //
    // TASK STORE OPERATIONS
    // Raw SQL primitives wrapped by TaskService.
    //

    /// Insert a task row
    pub async fn db_create_task(&self, task: &Task) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute(
            "INSERT INTO tasks (id, title, status, energy, interest, time_estimate, position_x, position_y)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                task.id.clone(),
                task.title.clone(),
                task.status.to_string(),
                task.energy,
                task.interest,
                task.time_estimate,
                task.position.x,
                task.position.y
            ],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert task: {}", e)))?;
        Ok(())
    }

    /// Fetch a single task row by id
    pub async fn db_get_task(&self, id: &str) -> Result<Option<libsql::Row>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(
                "SELECT id, title, status, energy, interest, time_estimate,
                        position_x, position_y, created_at, modified_at
                 FROM tasks WHERE id = ?",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare task query: {}", e))
            })?;
        let mut rows = stmt
            .query(params![id])
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to query task: {}", e)))?;
        rows.next()
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to fetch task row: {}", e)))
    }

    /// Fetch all task rows in insertion order
    pub async fn db_list_tasks(&self) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(
                "SELECT id, title, status, energy, interest, time_estimate,
                        position_x, position_y, created_at, modified_at
                 FROM tasks ORDER BY rowid ASC",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare task list query: {}", e))
            })?;
        stmt.query(())
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to list tasks: {}", e)))
    }

    /// Update a task's phase-1 fields; returns affected row count
    pub async fn db_update_task_fields(
        &self,
        id: &str,
        update: &TaskUpdate,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute(
            "UPDATE tasks
             SET title = ?, energy = ?, interest = ?, time_estimate = ?,
                 modified_at = CURRENT_TIMESTAMP
             WHERE id = ?",
            params![
                update.title.clone(),
                update.energy,
                update.interest,
                update.time_estimate,
                id
            ],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to update task: {}", e)))
    }

    /// Set a task's status; returns affected row count
    pub async fn db_set_status(&self, id: &str, status: &str) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute(
            "UPDATE tasks SET status = ?, modified_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![status, id],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to set task status: {}", e)))
    }

    /// Set a task's canvas position; returns affected row count
    pub async fn db_set_position(&self, id: &str, x: f64, y: f64) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute(
            "UPDATE tasks SET position_x = ?, position_y = ?, modified_at = CURRENT_TIMESTAMP
             WHERE id = ?",
            params![x, y, id],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to set task position: {}", e)))
    }

    /// Delete a task row (the embeddings cascade removes its vector);
    /// returns affected row count
    pub async fn db_delete_task(&self, id: &str) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute("DELETE FROM tasks WHERE id = ?", params![id])
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete task: {}", e)))
    }

    //
    // EMBEDDING STORE OPERATIONS
    // Raw SQL primitives wrapped by SimilarityService.
    //

    /// Upsert a task's embedding: exactly one row per task, last write wins
    pub async fn db_upsert_embedding(
        &self,
        task_id: &str,
        content_hash: &str,
        vector_blob: Vec<u8>,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute(
            "INSERT INTO embeddings (task_id, content_hash, vector)
             VALUES (?, ?, ?)
             ON CONFLICT (task_id) DO UPDATE SET
                 content_hash = excluded.content_hash,
                 vector = excluded.vector,
                 modified_at = CURRENT_TIMESTAMP",
            params![task_id, content_hash, vector_blob],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to upsert embedding: {}", e)))?;
        Ok(())
    }

    /// Fetch a task's embedding row
    pub async fn db_get_embedding(
        &self,
        task_id: &str,
    ) -> Result<Option<libsql::Row>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(
                "SELECT task_id, content_hash, vector, created_at, modified_at
                 FROM embeddings WHERE task_id = ?",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare embedding query: {}", e))
            })?;
        let mut rows = stmt.query(params![task_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query embedding: {}", e))
        })?;
        rows.next().await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to fetch embedding row: {}", e))
        })
    }

    /// Fetch similarity candidates: every task other than `exclude_task_id`
    /// that has a stored embedding and is not done, in insertion (rowid)
    /// order so downstream tie-breaking is deterministic.
    pub async fn db_fetch_candidates(
        &self,
        exclude_task_id: &str,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(
                "SELECT t.id, t.title, t.position_x, t.position_y, e.vector
                 FROM embeddings e
                 JOIN tasks t ON t.id = e.task_id
                 WHERE e.task_id != ?
                   AND t.status != 'done'
                 ORDER BY t.rowid ASC",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare candidate query: {}", e))
            })?;
        stmt.query(params![exclude_task_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query candidates: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_new_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("dirs").join("test.db");
        let service = DatabaseService::new(db_path.clone()).await.unwrap();
        assert!(db_path.exists());
        drop(service);
    }

    #[tokio::test]
    async fn test_schema_init_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let first = DatabaseService::new(db_path.clone()).await.unwrap();
        drop(first);
        // Re-opening an existing file must not fail
        let _second = DatabaseService::new(db_path).await.unwrap();
    }
}
