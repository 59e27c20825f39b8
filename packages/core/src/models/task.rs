//! Task Model
//!
//! A task is a short note the user places on a freeform 2D canvas. The
//! engine only derives data from `title`; `status` gates similarity
//! candidacy; `position` is owned by the application but written back by
//! layout placement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Task status
///
/// Maps to string values in the `status` column. `Done` tasks are excluded
/// from every similarity result set, both as query subjects and candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task not yet completed (default)
    Todo,
    /// Task completed
    Done,
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "done" => Ok(Self::Done),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// A point on the unbounded 2D canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Task record as stored in the `tasks` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (UUID v4), stable for the task's lifetime
    pub id: String,

    /// Task text; the only field fed into embedding
    pub title: String,

    /// Completion status
    pub status: TaskStatus,

    /// Energy rating (application-owned scalar, never embedded)
    pub energy: i64,

    /// Interest rating (application-owned scalar, never embedded)
    pub interest: i64,

    /// Time estimate in minutes (application-owned scalar, never embedded)
    pub time_estimate: i64,

    /// Canvas position; mutable, written by layout placement
    pub position: Position,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last modified
    pub modified_at: DateTime<Utc>,
}

/// Parameters for creating a new task (phase-1 fields only)
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub energy: i64,
    pub interest: i64,
    pub time_estimate: i64,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            energy: 0,
            interest: 0,
            time_estimate: 0,
        }
    }
}

/// Full phase-1 field set for a task edit
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub title: String,
    pub energy: i64,
    pub interest: i64,
    pub time_estimate: i64,
}

impl Task {
    /// Construct a fresh task with a generated id and the given placeholder
    /// position. Timestamps are set to now; the database mirrors them with
    /// CURRENT_TIMESTAMP defaults.
    pub fn new(new_task: NewTask, position: Position) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: new_task.title,
            status: TaskStatus::Todo,
            energy: new_task.energy,
            interest: new_task.interest,
            time_estimate: new_task.time_estimate,
            position,
            created_at: now,
            modified_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        assert_eq!("todo".parse::<TaskStatus>().unwrap(), TaskStatus::Todo);
        assert_eq!("done".parse::<TaskStatus>().unwrap(), TaskStatus::Done);
        assert_eq!(TaskStatus::Todo.to_string(), "todo");
        assert_eq!(TaskStatus::Done.to_string(), "done");
    }

    #[test]
    fn test_status_rejects_unknown() {
        assert!("completed".parse::<TaskStatus>().is_err());
        assert!("DONE".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_new_task_defaults() {
        let task = Task::new(NewTask::new("Buy milk"), Position::new(10.0, 20.0));
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.position, Position::new(10.0, 20.0));
        assert_eq!(task.energy, 0);
        assert!(!task.id.is_empty());
    }

    #[test]
    fn test_new_tasks_get_distinct_ids() {
        let a = Task::new(NewTask::new("a"), Position::new(0.0, 0.0));
        let b = Task::new(NewTask::new("b"), Position::new(0.0, 0.0));
        assert_ne!(a.id, b.id);
    }
}
