//! Comprehensive tests for TaskService
//!
//! Tests cover:
//! - Create/get roundtrip and placeholder position bounds
//! - Listing in creation order
//! - Field updates, status and position writes
//! - Deletion and not-found errors

#[cfg(test)]
mod tests {
    use crate::db::DatabaseService;
    use crate::models::{NewTask, Position, TaskStatus, TaskUpdate};
    use crate::services::error::TaskServiceError;
    use crate::services::TaskService;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Helper to create a test service
    /// Returns (service, _temp_dir) - temp_dir must be kept alive for test
    /// duration
    async fn create_test_service() -> (TaskService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(DatabaseService::new(db_path).await.unwrap());
        (TaskService::new(db), temp_dir)
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let (service, _temp_dir) = create_test_service().await;

        let mut new_task = NewTask::new("Water plants");
        new_task.energy = 2;
        new_task.interest = 3;
        new_task.time_estimate = 15;

        let created = service.create_task(new_task).await.unwrap();
        let fetched = service.get_task(&created.id).await.unwrap();

        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.title, "Water plants");
        assert_eq!(fetched.status, TaskStatus::Todo);
        assert_eq!(fetched.energy, 2);
        assert_eq!(fetched.interest, 3);
        assert_eq!(fetched.time_estimate, 15);
        assert_eq!(fetched.position, created.position);
    }

    #[tokio::test]
    async fn test_placeholder_position_in_bounds() {
        let (service, _temp_dir) = create_test_service().await;
        for i in 0..20 {
            let task = service
                .create_task(NewTask::new(format!("Task {}", i)))
                .await
                .unwrap();
            assert!((0.0..500.0).contains(&task.position.x));
            assert!((0.0..500.0).contains(&task.position.y));
        }
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let (service, _temp_dir) = create_test_service().await;
        assert!(matches!(
            service.create_task(NewTask::new("")).await,
            Err(TaskServiceError::InvalidTask(_))
        ));
        assert!(matches!(
            service.create_task(NewTask::new("   ")).await,
            Err(TaskServiceError::InvalidTask(_))
        ));
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let (service, _temp_dir) = create_test_service().await;
        let a = service.create_task(NewTask::new("first")).await.unwrap();
        let b = service.create_task(NewTask::new("second")).await.unwrap();
        let c = service.create_task(NewTask::new("third")).await.unwrap();

        let tasks = service.list_tasks().await.unwrap();
        let ids: Vec<_> = tasks.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn test_update_task_fields() {
        let (service, _temp_dir) = create_test_service().await;
        let task = service.create_task(NewTask::new("Old title")).await.unwrap();

        let updated = service
            .update_task(
                &task.id,
                TaskUpdate {
                    title: "New title".to_string(),
                    energy: 5,
                    interest: 1,
                    time_estimate: 90,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "New title");
        assert_eq!(updated.energy, 5);
        assert_eq!(updated.time_estimate, 90);
        // Update never touches position or status
        assert_eq!(updated.position, task.position);
        assert_eq!(updated.status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_update_missing_task_fails() {
        let (service, _temp_dir) = create_test_service().await;
        let result = service
            .update_task(
                "no-such-id",
                TaskUpdate {
                    title: "x".to_string(),
                    energy: 0,
                    interest: 0,
                    time_estimate: 0,
                },
            )
            .await;
        assert!(matches!(result, Err(TaskServiceError::TaskNotFound { .. })));
    }

    #[tokio::test]
    async fn test_set_status_and_position() {
        let (service, _temp_dir) = create_test_service().await;
        let task = service.create_task(NewTask::new("Movable")).await.unwrap();

        service.set_status(&task.id, TaskStatus::Done).await.unwrap();
        service
            .set_position(&task.id, Position::new(-12.5, 640.0))
            .await
            .unwrap();

        let reloaded = service.get_task(&task.id).await.unwrap();
        assert_eq!(reloaded.status, TaskStatus::Done);
        assert_eq!(reloaded.position, Position::new(-12.5, 640.0));
    }

    #[tokio::test]
    async fn test_delete_task() {
        let (service, _temp_dir) = create_test_service().await;
        let task = service.create_task(NewTask::new("Doomed")).await.unwrap();

        service.delete_task(&task.id).await.unwrap();
        assert!(matches!(
            service.get_task(&task.id).await,
            Err(TaskServiceError::TaskNotFound { .. })
        ));
        assert!(matches!(
            service.delete_task(&task.id).await,
            Err(TaskServiceError::TaskNotFound { .. })
        ));
    }
}
