//! Task repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use caseflow_core::{
    CreateTaskRequest, Error, Result, Task, TaskPriority, TaskRepository, TaskStatus,
    UpdateTaskRequest,
};

/// PostgreSQL implementation of TaskRepository.
#[derive(Clone)]
pub struct PgTaskRepository {
    pool: Pool<Postgres>,
}

impl PgTaskRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn status_to_str(status: TaskStatus) -> &'static str {
        match status {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    fn str_to_status(s: &str) -> TaskStatus {
        match s {
            "in_progress" => TaskStatus::InProgress,
            "done" => TaskStatus::Done,
            "cancelled" => TaskStatus::Cancelled,
            _ => TaskStatus::Todo,
        }
    }

    fn priority_to_str(priority: TaskPriority) -> &'static str {
        match priority {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }

    fn str_to_priority(s: &str) -> TaskPriority {
        match s {
            "low" => TaskPriority::Low,
            "high" => TaskPriority::High,
            "urgent" => TaskPriority::Urgent,
            _ => TaskPriority::Medium,
        }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Task {
        Task {
            id: row.get("id"),
            org_id: row.get("org_id"),
            case_id: row.get("case_id"),
            project_id: row.get("project_id"),
            parent_id: row.get("parent_id"),
            title: row.get("title"),
            status: Self::str_to_status(row.get("status")),
            priority: Self::str_to_priority(row.get("priority")),
            due_date: row.get("due_date"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

const TASK_COLUMNS: &str = "id, org_id, case_id, project_id, parent_id, title, status, priority, \
                            due_date, created_at, updated_at";

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn create(&self, org_id: Uuid, req: CreateTaskRequest) -> Result<Task> {
        let now = Utc::now();
        let priority = req.priority.unwrap_or(TaskPriority::Medium);

        let row = sqlx::query(&format!(
            "INSERT INTO tasks (id, org_id, case_id, project_id, parent_id, title, status, priority, due_date, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'todo', $7, $8, $9, $9)
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(org_id)
        .bind(req.case_id)
        .bind(req.project_id)
        .bind(req.parent_id)
        .bind(&req.title)
        .bind(Self::priority_to_str(priority))
        .bind(req.due_date)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_row(row))
    }

    async fn get(&self, org_id: Uuid, id: Uuid) -> Result<Option<Task>> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn list(&self, org_id: Uuid, case_id: Option<Uuid>, limit: i64) -> Result<Vec<Task>> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE org_id = $1 AND ($2::uuid IS NULL OR case_id = $2)
             ORDER BY created_at DESC LIMIT $3"
        ))
        .bind(org_id)
        .bind(case_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn update(&self, org_id: Uuid, id: Uuid, req: UpdateTaskRequest) -> Result<Option<Task>> {
        let row = sqlx::query(&format!(
            "UPDATE tasks SET
                 title = COALESCE($3, title),
                 status = COALESCE($4, status),
                 priority = COALESCE($5, priority),
                 due_date = COALESCE($6, due_date),
                 updated_at = $7
             WHERE org_id = $1 AND id = $2
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(&req.title)
        .bind(req.status.map(Self::status_to_str))
        .bind(req.priority.map(Self::priority_to_str))
        .bind(req.due_date)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_conversion_roundtrip() {
        for status in [
            TaskStatus::Todo,
            TaskStatus::InProgress,
            TaskStatus::Done,
            TaskStatus::Cancelled,
        ] {
            let s = PgTaskRepository::status_to_str(status);
            assert_eq!(PgTaskRepository::str_to_status(s), status);
        }
    }

    #[test]
    fn test_priority_conversion_roundtrip() {
        for priority in [
            TaskPriority::Low,
            TaskPriority::Medium,
            TaskPriority::High,
            TaskPriority::Urgent,
        ] {
            let s = PgTaskRepository::priority_to_str(priority);
            assert_eq!(PgTaskRepository::str_to_priority(s), priority);
        }
    }
}
