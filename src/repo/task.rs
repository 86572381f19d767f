use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Task, TaskFilter};

#[derive(Clone)]
pub struct TaskRepository {
    pool: Arc<SqlitePool>,
}

impl TaskRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Inserts a task. New tasks are always incomplete.
    pub async fn create(
        &self,
        conn: &mut SqliteConnection,
        title: &str,
        description: Option<&str>,
    ) -> Result<Task> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (id, title, description, complete, created_at, updated_at)
            VALUES ($1, $2, $3, 0, $4, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(task)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(task)
    }

    /// Newest first. `rowid` breaks ties between tasks created in the same
    /// instant.
    pub async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM tasks");

        if let Some(complete) = filter.complete {
            query.push(" WHERE complete = ");
            query.push_bind(complete);
        }

        query.push(" ORDER BY created_at DESC, rowid DESC");

        let tasks = query
            .build_query_as::<Task>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(tasks)
    }

    /// Applies the fields that are present and leaves the rest untouched.
    /// `description: Some(None)` clears the description.
    /// Returns `None` when no task has this id.
    pub async fn update(
        &self,
        conn: &mut SqliteConnection,
        id: Uuid,
        title: Option<&str>,
        description: Option<Option<&str>>,
        complete: Option<bool>,
    ) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET title = COALESCE($2, title),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                complete = COALESCE($5, complete),
                updated_at = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(description.is_some())
        .bind(description.flatten())
        .bind(complete)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(task)
    }

    pub async fn toggle_complete(
        &self,
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET complete = NOT complete,
                updated_at = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(task)
    }

    /// Deletes the task row. Its links must already be gone.
    pub async fn delete(&self, conn: &mut SqliteConnection, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}
