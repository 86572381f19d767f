use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Tag, TaskTagName};

/// Access to the `tags` table and the `task_tags` join table.
///
/// Methods that take a `SqliteConnection` are the write half used inside a
/// task write; they run on whatever connection (or transaction) the caller
/// hands in. The rest read straight from the pool.
#[derive(Clone)]
pub struct TagRepository {
    pool: Arc<SqlitePool>,
}

impl TagRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    pub async fn find_by_names(
        &self,
        conn: &mut SqliteConnection,
        names: &BTreeSet<String>,
    ) -> Result<Vec<Tag>> {
        if names.is_empty() {
            return Ok(vec![]);
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM tags WHERE name IN (");
        let mut separated = query.separated(", ");
        for name in names {
            separated.push_bind(name.clone());
        }
        separated.push_unseparated(")");

        let tags = query.build_query_as::<Tag>().fetch_all(&mut *conn).await?;

        Ok(tags)
    }

    pub async fn find_by_name(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
    ) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(tag)
    }

    /// Inserts a tag unless one with the same name already exists.
    ///
    /// Returns `None` when the name was taken, which happens when another
    /// writer created it after our lookup.
    pub async fn insert_if_absent(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
    ) -> Result<Option<Tag>> {
        let id = Uuid::new_v4();

        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (id, name, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT(name) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(tag)
    }

    pub async fn link(
        &self,
        conn: &mut SqliteConnection,
        task_id: Uuid,
        tag_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO task_tags (task_id, tag_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT(task_id, tag_id) DO NOTHING
            "#,
        )
        .bind(task_id)
        .bind(tag_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Removes every link for a task. Tags themselves are kept.
    pub async fn unlink_all(&self, conn: &mut SqliteConnection, task_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM task_tags WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn names_for_task(&self, task_id: Uuid) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT t.name FROM tags t
            INNER JOIN task_tags tt ON t.id = tt.tag_id
            WHERE tt.task_id = $1
            ORDER BY t.name ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(names)
    }

    pub async fn names_for_all_tasks(&self) -> Result<Vec<TaskTagName>> {
        let rows = sqlx::query_as::<_, TaskTagName>(
            r#"
            SELECT tt.task_id, t.name FROM task_tags tt
            INNER JOIN tags t ON t.id = tt.tag_id
            ORDER BY t.name ASC
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    pub async fn list(&self) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY name ASC")
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(tags)
    }
}
