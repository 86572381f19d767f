use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A `(task_id, tag name)` pair produced by joining `task_tags` with `tags`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskTagName {
    pub task_id: Uuid,
    pub name: String,
}
