use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /tasks`. A `complete` field, if sent, is ignored: new tasks
/// always start incomplete.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Body of `PUT /tasks/{id}`. `tags: None` leaves the tag set alone, while
/// `tags: Some(vec![])` clears it. `description` tells an absent field
/// (`None`) apart from an explicit `null` (`Some(None)`), which clears it.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TaskChanges {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub complete: Option<bool>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TaskFilter {
    pub complete: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// Marks a field that appeared in the body, even as `null`.
fn present<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl Task {
    pub fn into_response(self, tags: Vec<String>) -> TaskResponse {
        TaskResponse {
            id: self.id,
            title: self.title,
            description: self.description,
            complete: self.complete,
            created_at: self.created_at,
            updated_at: self.updated_at,
            tags,
        }
    }
}

impl NewTask {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("Task title is required".to_string()));
        }
        validate_tag_names(&self.tags)
    }
}

impl TaskChanges {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(AppError::Validation(
                    "Task title cannot be empty".to_string(),
                ));
            }
        }
        match &self.tags {
            Some(tags) => validate_tag_names(tags),
            None => Ok(()),
        }
    }
}

fn validate_tag_names(tags: &[String]) -> Result<()> {
    if tags.iter().any(|t| t.trim().is_empty()) {
        return Err(AppError::Validation(
            "Tag names cannot be empty".to_string(),
        ));
    }
    Ok(())
}
