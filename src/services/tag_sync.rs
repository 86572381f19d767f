use sqlx::SqliteConnection;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::Tag;
use crate::repo::TagRepository;

/// Keeps a task's tag links in line with a list of tag names, creating tags
/// on first use.
#[derive(Clone)]
pub struct TagSynchronizer {
    tags: TagRepository,
}

impl TagSynchronizer {
    pub fn new(tags: TagRepository) -> Self {
        Self { tags }
    }

    /// Maps every name to a tag id, inserting the tags that do not exist yet.
    ///
    /// A name that shows up between our lookup and our insert is picked up by
    /// a second lookup instead of failing the write.
    pub async fn resolve(
        &self,
        conn: &mut SqliteConnection,
        names: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, Uuid>> {
        let mut resolved: BTreeMap<String, Uuid> = self
            .tags
            .find_by_names(conn, names)
            .await?
            .into_iter()
            .map(|tag| (tag.name, tag.id))
            .collect();

        let existing = resolved.len();
        let missing: Vec<&String> = names
            .iter()
            .filter(|name| !resolved.contains_key(*name))
            .collect();

        for name in missing {
            let tag = self.create_or_fetch(conn, name).await?;
            resolved.insert(tag.name, tag.id);
        }

        tracing::debug!(
            existing,
            created = resolved.len() - existing,
            "Resolved tag names"
        );

        Ok(resolved)
    }

    /// Inserts `name`, or returns the row another writer inserted first.
    async fn create_or_fetch(&self, conn: &mut SqliteConnection, name: &str) -> Result<Tag> {
        if let Some(tag) = self.tags.insert_if_absent(conn, name).await? {
            return Ok(tag);
        }

        tracing::debug!(name, "Tag created concurrently, reusing it");
        self.tags.find_by_name(conn, name).await?.ok_or_else(|| {
            AppError::Internal(format!("Tag {:?} conflicted but cannot be found", name))
        })
    }

    /// Links a freshly created task to the named tags.
    pub async fn attach(
        &self,
        conn: &mut SqliteConnection,
        task_id: Uuid,
        desired: &[String],
    ) -> Result<()> {
        let names: BTreeSet<String> = desired.iter().cloned().collect();
        if names.is_empty() {
            return Ok(());
        }

        let resolved = self.resolve(conn, &names).await?;
        for tag_id in resolved.values() {
            self.tags.link(conn, task_id, *tag_id).await?;
        }

        Ok(())
    }

    /// Drops every existing link of the task, then links it to `desired`.
    /// An empty list leaves the task without tags.
    pub async fn replace(
        &self,
        conn: &mut SqliteConnection,
        task_id: Uuid,
        desired: &[String],
    ) -> Result<()> {
        self.tags.unlink_all(conn, task_id).await?;
        self.attach(conn, task_id, desired).await
    }
}
