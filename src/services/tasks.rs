use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{NewTask, Tag, TaskChanges, TaskFilter, TaskResponse};
use crate::repo::{TagRepository, TaskRepository};
use crate::services::TagSynchronizer;

/// A single change to a task and its tag links.
#[derive(Debug, Clone)]
pub enum TaskWrite {
    Create(NewTask),
    Update { id: Uuid, changes: TaskChanges },
    Toggle(Uuid),
    Delete(Uuid),
}

#[derive(Clone)]
pub struct TaskService {
    pool: Arc<SqlitePool>,
    tasks: TaskRepository,
    tags: TagRepository,
    sync: TagSynchronizer,
    atomic_writes: bool,
}

impl TaskService {
    pub fn new(pool: Arc<SqlitePool>, atomic_writes: bool) -> Self {
        let tags = TagRepository::new(pool.clone());
        Self {
            tasks: TaskRepository::new(pool.clone()),
            sync: TagSynchronizer::new(tags.clone()),
            tags,
            pool,
            atomic_writes,
        }
    }

    /// Runs one task write as a unit.
    ///
    /// With atomic writes enabled every step shares a transaction and a
    /// failure rolls all of them back. Otherwise each statement commits on its
    /// own and a failure part way leaves the earlier steps in place.
    ///
    /// Returns the id of the task written, or `None` if it does not exist.
    pub async fn apply_write(&self, write: TaskWrite) -> Result<Option<Uuid>> {
        if self.atomic_writes {
            let mut tx = self.pool.begin().await?;
            let written = self.run_write(&mut *tx, write).await?;
            tx.commit().await?;
            Ok(written)
        } else {
            let mut conn = self.pool.acquire().await?;
            self.run_write(&mut *conn, write).await
        }
    }

    async fn run_write(
        &self,
        conn: &mut SqliteConnection,
        write: TaskWrite,
    ) -> Result<Option<Uuid>> {
        match write {
            TaskWrite::Create(input) => {
                let task = self
                    .tasks
                    .create(conn, &input.title, input.description.as_deref())
                    .await?;
                self.sync.attach(conn, task.id, &input.tags).await?;

                tracing::info!(task_id = %task.id, tags = input.tags.len(), "Created task");
                Ok(Some(task.id))
            }
            TaskWrite::Update { id, changes } => {
                let updated = self
                    .tasks
                    .update(
                        conn,
                        id,
                        changes.title.as_deref(),
                        changes.description.as_ref().map(|d| d.as_deref()),
                        changes.complete,
                    )
                    .await?;

                if updated.is_none() {
                    return Ok(None);
                }

                if let Some(tags) = &changes.tags {
                    self.sync.replace(conn, id, tags).await?;
                }

                tracing::info!(task_id = %id, retagged = changes.tags.is_some(), "Updated task");
                Ok(Some(id))
            }
            TaskWrite::Toggle(id) => {
                let toggled = self.tasks.toggle_complete(conn, id).await?;
                Ok(toggled.map(|task| task.id))
            }
            TaskWrite::Delete(id) => {
                self.tags.unlink_all(conn, id).await?;
                let deleted = self.tasks.delete(conn, id).await?;

                tracing::info!(task_id = %id, deleted, "Deleted task");
                Ok(Some(id))
            }
        }
    }

    /// Loads a task with its tag names, or `None` if it does not exist.
    pub async fn load(&self, id: Uuid) -> Result<Option<TaskResponse>> {
        let Some(task) = self.tasks.find_by_id(id).await? else {
            return Ok(None);
        };

        let tags = self.tags.names_for_task(task.id).await?;
        Ok(Some(task.into_response(tags)))
    }

    pub async fn get(&self, id: Uuid) -> Result<TaskResponse> {
        self.load(id).await?.ok_or(AppError::NotFound)
    }

    /// All tasks, newest first, each with its tag names.
    pub async fn list(&self, filter: TaskFilter) -> Result<Vec<TaskResponse>> {
        let tasks = self.tasks.list(filter).await?;

        let mut tags_by_task: HashMap<Uuid, Vec<String>> = HashMap::new();
        for row in self.tags.names_for_all_tasks().await? {
            tags_by_task.entry(row.task_id).or_default().push(row.name);
        }

        Ok(tasks
            .into_iter()
            .map(|task| {
                let tags = tags_by_task.remove(&task.id).unwrap_or_default();
                task.into_response(tags)
            })
            .collect())
    }

    pub async fn create(&self, input: NewTask) -> Result<TaskResponse> {
        let id = self
            .apply_write(TaskWrite::Create(input))
            .await?
            .ok_or(AppError::NotFound)?;
        self.get(id).await
    }

    pub async fn update(&self, id: Uuid, changes: TaskChanges) -> Result<TaskResponse> {
        let id = self
            .apply_write(TaskWrite::Update { id, changes })
            .await?
            .ok_or(AppError::NotFound)?;
        self.get(id).await
    }

    pub async fn toggle(&self, id: Uuid) -> Result<TaskResponse> {
        let id = self
            .apply_write(TaskWrite::Toggle(id))
            .await?
            .ok_or(AppError::NotFound)?;
        self.get(id).await
    }

    /// Deletes a task and its links. Deleting an unknown id is not an error.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.apply_write(TaskWrite::Delete(id)).await?;
        Ok(())
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        self.tags.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_pool;
    use std::collections::BTreeSet;

    async fn service(atomic_writes: bool) -> TaskService {
        let pool = create_test_pool().await;
        TaskService::new(Arc::new(pool), atomic_writes)
    }

    fn new_task(title: &str, tags: &[&str]) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn tag_set(task: &TaskResponse) -> BTreeSet<String> {
        task.tags.iter().cloned().collect()
    }

    async fn link_count(service: &TaskService, task_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM task_tags WHERE task_id = $1")
            .bind(task_id)
            .fetch_one(service.pool.as_ref())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_dedups_tags() {
        let service = service(false).await;

        let task = service
            .create(new_task("Groceries", &["food", "home", "food", "home"]))
            .await
            .unwrap();

        assert_eq!(task.tags.len(), 2);
        assert_eq!(
            tag_set(&task),
            BTreeSet::from(["food".to_string(), "home".to_string()])
        );
        assert!(!task.complete);
    }

    #[tokio::test]
    async fn test_shared_tag_names_reuse_one_row() {
        let service = service(false).await;

        service.create(new_task("One", &["shared"])).await.unwrap();
        service.create(new_task("Two", &["shared", "other"])).await.unwrap();

        let tags = service.list_tags().await.unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["other", "shared"]);
    }

    #[tokio::test]
    async fn test_update_with_empty_tags_clears_them() {
        let service = service(false).await;
        let task = service.create(new_task("Clean", &["a", "b"])).await.unwrap();

        let updated = service
            .update(
                task.id,
                TaskChanges {
                    tags: Some(vec![]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(updated.tags.is_empty());
        assert_eq!(link_count(&service, task.id).await, 0);
    }

    #[tokio::test]
    async fn test_update_without_tags_keeps_them() {
        let service = service(false).await;
        let task = service.create(new_task("Read", &["books"])).await.unwrap();

        let updated = service
            .update(
                task.id,
                TaskChanges {
                    title: Some("Read more".to_string()),
                    complete: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Read more");
        assert!(updated.complete);
        assert_eq!(updated.tags, vec!["books".to_string()]);
    }

    #[tokio::test]
    async fn test_update_replaces_tag_set() {
        let service = service(false).await;
        let task = service.create(new_task("Plan", &["x", "y"])).await.unwrap();

        let updated = service
            .update(
                task.id,
                TaskChanges {
                    tags: Some(vec!["y".to_string(), "z".to_string(), "z".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(
            tag_set(&updated),
            BTreeSet::from(["y".to_string(), "z".to_string()])
        );
    }

    #[tokio::test]
    async fn test_update_clears_description_only_when_null() {
        let service = service(false).await;
        let task = service
            .create(NewTask {
                title: "Write".to_string(),
                description: Some("draft".to_string()),
                tags: vec![],
            })
            .await
            .unwrap();

        let kept = service
            .update(
                task.id,
                TaskChanges {
                    title: Some("Write more".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(kept.description.as_deref(), Some("draft"));

        let cleared = service
            .update(
                task.id,
                TaskChanges {
                    description: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.description, None);
        assert_eq!(cleared.title, "Write more");
    }

    #[tokio::test]
    async fn test_missing_task_is_not_found() {
        let service = service(false).await;
        let id = Uuid::new_v4();

        assert!(service.load(id).await.unwrap().is_none());
        assert!(matches!(service.get(id).await, Err(AppError::NotFound)));
        assert!(matches!(
            service.update(id, TaskChanges::default()).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(service.toggle(id).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_of_missing_task_creates_no_tags() {
        let service = service(false).await;

        let result = service
            .update(
                Uuid::new_v4(),
                TaskChanges {
                    tags: Some(vec!["ghost".to_string()]),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound)));
        assert!(service.list_tags().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_flips_completion() {
        let service = service(false).await;
        let task = service.create(new_task("Toggle me", &[])).await.unwrap();

        let once = service.toggle(task.id).await.unwrap();
        assert!(once.complete);

        let twice = service.toggle(task.id).await.unwrap();
        assert!(!twice.complete);
    }

    #[tokio::test]
    async fn test_delete_removes_links_but_keeps_tags() {
        let service = service(false).await;
        let task = service.create(new_task("Gone", &["keep"])).await.unwrap();

        service.delete(task.id).await.unwrap();

        assert!(service.load(task.id).await.unwrap().is_none());
        assert_eq!(link_count(&service, task.id).await, 0);
        assert_eq!(service.list_tags().await.unwrap().len(), 1);

        let again = service.create(new_task("Reuse", &["keep"])).await.unwrap();
        assert_eq!(again.tags, vec!["keep".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_unknown_task_succeeds() {
        let service = service(false).await;
        assert!(service.delete(Uuid::new_v4()).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_filters() {
        let service = service(false).await;
        let first = service.create(new_task("First", &["a"])).await.unwrap();
        let second = service.create(new_task("Second", &[])).await.unwrap();
        service.toggle(first.id).await.unwrap();

        let all = service.list(TaskFilter::default()).await.unwrap();
        let ids: Vec<Uuid> = all.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(all[1].tags, vec!["a".to_string()]);

        let done = service
            .list(TaskFilter {
                complete: Some(true),
            })
            .await
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, first.id);

        let open = service
            .list(TaskFilter {
                complete: Some(false),
            })
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, second.id);
    }

    #[tokio::test]
    async fn test_atomic_writes_round_trip() {
        let service = service(true).await;

        let task = service.create(new_task("Atomic", &["t1", "t2"])).await.unwrap();
        assert_eq!(
            tag_set(&task),
            BTreeSet::from(["t1".to_string(), "t2".to_string()])
        );

        let updated = service
            .update(
                task.id,
                TaskChanges {
                    tags: Some(vec!["t2".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.tags, vec!["t2".to_string()]);

        service.delete(task.id).await.unwrap();
        assert!(service.load(task.id).await.unwrap().is_none());
    }

    fn failing_retag() -> TaskChanges {
        TaskChanges {
            title: Some("Changed".to_string()),
            tags: Some(vec!["fresh".to_string(), String::new()]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_atomic_write_rolls_back_on_failure() {
        let service = service(true).await;
        let task = service.create(new_task("Original", &["old"])).await.unwrap();

        let result = service.update(task.id, failing_retag()).await;
        assert!(matches!(result, Err(AppError::Database(_))));

        let reloaded = service.get(task.id).await.unwrap();
        assert_eq!(reloaded.title, "Original");
        assert_eq!(reloaded.tags, vec!["old".to_string()]);
    }

    #[tokio::test]
    async fn test_best_effort_write_keeps_completed_steps() {
        let service = service(false).await;
        let task = service.create(new_task("Original", &["old"])).await.unwrap();

        let result = service.update(task.id, failing_retag()).await;
        assert!(matches!(result, Err(AppError::Database(_))));

        let reloaded = service.get(task.id).await.unwrap();
        assert_eq!(reloaded.title, "Changed");
        assert!(reloaded.tags.is_empty());
    }
}
