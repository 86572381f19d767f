use utoipa::OpenApi;

use crate::error::ErrorBody;
use crate::handlers::{self, tasks::DeleteResponse};
use crate::models::{NewTask, Tag, TaskChanges, TaskResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::tasks::list_tasks,
        handlers::tasks::create_task,
        handlers::tasks::get_task,
        handlers::tasks::update_task,
        handlers::tasks::delete_task,
        handlers::tasks::toggle_task,
        handlers::tags::list_tags
    ),
    components(schemas(TaskResponse, NewTask, TaskChanges, Tag, ErrorBody, DeleteResponse)),
    tags(
        (name = "Tasks", description = "Task lifecycle and tag assignment"),
        (name = "Tags", description = "Tag catalogue")
    )
)]
pub struct ApiDoc;
