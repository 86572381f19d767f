use axum::{extract::State, Json};

use crate::error::Result;
use crate::models::Tag;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/tags",
    tag = "Tags",
    responses((status = 200, description = "Every tag ever used, by name", body = [Tag]))
)]
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>> {
    let tags = state.tasks.list_tags().await?;
    Ok(Json(tags))
}
