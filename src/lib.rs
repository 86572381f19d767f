pub mod config;
pub mod docs;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repo;
pub mod services;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::Config;
use docs::ApiDoc;
use state::AppState;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Task routes
        .route(
            "/tasks",
            get(handlers::tasks::list_tasks).post(handlers::tasks::create_task),
        )
        .route(
            "/tasks/{task_id}",
            get(handlers::tasks::get_task)
                .put(handlers::tasks::update_task)
                .delete(handlers::tasks::delete_task),
        )
        .route(
            "/tasks/{task_id}/toggle",
            post(handlers::tasks::toggle_task),
        )
        // Tag routes
        .route("/tags", get(handlers::tags::list_tags));

    Router::new()
        .nest("/api", api_routes)
        .merge(SwaggerUi::new("/api-docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Opens the pool and brings the schema up to date.
pub async fn connect(config: &Config) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

pub mod test_utils {
    use crate::state::AppState;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    pub async fn create_test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    pub async fn create_test_state() -> AppState {
        let pool = create_test_pool().await;
        AppState::new(pool)
    }

    pub async fn create_atomic_test_state() -> AppState {
        let pool = create_test_pool().await;
        AppState::with_atomic_writes(pool, true)
    }
}
