use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use task_tracker::{config::Config, connect, create_router, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "task_tracker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = connect(&config).await?;

    let state = AppState::with_atomic_writes(pool, config.atomic_writes);

    let app = create_router(state);

    let addr = config.addr();
    tracing::info!(atomic_writes = config.atomic_writes, "Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
