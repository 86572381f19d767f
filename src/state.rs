use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::TaskService;

#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskService,
    pub pool: Arc<SqlitePool>,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_atomic_writes(pool, false)
    }

    pub fn with_atomic_writes(pool: SqlitePool, atomic_writes: bool) -> Self {
        let pool = Arc::new(pool);
        Self {
            tasks: TaskService::new(pool.clone(), atomic_writes),
            pool,
        }
    }
}
