pub mod tag_sync;
pub mod tasks;

pub use tag_sync::TagSynchronizer;
pub use tasks::{TaskService, TaskWrite};
