pub mod tag;
pub mod task;

pub use tag::TagRepository;
pub use task::TaskRepository;
