//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Table names are unqualified;
//! the pool's `search_path` points them at the configured schema.

pub mod annotation_queue_repo;
pub mod annotation_repo;
pub mod game_repo;
pub mod image_repo;
pub mod user_repo;

pub use annotation_queue_repo::AnnotationQueueRepo;
pub use annotation_repo::AnnotationRepo;
pub use game_repo::GameRepo;
pub use image_repo::ImageRepo;
pub use user_repo::UserRepo;
