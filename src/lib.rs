// src/lib.rs

pub mod cache;
pub mod config;
pub mod copy;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod sort;
pub mod storage;
pub mod store;
pub mod translate;

// Re-export specific items for convenience if needed
pub use cache::RequestCache;
pub use config::StoreConfig;
pub use copy::{ContentMatcher, CopiedQuestion, CopySpec, QuestionMatcher};
pub use error::StorageError;
pub use models::pool::{Pool, PoolCounts};
pub use models::question::{Attribution, Question};
pub use sort::{QuestionSort, paginate};
pub use storage::QuestionStorage;
pub use store::{Arg, RecordStore, UnitOfWork};
pub use translate::Translation;
