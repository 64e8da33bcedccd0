pub mod error;
pub mod pool;
pub mod repositories;

pub use pool::DatabasePool;
