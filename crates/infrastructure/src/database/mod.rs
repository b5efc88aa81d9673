pub mod manager;
pub mod query_builder;
pub mod sqlite;

pub use manager::DatabaseManager;
pub use query_builder::{QueryBuilder, SqlParam};
pub use sqlite::SqliteJobRepository;
