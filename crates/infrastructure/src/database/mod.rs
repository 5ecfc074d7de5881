pub mod manager;
pub mod sqlite;

pub use manager::DatabaseManager;
pub use sqlite::{SqliteJobRepository, SqliteLogLineRepository, SqliteWorkerRepository};
