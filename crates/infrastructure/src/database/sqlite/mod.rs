pub mod sqlite_job_repository;
pub mod sqlite_log_line_repository;
pub mod sqlite_worker_repository;

pub use sqlite_job_repository::SqliteJobRepository;
pub use sqlite_log_line_repository::SqliteLogLineRepository;
pub use sqlite_worker_repository::SqliteWorkerRepository;
