pub mod config;
pub mod errors;
pub mod logging;

pub use config::*;
pub use errors::*;
pub use logging::LogLevel;

/// Unified result type
pub type JoblessResult<T> = std::result::Result<T, JoblessError>;
