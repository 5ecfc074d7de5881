//! Attributed application logging
//!
//! `LogSink` persists log lines tied to the worker that produced them;
//! `Logger` picks where a log call ends up (console, store or a callback).

pub mod log_sink;
pub mod logger;

pub use log_sink::LogSink;
pub use logger::{LogCallback, LogRecord, Logger};
