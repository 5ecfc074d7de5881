use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use jobless_core::{JoblessError, JoblessResult, LogLevel, LoggerSetting};
use jobless_domain::entities::ExceptionInfo;
use tracing::{debug, error, info, warn};

use super::LogSink;

/// What a custom callback receives for each log call
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub message: String,
    pub exception: Option<ExceptionInfo>,
}

pub type LogCallback = Arc<dyn Fn(LogLevel, &LogRecord) + Send + Sync>;

/// Application logging capability
#[derive(Clone)]
pub enum Logger {
    Console,
    Persistent(LogSink),
    Custom(LogCallback),
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logger::Console => f.write_str("Logger::Console"),
            Logger::Persistent(sink) => write!(f, "Logger::Persistent({})", sink.identity()),
            Logger::Custom(_) => f.write_str("Logger::Custom"),
        }
    }
}

impl Logger {
    /// Build the logger named by the configuration.
    ///
    /// `custom` is only consulted for `LoggerSetting::Custom`, which fails
    /// without it.
    pub fn from_setting(
        setting: LoggerSetting,
        sink: LogSink,
        custom: Option<LogCallback>,
    ) -> JoblessResult<Self> {
        match setting {
            LoggerSetting::Console => Ok(Logger::Console),
            LoggerSetting::Persistent => Ok(Logger::Persistent(sink)),
            LoggerSetting::Custom => custom.map(Logger::Custom).ok_or_else(|| {
                JoblessError::Configuration(
                    "logger is set to \"custom\" but no callback was registered".to_string(),
                )
            }),
        }
    }

    pub async fn log(&self, level: LogLevel, message: &str) -> JoblessResult<()> {
        trace_event(level, message, None);

        match self {
            Logger::Console => {
                let mut out = io::stdout().lock();
                write_console(&mut out, level, message)
            }
            Logger::Persistent(sink) => {
                match level {
                    LogLevel::Debug => sink.debug(message).await?,
                    LogLevel::Info => sink.info(message).await?,
                    LogLevel::Warn => sink.warn(message).await?,
                    LogLevel::Error => {
                        sink.emit(LogLevel::Error, message, sink.identity(), None)
                            .await?
                    }
                };
                Ok(())
            }
            Logger::Custom(callback) => {
                callback(
                    level,
                    &LogRecord {
                        message: message.to_string(),
                        exception: None,
                    },
                );
                Ok(())
            }
        }
    }

    pub async fn error(&self, err: &anyhow::Error) -> JoblessResult<()> {
        self.record_error(err, "Error").await
    }

    /// Error raised by a job handler
    pub async fn handler_failure(&self, err: &anyhow::Error) -> JoblessResult<()> {
        self.record_error(err, "HandlerFailure").await
    }

    pub async fn warn(&self, message: &str) -> JoblessResult<()> {
        self.log(LogLevel::Warn, message).await
    }

    pub async fn info(&self, message: &str) -> JoblessResult<()> {
        self.log(LogLevel::Info, message).await
    }

    pub async fn debug(&self, message: &str) -> JoblessResult<()> {
        self.log(LogLevel::Debug, message).await
    }

    async fn record_error(&self, err: &anyhow::Error, fallback_name: &str) -> JoblessResult<()> {
        match self {
            Logger::Persistent(sink) => {
                let name = err
                    .downcast_ref::<JoblessError>()
                    .map(|e| e.category())
                    .unwrap_or(fallback_name);
                trace_event(LogLevel::Error, &format!("{err:#}"), Some(name));
                sink.error(err, fallback_name).await?;
                Ok(())
            }
            Logger::Console => {
                let exception = ExceptionInfo::from_error(err, fallback_name);
                trace_event(LogLevel::Error, &exception.message, Some(&exception.name));
                let mut out = io::stdout().lock();
                write_console(&mut out, LogLevel::Error, &exception.message)
            }
            Logger::Custom(callback) => {
                let exception = ExceptionInfo::from_error(err, fallback_name);
                trace_event(LogLevel::Error, &exception.message, Some(&exception.name));
                callback(
                    LogLevel::Error,
                    &LogRecord {
                        message: exception.message.clone(),
                        exception: Some(exception),
                    },
                );
                Ok(())
            }
        }
    }
}

/// A closed stdout is reported as an error instead of panicking like `println!`.
fn write_console(out: &mut impl Write, level: LogLevel, message: &str) -> JoblessResult<()> {
    writeln!(out, "{}", console_line(level, message))
        .map_err(|e| JoblessError::Internal(format!("console logger failed to write: {e}")))
}

pub(crate) fn console_line(level: LogLevel, message: &str) -> String {
    format!("{level}: {message}")
}

fn trace_event(level: LogLevel, message: &str, exception: Option<&str>) {
    match level {
        LogLevel::Debug => debug!(exception, "{}", message),
        LogLevel::Info => info!(exception, "{}", message),
        LogLevel::Warn => warn!(exception, "{}", message),
        LogLevel::Error => error!(exception, "{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;
    use jobless_domain::entities::WorkerIdentity;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    async fn sink() -> (DatabaseManager, LogSink) {
        let manager = DatabaseManager::in_memory().await.unwrap();
        manager.migrate().await.unwrap();
        let sink = LogSink::new(
            manager.worker_repository(),
            manager.log_line_repository(),
            WorkerIdentity::new("box-1", 4242, "deposits"),
        );
        (manager, sink)
    }

    fn capturing_callback() -> (LogCallback, Arc<Mutex<Vec<(LogLevel, LogRecord)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let callback: LogCallback = Arc::new(move |level, record: &LogRecord| {
            captured.lock().unwrap().push((level, record.clone()));
        });
        (callback, seen)
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn test_console_line_format() {
        assert_eq!(console_line(LogLevel::Info, "hello"), "info: hello");
        assert_eq!(console_line(LogLevel::Error, "boom"), "error: boom");
    }

    #[test]
    fn test_console_write_appends_line() {
        let mut out = Vec::new();
        write_console(&mut out, LogLevel::Warn, "careful").unwrap();
        write_console(&mut out, LogLevel::Info, "done").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "warn: careful\ninfo: done\n");
    }

    #[test]
    fn test_console_write_to_closed_pipe_is_error() {
        let result = write_console(&mut ClosedPipe, LogLevel::Info, "Task finished");
        match result {
            Err(JoblessError::Internal(message)) => assert!(message.contains("console logger")),
            other => panic!("expected internal error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_custom_without_callback_is_configuration_error() {
        let (_manager, sink) = sink().await;
        let result = Logger::from_setting(LoggerSetting::Custom, sink, None);
        assert!(matches!(result, Err(JoblessError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_from_setting_picks_variant() {
        let (_manager, sink) = sink().await;
        let console = Logger::from_setting(LoggerSetting::Console, sink.clone(), None).unwrap();
        assert!(matches!(console, Logger::Console));

        let persistent =
            Logger::from_setting(LoggerSetting::Persistent, sink.clone(), None).unwrap();
        assert!(matches!(persistent, Logger::Persistent(_)));

        let (callback, _) = capturing_callback();
        let custom = Logger::from_setting(LoggerSetting::Custom, sink, Some(callback)).unwrap();
        assert!(matches!(custom, Logger::Custom(_)));
    }

    #[tokio::test]
    async fn test_custom_receives_level_and_record() {
        let (callback, seen) = capturing_callback();
        let logger = Logger::Custom(callback);

        logger.info("hello").await.unwrap();
        logger
            .handler_failure(&anyhow::anyhow!("disk full"))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, LogLevel::Info);
        assert_eq!(seen[0].1.message, "hello");
        assert!(seen[0].1.exception.is_none());

        assert_eq!(seen[1].0, LogLevel::Error);
        let exception = seen[1].1.exception.as_ref().unwrap();
        assert_eq!(exception.name, "HandlerFailure");
        assert_eq!(exception.message, "disk full");
    }

    #[tokio::test]
    async fn test_persistent_writes_log_lines() {
        let (manager, sink) = sink().await;
        let logger = Logger::Persistent(sink);

        logger.warn("careful").await.unwrap();
        logger.error(&anyhow::anyhow!("broken")).await.unwrap();

        let lines = manager.log_line_repository().list_recent(10).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].level, LogLevel::Error);
        assert_eq!(lines[0].exception_info.as_ref().unwrap().name, "Error");
        assert_eq!(lines[1].message, "careful");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_every_call_emits_tracing_event() {
        let logger = Logger::Console;
        logger.info("visible in traces").await.unwrap();
        assert!(logs_contain("visible in traces"));
    }
}
