pub mod components;
pub mod executors;
pub mod handler;
pub mod identity;

#[cfg(test)]
pub(crate) mod test_utils;

pub use components::{CheckInManager, JobExecutionManager, WorkerExit, WorkerLoop, WorkerOptions, WorkerState};
pub use executors::ShellHandler;
pub use handler::{handler_fn, FnHandler, JobContext, JobHandler};
pub use identity::detect_identity;
