pub mod check_in;
pub mod job_execution;
pub mod worker_lifecycle;

pub use check_in::CheckInManager;
pub use job_execution::JobExecutionManager;
pub use worker_lifecycle::{WorkerExit, WorkerLoop, WorkerOptions, WorkerState};
