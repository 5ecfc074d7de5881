pub mod app;
pub mod cli;
pub mod common;
pub mod shutdown;

pub use app::{AppContext, AppContextBuilder};
pub use shutdown::ShutdownManager;
