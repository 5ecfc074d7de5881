pub mod entities;
pub mod repositories;

pub use entities::*;
pub use jobless_core::{JoblessError, JoblessResult};
pub use repositories::*;
