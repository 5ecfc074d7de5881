use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use jobless_core::JoblessError;
use tracing::warn;

use crate::handler::{JobContext, JobHandler};

/// Runs the handler with panics turned into errors
pub struct JobExecutionManager {
    handler: Arc<dyn JobHandler>,
}

impl JobExecutionManager {
    pub fn new(handler: Arc<dyn JobHandler>) -> Self {
        Self { handler }
    }

    pub async fn execute(&self, ctx: &JobContext) -> anyhow::Result<()> {
        match AssertUnwindSafe(self.handler.handle(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!("Handler panicked: {}", message);
                Err(JoblessError::HandlerFailure(message).into())
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
