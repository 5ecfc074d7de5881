use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jobless_core::JoblessResult;
use jobless_domain::{
    entities::{Worker, WorkerIdentity, WorkerStatus},
    repositories::WorkerRepository,
};
use tracing::{debug, warn};

/// Registry presence of one worker instance.
///
/// `terminate` runs at most once. If the manager is dropped before that
/// happened (for example because the loop future was cancelled), termination
/// is spawned onto the current runtime.
pub struct CheckInManager {
    workers: Arc<dyn WorkerRepository>,
    identity: WorkerIdentity,
    terminated: AtomicBool,
}

impl CheckInManager {
    pub fn new(workers: Arc<dyn WorkerRepository>, identity: WorkerIdentity) -> Self {
        Self {
            workers,
            identity,
            terminated: AtomicBool::new(false),
        }
    }

    pub async fn check_in(&self, status: WorkerStatus) -> JoblessResult<Worker> {
        self.workers.check_in(&self.identity, status).await
    }

    /// Mark the worker ended. Later calls are no-ops returning `false`.
    pub async fn terminate(&self) -> JoblessResult<bool> {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        debug!("Terminating worker {}", self.identity);
        self.workers.terminate(&self.identity).await
    }
}

impl Drop for CheckInManager {
    fn drop(&mut self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let workers = Arc::clone(&self.workers);
                let identity = self.identity.clone();
                handle.spawn(async move {
                    if let Err(e) = workers.terminate(&identity).await {
                        warn!("Failed to terminate worker {}: {}", identity, e);
                    }
                });
            }
            Err(_) => warn!(
                "Worker {} dropped outside a runtime; registry record left open",
                self.identity
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockWorkerRepository;
    use std::time::Duration;

    fn identity() -> WorkerIdentity {
        WorkerIdentity::new("box-1", 4242, "deposits")
    }

    #[tokio::test]
    async fn test_terminate_runs_once() {
        let workers = Arc::new(MockWorkerRepository::default());
        let manager = CheckInManager::new(workers.clone(), identity());
        manager.check_in(WorkerStatus::Ready).await.unwrap();

        assert!(manager.terminate().await.unwrap());
        assert!(!manager.terminate().await.unwrap());
        drop(manager);

        tokio::task::yield_now().await;
        assert_eq!(workers.terminate_count(), 1);
    }

    #[tokio::test]
    async fn test_drop_terminates_when_not_done() {
        let workers = Arc::new(MockWorkerRepository::default());
        let manager = CheckInManager::new(workers.clone(), identity());
        manager.check_in(WorkerStatus::Working).await.unwrap();
        drop(manager);

        tokio::time::timeout(Duration::from_secs(1), async {
            while workers.terminate_count() == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let worker = workers.lookup(&identity()).await.unwrap().unwrap();
        assert!(worker.ended);
        assert_eq!(worker.status, WorkerStatus::Ended);
    }
}
