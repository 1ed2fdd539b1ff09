use std::sync::{Arc, OnceLock};

use futures::future::join_all;
use log::{debug, warn};
use tokio::{
    runtime::{Builder, Handle, Runtime},
    sync::Semaphore,
    task,
};

use crate::{
    configuration,
    core::error::{FilterError, Result},
};

/// Dedicated runtime executing pack range tasks.
///
/// Callers block until every submitted job finished; at most `size` jobs run at once.
pub struct WorkerPool {
    runtime: Runtime,
    permits: Arc<Semaphore>,
    size: usize,
}

static SHARED: OnceLock<Option<WorkerPool>> = OnceLock::new();

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self> {
        let size = size.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(size)
            .thread_name("roughset-filter")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            permits: Arc::new(Semaphore::new(size)),
            size,
        })
    }

    /// Process wide pool sized by the installed configuration, `None` if the size is 0.
    pub fn shared() -> Option<&'static WorkerPool> {
        SHARED
            .get_or_init(|| {
                let size = configuration::current().thread_pool_size();
                if size == 0 {
                    return None;
                }
                match WorkerPool::new(size) {
                    Ok(pool) => {
                        debug!("Filter worker pool started with {} threads", size);
                        Some(pool)
                    }
                    Err(e) => {
                        warn!("Filter worker pool not available: {}", e);
                        None
                    }
                }
            })
            .as_ref()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs `jobs` and returns their results in submission order.
    ///
    /// The first failing job decides the error. Called from inside another
    /// runtime the jobs run one by one on the calling thread.
    pub fn run_all<T, F>(&self, jobs: Vec<F>) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        if Handle::try_current().is_ok() {
            return jobs.into_iter().map(|job| job()).collect();
        }

        let permits = Arc::clone(&self.permits);
        self.runtime.block_on(async move {
            let handles: Vec<_> = jobs
                .into_iter()
                .map(|job| {
                    let sem = Arc::clone(&permits);
                    task::spawn(async move {
                        let _permit = sem
                            .acquire_owned()
                            .await
                            .map_err(|e| FilterError::Internal(format!("worker pool closed: {}", e)))?;
                        task::spawn_blocking(job)
                            .await
                            .map_err(|e| FilterError::Internal(format!("pack task failed: {}", e)))?
                    })
                })
                .collect();

            join_all(handles)
                .await
                .into_iter()
                .map(|joined| joined.map_err(|e| FilterError::Internal(format!("pack task failed: {}", e)))?)
                .collect()
        })
    }
}
