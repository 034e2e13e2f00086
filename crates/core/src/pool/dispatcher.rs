//! Worker pool dispatcher
//!
//! Manages a fixed set of long-lived workers, hands submitted jobs to idle
//! workers and shuts them down cooperatively.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Barrier};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::job::{BoxedJob, Job};
use super::worker::{report_job_error, Registration, Ticket, Worker};
use crate::config::{ConfigError, EnvSource};

/// Default upper bound on live workers
pub const DEFAULT_MAX_WORKERS: usize = 1000;

/// Largest accepted `max_workers`
pub const MAX_WORKERS_LIMIT: usize = 65_536;

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Identifier attached to every log line of this pool (generated if not provided)
    pub pool_id: String,

    /// Number of worker tasks spawned on start
    pub max_workers: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            pool_id: format!("pool-{}", Uuid::now_v7()),
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl WorkerPoolConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `POOL_MAX_WORKERS`: Number of workers (default: 1000)
    /// - `POOL_ID`: Pool identifier (default: generated)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&EnvSource::new())
    }

    /// Create configuration from an explicit source
    pub fn from_source(source: &EnvSource) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            pool_id: source.string("POOL_ID", &defaults.pool_id),
            max_workers: source.parse("POOL_MAX_WORKERS", defaults.max_workers)?,
        })
    }

    /// Set the pool ID
    pub fn with_pool_id(mut self, id: impl Into<String>) -> Self {
        self.pool_id = id.into();
        self
    }

    /// Set the number of workers
    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.max_workers = max;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_workers == 0 {
            return Err(PoolError::InvalidConfig(
                "max_workers must be at least 1".into(),
            ));
        }
        if self.max_workers > MAX_WORKERS_LIMIT {
            return Err(PoolError::InvalidConfig(format!(
                "max_workers must be at most {MAX_WORKERS_LIMIT}, got {}",
                self.max_workers
            )));
        }
        Ok(())
    }
}

/// Worker pool status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPoolStatus {
    /// Created, workers not spawned yet
    Idle,
    /// Workers are running and accepting jobs
    Running,
    /// Stop was requested; the pool is permanently unusable
    Stopped,
}

/// Worker pool errors
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// No worker became free before the submission timeout
    #[error("wait for worker timed out after {0:?}")]
    Timeout(Duration),

    /// The pool was stopped
    #[error("submission on closed pool")]
    Closed,

    /// Start was called twice
    #[error("worker pool is already started")]
    AlreadyStarted,

    /// Invalid configuration
    #[error("invalid worker pool configuration: {0}")]
    InvalidConfig(String),

    /// Workers did not exit before the shutdown timeout
    #[error("worker pool shutdown timed out")]
    ShutdownTimeout,

    /// Configuration could not be read
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Bounded pool of worker tasks
///
/// Submission blocks while every worker is busy; that wait is the pool's only
/// backpressure and it races against the submission timeout and the stop
/// signal. Execution is fire-and-forget: failures and panics inside a job are
/// logged, never returned to the submitter.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use switchyard_core::pool::{FnJob, JobContext, WorkerPool, WorkerPoolConfig};
///
/// # async fn run() -> Result<(), switchyard_core::pool::PoolError> {
/// let pool = WorkerPool::new(WorkerPoolConfig::new().with_max_workers(8));
/// pool.start().await?;
///
/// let job = FnJob::new("resize-image", JobContext::background(), || async {
///     // resize...
///     Ok(())
/// });
/// pool.submit(job.boxed(), Duration::from_millis(200)).await?;
///
/// pool.shutdown(Duration::from_secs(5)).await?;
/// # Ok(())
/// # }
/// ```
pub struct WorkerPool {
    pool_id: Arc<str>,
    config: WorkerPoolConfig,
    registration: Arc<RwLock<Registration>>,
    available: tokio::sync::Mutex<mpsc::Receiver<Ticket>>,
    shutdown: CancellationToken,
    status: RwLock<WorkerPoolStatus>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool; no worker runs until [`WorkerPool::start`]
    pub fn new(config: WorkerPoolConfig) -> Self {
        // An invalid size is reported by start(); the queue still needs a capacity.
        let capacity = config.max_workers.clamp(1, MAX_WORKERS_LIMIT);
        let (tickets_tx, tickets_rx) = mpsc::channel(capacity);

        Self {
            pool_id: Arc::from(config.pool_id.as_str()),
            config,
            registration: Arc::new(RwLock::new(Registration {
                stopped: false,
                tickets: Some(tickets_tx),
            })),
            available: tokio::sync::Mutex::new(tickets_rx),
            shutdown: CancellationToken::new(),
            status: RwLock::new(WorkerPoolStatus::Idle),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Create a pool configured from environment variables
    pub fn from_env() -> Result<Self, PoolError> {
        Ok(Self::new(WorkerPoolConfig::from_env()?))
    }

    /// Spawn `max_workers` workers
    ///
    /// Returns once every worker task is running.
    #[instrument(skip(self), fields(pool_id = %self.pool_id))]
    pub async fn start(&self) -> Result<(), PoolError> {
        self.config.validate()?;

        {
            let mut status = self.status.write();
            match *status {
                WorkerPoolStatus::Running => return Err(PoolError::AlreadyStarted),
                WorkerPoolStatus::Stopped => return Err(PoolError::Closed),
                WorkerPoolStatus::Idle => *status = WorkerPoolStatus::Running,
            }
        }

        let max_workers = self.config.max_workers;
        info!(pool_id = %self.pool_id, max_workers, "Starting worker pool");

        let started = Arc::new(Barrier::new(max_workers + 1));
        let mut handles = Vec::with_capacity(max_workers);

        for index in 0..max_workers {
            let worker = Worker {
                index,
                pool_id: Arc::clone(&self.pool_id),
                registration: Arc::clone(&self.registration),
                shutdown: self.shutdown.clone(),
            };
            let started = Arc::clone(&started);

            handles.push(tokio::spawn(async move {
                started.wait().await;
                worker.run().await;
            }));
        }

        *self.workers.lock() = handles;
        started.wait().await;

        debug!(pool_id = %self.pool_id, "All workers started");
        Ok(())
    }

    /// Hand `job` to the next free worker
    ///
    /// Waits for a free worker for at most `timeout`; `Duration::ZERO` waits
    /// without limit. Fails with [`PoolError::Closed`] as soon as the pool is
    /// stopped.
    pub async fn submit(&self, job: BoxedJob, timeout: Duration) -> Result<(), PoolError> {
        if self.is_stopped() {
            return Err(self.reject(job.as_ref(), PoolError::Closed));
        }

        let deadline = async {
            if timeout.is_zero() {
                std::future::pending::<()>().await
            } else {
                tokio::time::sleep(timeout).await
            }
        };

        let ticket = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            ticket = self.next_ticket() => ticket,
            _ = deadline => {
                return Err(self.reject(job.as_ref(), PoolError::Timeout(timeout)));
            }
        };

        let Some(ticket) = ticket else {
            return Err(self.reject(job.as_ref(), PoolError::Closed));
        };

        // The worker only publishes its ticket while its channel is empty, so
        // this send never waits; it fails if the worker exited meanwhile.
        ticket
            .send(job)
            .await
            .map_err(|rejected| self.reject(rejected.0.as_ref(), PoolError::Closed))
    }

    /// Fire the stop signal
    ///
    /// Idle workers exit immediately; busy workers finish their current job
    /// first. Pending and future submissions fail with [`PoolError::Closed`].
    /// Calling it again is a no-op.
    pub fn stop(&self) {
        self.shutdown.cancel();

        {
            let mut registration = self.registration.write();
            if registration.stopped {
                return;
            }
            registration.stopped = true;
            registration.tickets = None;
        }
        *self.status.write() = WorkerPoolStatus::Stopped;

        // Drop tickets of workers that will never serve again. A submitter
        // holding the queue sees the stop signal instead.
        if let Ok(mut available) = self.available.try_lock() {
            available.close();
            while available.try_recv().is_ok() {}
        }

        info!(pool_id = %self.pool_id, "Worker pool stopped");
    }

    /// Stop the pool and wait for every worker to exit
    ///
    /// In-flight jobs are allowed to finish within `timeout`.
    #[instrument(skip(self), fields(pool_id = %self.pool_id))]
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), PoolError> {
        self.stop();

        let handles = std::mem::take(&mut *self.workers.lock());
        let remaining = handles.len();

        match tokio::time::timeout(timeout, futures::future::join_all(handles)).await {
            Ok(results) => {
                for result in results.into_iter().filter_map(Result::err) {
                    warn!(pool_id = %self.pool_id, error = %result, "Worker task ended abnormally");
                }
                debug!(pool_id = %self.pool_id, "All workers exited");
                Ok(())
            }
            Err(_) => {
                warn!(pool_id = %self.pool_id, remaining, "Shutdown timeout reached");
                Err(PoolError::ShutdownTimeout)
            }
        }
    }

    /// Get current status
    pub fn status(&self) -> WorkerPoolStatus {
        *self.status.read()
    }

    /// Check whether the stop signal fired
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled() || self.registration.read().stopped
    }

    /// Get the pool ID
    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    /// Get the configured number of workers
    pub fn max_workers(&self) -> usize {
        self.config.max_workers
    }

    /// Token fired by [`WorkerPool::stop`]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    async fn next_ticket(&self) -> Option<Ticket> {
        self.available.lock().await.recv().await
    }

    fn reject(&self, job: &dyn Job, err: PoolError) -> PoolError {
        report_job_error(&self.pool_id, job, &err);
        err
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers would otherwise wait for jobs forever.
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("pool_id", &self.pool_id)
            .field("max_workers", &self.config.max_workers)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerPoolConfig::default();
        assert!(config.pool_id.starts_with("pool-"));
        assert_eq!(config.max_workers, DEFAULT_MAX_WORKERS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = WorkerPoolConfig::new()
            .with_pool_id("ingest")
            .with_max_workers(12);

        assert_eq!(config.pool_id, "ingest");
        assert_eq!(config.max_workers, 12);
    }

    #[test]
    fn test_zero_workers_is_invalid() {
        let config = WorkerPoolConfig::new().with_max_workers(0);
        assert!(matches!(config.validate(), Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_from_source() {
        std::env::set_var("POOL_CFG_OK_POOL_MAX_WORKERS", "16");
        std::env::set_var("POOL_CFG_OK_POOL_ID", "billing");

        let config = WorkerPoolConfig::from_source(&EnvSource::with_prefix("POOL_CFG_OK")).unwrap();
        assert_eq!(config.max_workers, 16);
        assert_eq!(config.pool_id, "billing");
    }

    #[test]
    fn test_config_from_source_invalid() {
        std::env::set_var("POOL_CFG_BAD_POOL_MAX_WORKERS", "-3");
        let result = WorkerPoolConfig::from_source(&EnvSource::with_prefix("POOL_CFG_BAD"));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = WorkerPoolConfig::new().with_pool_id("p").with_max_workers(3);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: WorkerPoolConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let pool = WorkerPool::new(WorkerPoolConfig::new().with_max_workers(0));
        assert!(matches!(pool.start().await, Err(PoolError::InvalidConfig(_))));
        assert_eq!(pool.status(), WorkerPoolStatus::Idle);
    }

    #[test]
    fn test_too_many_workers_is_invalid() {
        let at_limit = WorkerPoolConfig::new().with_max_workers(MAX_WORKERS_LIMIT);
        assert!(at_limit.validate().is_ok());

        let over = WorkerPoolConfig::new().with_max_workers(MAX_WORKERS_LIMIT + 1);
        assert!(matches!(over.validate(), Err(PoolError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_start_rejects_huge_worker_count() {
        let pool = WorkerPool::new(WorkerPoolConfig::new().with_max_workers(usize::MAX));
        assert!(matches!(pool.start().await, Err(PoolError::InvalidConfig(_))));
        assert_eq!(pool.status(), WorkerPoolStatus::Idle);
        assert_eq!(pool.max_workers(), usize::MAX);
    }

    #[tokio::test]
    async fn test_lifecycle_status() {
        let pool = WorkerPool::new(WorkerPoolConfig::new().with_max_workers(2));
        assert_eq!(pool.status(), WorkerPoolStatus::Idle);

        pool.start().await.unwrap();
        assert_eq!(pool.status(), WorkerPoolStatus::Running);
        assert!(matches!(pool.start().await, Err(PoolError::AlreadyStarted)));

        pool.stop();
        pool.stop();
        assert_eq!(pool.status(), WorkerPoolStatus::Stopped);
        assert!(pool.is_stopped());
        assert!(matches!(pool.start().await, Err(PoolError::Closed)));
    }
}
