//! Cron-driven staleness sweep.
//!
//! Provides a cron-based scheduler that triggers a user-supplied sweep job
//! at fixed intervals. Join handles are tracked, cancellation is explicit,
//! and every asynchronous operation is wrapped in a timeout.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use worklog_infra::{SchedulerResult, SweepJob, SweepScheduler, SweepSchedulerConfig};
//!
//! struct NoopJob;
//!
//! #[async_trait]
//! impl SweepJob for NoopJob {
//!     async fn run(&self) -> Result<usize, worklog_infra::InfraError> {
//!         Ok(0)
//!     }
//! }
//!
//! # async fn example() -> SchedulerResult<()> {
//! let job = Arc::new(NoopJob);
//! let mut scheduler = SweepScheduler::with_config(
//!     SweepSchedulerConfig {
//!         cron_expression: "0 */5 * * * *".into(), // every 5 minutes
//!         ..Default::default()
//!     },
//!     job,
//! )
//! .await?;
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use worklog_domain::constants::DEFAULT_SWEEP_CRON;

use crate::errors::InfraError;
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Trait representing one pass of the staleness sweep.
#[async_trait]
pub trait SweepJob: Send + Sync {
    /// Execute the sweep and return how many records were consolidated.
    async fn run(&self) -> Result<usize, InfraError>;
}

/// Configuration for the sweep scheduler.
#[derive(Debug, Clone)]
pub struct SweepSchedulerConfig {
    /// Cron expression describing the execution schedule.
    pub cron_expression: String,
    /// Timeout applied to a single sweep execution.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for SweepSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: DEFAULT_SWEEP_CRON.into(), // every 15 minutes
            job_timeout: Duration::from_secs(300),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Sweep scheduler with explicit lifecycle management.
pub struct SweepScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    config: SweepSchedulerConfig,
    job_id: Uuid,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    job: Arc<dyn SweepJob>,
}

impl SweepScheduler {
    /// Create a scheduler with the default configuration.
    pub async fn new(cron_expression: String, job: Arc<dyn SweepJob>) -> SchedulerResult<Self> {
        let config = SweepSchedulerConfig { cron_expression, ..Default::default() };
        Self::with_config(config, job).await
    }

    /// Create a scheduler with a custom configuration.
    pub async fn with_config(
        config: SweepSchedulerConfig,
        job: Arc<dyn SweepJob>,
    ) -> SchedulerResult<Self> {
        let raw_scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed { source })?;

        let mut scheduler = Self {
            scheduler: Arc::new(RwLock::new(raw_scheduler)),
            config,
            job_id: Uuid::nil(),
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            job,
        };

        scheduler.job_id = scheduler.register_sweep_job().await?;
        Ok(scheduler)
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler = self.scheduler.clone();
        let start_timeout = self.config.start_timeout;
        let start_result = tokio::time::timeout(start_timeout, async move {
            let guard = scheduler.write().await;
            guard.start().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?;

        start_result.map_err(|source| SchedulerError::StartFailed { source })?;

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            Self::monitor_task(cancel).await;
        });

        self.monitor_handle = Some(handle);
        info!("Sweep scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let scheduler = self.scheduler.clone();
        let stop_timeout = self.config.stop_timeout;
        let stop_result = tokio::time::timeout(stop_timeout, async move {
            let mut guard = scheduler.write().await;
            guard.shutdown().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?;

        stop_result.map_err(|source| SchedulerError::StopFailed { source })?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??
        }

        info!("Sweep scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when the monitor task is active.
    pub fn is_running(&self) -> bool {
        self.monitor_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    async fn register_sweep_job(&mut self) -> SchedulerResult<Uuid> {
        if self.job_id != Uuid::nil() {
            return Ok(self.job_id);
        }

        let cron_expr = self.config.cron_expression.clone();
        let job = self.job.clone();
        let job_timeout = self.config.job_timeout;

        let job_definition = Job::new_async(cron_expr.as_str(), move |_id, _lock| {
            let job = job.clone();

            Box::pin(async move {
                let started = Instant::now();

                match tokio::time::timeout(job_timeout, job.run()).await {
                    Ok(Ok(consolidated)) => {
                        debug!(
                            consolidated,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Staleness sweep finished"
                        );
                    }
                    Ok(Err(err)) => {
                        error!(error = ?err, "Staleness sweep failed");
                    }
                    Err(elapsed) => {
                        warn!(timeout_secs = job_timeout.as_secs(), "Staleness sweep timed out");
                        debug!(elapsed = ?elapsed, "Timeout details");
                    }
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let job_id = job_definition.guid();
        let scheduler = self.scheduler.write().await;
        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "Registered staleness sweep job");
        Ok(job_id)
    }

    async fn monitor_task(cancel: CancellationToken) {
        cancel.cancelled().await;
        debug!("Sweep scheduler monitor cancelled");
    }
}

impl Drop for SweepScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("SweepScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
