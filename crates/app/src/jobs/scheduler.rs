//! Job Scheduler
//!
//! Runs a fixed number of worker loops over the job queue and turns each
//! [`JobOutcome`] into a queue transition using the [`RetryPolicy`].

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinSet};
use tracing::{error, info, warn};

use crate::jobs::{
    queue::{JobQueue, QueueError},
    records::GenerationJob,
    worker::{GenerationWorker, JobOutcome, SkipReason},
};

/// How many times a job runs and how long to wait between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Delay before the retry following attempt `n` is `backoff[n - 1]`; the last
    /// entry repeats.
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![
                Duration::from_secs(30),
                Duration::from_secs(120),
                Duration::from_secs(300),
            ],
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after `attempt` (1-based) failed.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let index = usize::try_from(attempt.saturating_sub(1)).unwrap_or(usize::MAX);

        self.backoff
            .get(index)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or_default()
    }

    /// Whether a job that has been claimed `attempts` times may run again.
    #[must_use]
    pub fn has_attempts_left(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Settings for a [`JobScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Concurrent worker loops.
    pub workers: usize,

    /// Idle wait between polls of an empty queue.
    pub poll_interval: Duration,

    /// How long a claim hides a job from other workers.
    pub claim_visibility: Duration,

    /// Wait before re-running a job whose image lease is held elsewhere.
    pub lock_retry_delay: Duration,

    pub policy: RetryPolicy,
}

/// Drives [`GenerationWorker`]s over a [`JobQueue`].
pub struct JobScheduler {
    queue: Arc<dyn JobQueue>,
    worker: Arc<GenerationWorker>,
    config: SchedulerConfig,
}

impl JobScheduler {
    #[must_use]
    pub fn new(
        queue: Arc<dyn JobQueue>,
        worker: Arc<GenerationWorker>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            queue,
            worker,
            config,
        }
    }

    /// Run worker loops until `shutdown` flips to `true` or its sender is dropped.
    /// A job in progress is finished before its loop exits.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let workers = self.config.workers.max(1);
        let scheduler = Arc::new(self);
        let mut loops = JoinSet::new();

        for index in 0..workers {
            let scheduler = Arc::clone(&scheduler);
            let shutdown = shutdown.clone();

            loops.spawn(async move { scheduler.worker_loop(index, shutdown).await });
        }

        info!(workers, "job scheduler started");

        while let Some(joined) = loops.join_next().await {
            if let Err(error) = joined {
                error!(%error, "worker loop crashed");
            }
        }

        info!("job scheduler stopped");
    }

    async fn worker_loop(&self, index: usize, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.tick().await {
                Ok(Some(_outcome)) => false,
                Ok(None) => true,
                Err(error) => {
                    warn!(worker = index, %error, "failed to process generation job");

                    true
                }
            };

            if idle {
                tokio::select! {
                    () = tokio::time::sleep(self.config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!(worker = index, "worker loop stopped");
    }

    /// Claim and process a single job. `None` when nothing was runnable.
    ///
    /// # Errors
    ///
    /// Returns an error when the queue cannot be read or updated.
    pub async fn tick(&self) -> Result<Option<JobOutcome>, QueueError> {
        let Some(job) = self.queue.claim(self.config.claim_visibility).await? else {
            return Ok(None);
        };

        self.process(job).await.map(Some)
    }

    #[tracing::instrument(
        name = "jobs.scheduler.process",
        skip(self, job),
        fields(job = %job.uuid, attempt = job.attempts),
        err
    )]
    async fn process(&self, job: GenerationJob) -> Result<JobOutcome, QueueError> {
        let policy = &self.config.policy;

        if job.attempts > policy.max_attempts {
            let reason = job
                .last_error
                .clone()
                .unwrap_or_else(|| "worker stopped before finishing".to_string());

            warn!(%reason, "reclaimed job is past its attempt budget");

            self.give_up(&job, &reason).await?;

            return Ok(JobOutcome::Retryable(reason));
        }

        let worker = Arc::clone(&self.worker);
        let task_job = job.clone();

        let outcome = match tokio::spawn(async move { worker.run(&task_job).await }).await {
            Ok(outcome) => outcome,
            Err(source) => JobOutcome::Retryable(format!("worker task failed: {source}")),
        };

        match &outcome {
            // an expired claim whose lease is still running; try again once it lapses
            JobOutcome::Skipped(SkipReason::LockHeld) => {
                let delay = self.config.lock_retry_delay;

                info!(delay_secs = delay.as_secs(), "image lease held, deferring job");

                self.queue.defer(job.uuid, delay).await?;
            }
            JobOutcome::Completed | JobOutcome::Skipped(_) => self.queue.complete(job.uuid).await?,
            JobOutcome::Retryable(reason) if policy.has_attempts_left(job.attempts) => {
                let delay = policy.delay_after(job.attempts);

                info!(delay_secs = delay.as_secs(), "scheduling generation retry");

                self.queue.retry(job.uuid, delay, reason).await?;
            }
            JobOutcome::Retryable(reason) => {
                warn!(%reason, "generation attempts exhausted");

                self.give_up(&job, reason).await?;
            }
            JobOutcome::Terminal(reason) => self.queue.fail(job.uuid, reason).await?,
        }

        Ok(outcome)
    }

    async fn give_up(&self, job: &GenerationJob, reason: &str) -> Result<(), QueueError> {
        match self.worker.exhaust(job, reason).await {
            Ok(()) => self.queue.fail(job.uuid, reason).await,
            Err(error) => {
                error!(%error, "failed to record exhausted generation, requeueing");

                let delay = self.config.policy.delay_after(job.attempts);

                self.queue.retry(job.uuid, delay, reason).await
            }
        }
    }
}
