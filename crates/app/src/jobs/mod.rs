//! Generation jobs
//!
//! A durable queue of AI image generations, a per-image lease lock that keeps each
//! generation single-flight, the worker that runs one job, and the scheduler that
//! drives workers and applies the retry policy.

pub mod lock;
pub mod queue;
pub mod records;
pub mod scheduler;
pub mod worker;

pub use lock::{GenerationLock, LeaseToken, LockError, PgGenerationLock};
pub use queue::{JobQueue, PgJobQueue, QueueError};
pub use records::{GenerationJob, JobState, JobUuid, NewJob};
pub use scheduler::{JobScheduler, RetryPolicy, SchedulerConfig};
pub use worker::{GenerationWorker, JobOutcome, SkipReason, WorkerConfig};
