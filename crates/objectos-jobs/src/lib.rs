//! # Job Queue
//!
//! An in-memory, durable-within-process FIFO job queue with priority
//! dispatch, scheduled execution, cancellation, and retry with
//! configurable backoff (spec §4.8).

pub mod job;
pub mod queue;
pub mod retry;

pub use job::{Job, JobError, JobResult, JobStatus, Priority};
pub use queue::{EnqueueOptions, JobHandler, JobHandlerError, JobQueue, JobQueueConfig};
pub use retry::RetryStrategy;
