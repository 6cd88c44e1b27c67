//! The job queue: enqueue/schedule/cancel/retry plus the single-worker
//! dispatch loop (spec §4.8).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use objectos_core::ids;
use objectos_events::EventBus;
use serde_json::Value;

use crate::job::{Job, JobError, JobResult, JobStatus, Priority};
use crate::retry::RetryStrategy;

pub type JobHandlerError = Box<dyn std::error::Error + Send + Sync>;
/// A job handler: given the job's payload, runs the work and reports
/// success or failure. Looked up by job name at dispatch time.
pub type JobHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<(), JobHandlerError>> + Send + Sync>;

/// Options accepted by [`JobQueue::enqueue`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
	pub priority: Priority,
	pub max_retries: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct JobQueueConfig {
	/// How often the dispatch loop looks for the next eligible job.
	pub dispatch_interval: std::time::Duration,
	pub default_max_retries: u32,
	pub retry_strategy: RetryStrategy,
}

impl Default for JobQueueConfig {
	fn default() -> Self {
		Self {
			dispatch_interval: std::time::Duration::from_secs(1),
			default_max_retries: 3,
			retry_strategy: RetryStrategy::default(),
		}
	}
}

struct Entry {
	job: Job,
	/// Monotonic insertion order, used to break priority ties FIFO —
	/// `created_at` alone can collide at sub-millisecond enqueue rates.
	seq: u64,
}

/// In-memory FIFO job queue with priority dispatch, retry, and backoff
/// (spec §4.8). A single logical worker drives `dispatch_tick`; only one
/// job transitions to `running` per call (spec §5).
pub struct JobQueue {
	config: JobQueueConfig,
	events: EventBus,
	entries: Mutex<HashMap<String, Entry>>,
	handlers: Mutex<HashMap<String, JobHandler>>,
	next_seq: std::sync::atomic::AtomicU64,
}

impl JobQueue {
	pub fn new(config: JobQueueConfig, events: EventBus) -> Arc<Self> {
		for topic in [
			"job.enqueued",
			"job.scheduled",
			"job.started",
			"job.completed",
			"job.failed",
			"job.retried",
			"job.cancelled",
		] {
			events.register_topic(topic);
		}
		Arc::new(Self {
			config,
			events,
			entries: Mutex::new(HashMap::new()),
			handlers: Mutex::new(HashMap::new()),
			next_seq: std::sync::atomic::AtomicU64::new(0),
		})
	}

	/// Register the handler invoked for jobs enqueued under `name`.
	pub fn register_handler(&self, name: impl Into<String>, handler: JobHandler) {
		self.handlers.lock().unwrap_or_else(PoisonError::into_inner).insert(name.into(), handler);
	}

	fn next_seq(&self) -> u64 {
		self.next_seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
	}

	async fn emit(&self, topic: &str, payload: Value) {
		if let Err(err) = self.events.trigger(topic, payload).await {
			tracing::warn!(topic, error = %err, "job event gate handler aborted (unexpected for an observer topic)");
		}
	}

	fn job_payload(job: &Job) -> Value {
		serde_json::json!({
			"id": job.id,
			"name": job.name,
			"priority": job.priority,
			"status": job.status,
			"attempts": job.attempts,
		})
	}

	/// `enqueue(name, payload, options)`: appends a `pending` job,
	/// emitting `job.enqueued`.
	pub async fn enqueue(&self, name: impl Into<String>, payload: Value, options: EnqueueOptions) -> String {
		let name = name.into();
		let id = ids::unique_id("job");
		let max_retries = options.max_retries.unwrap_or(self.config.default_max_retries);
		let job = Job::new(id.clone(), name, payload, options.priority, max_retries, None);
		let seq = self.next_seq();
		let payload_for_event = Self::job_payload(&job);
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).insert(id.clone(), Entry { job, seq });
		self.emit("job.enqueued", payload_for_event).await;
		id
	}

	/// `schedule(name, payload, runAt)`: inserts in the `scheduled`
	/// state; `dispatch_tick` promotes it to `pending` once `now >=
	/// runAt`.
	pub async fn schedule(&self, name: impl Into<String>, payload: Value, run_at: DateTime<Utc>, options: EnqueueOptions) -> String {
		let name = name.into();
		let id = ids::unique_id("job");
		let max_retries = options.max_retries.unwrap_or(self.config.default_max_retries);
		let job = Job::new(id.clone(), name, payload, options.priority, max_retries, Some(run_at));
		let seq = self.next_seq();
		let payload_for_event = Self::job_payload(&job);
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).insert(id.clone(), Entry { job, seq });
		self.emit("job.scheduled", payload_for_event).await;
		id
	}

	/// `cancel(id)`: only from `{pending, scheduled}`.
	pub async fn cancel(&self, id: &str) -> JobResult<()> {
		let payload = {
			let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
			let entry = entries.get_mut(id).ok_or_else(|| JobError::NotFound(id.to_string()))?;
			if !matches!(entry.job.status, JobStatus::Pending | JobStatus::Scheduled) {
				return Err(JobError::InvalidTransition { id: id.to_string(), status: entry.job.status, action: "cancelled" });
			}
			entry.job.status = JobStatus::Cancelled;
			Self::job_payload(&entry.job)
		};
		self.emit("job.cancelled", payload).await;
		Ok(())
	}

	/// `retry(id)`: only from `failed`; resets attempts, clears the
	/// error, and transitions to `pending`.
	pub async fn retry(&self, id: &str) -> JobResult<()> {
		let payload = {
			let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
			let entry = entries.get_mut(id).ok_or_else(|| JobError::NotFound(id.to_string()))?;
			if entry.job.status != JobStatus::Failed {
				return Err(JobError::InvalidTransition { id: id.to_string(), status: entry.job.status, action: "retried" });
			}
			entry.job.attempts = 0;
			entry.job.error = None;
			entry.job.status = JobStatus::Pending;
			Self::job_payload(&entry.job)
		};
		self.emit("job.retried", payload).await;
		Ok(())
	}

	pub fn get(&self, id: &str) -> JobResult<Job> {
		self.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get(id)
			.map(|entry| entry.job.clone())
			.ok_or_else(|| JobError::NotFound(id.to_string()))
	}

	pub fn len(&self) -> usize {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Summary counts by status, the backing data for `GET
	/// /api/v1/jobs/stats`.
	pub fn stats(&self) -> HashMap<&'static str, usize> {
		let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		let mut stats = HashMap::new();
		for entry in entries.values() {
			let key = match entry.job.status {
				JobStatus::Pending => "pending",
				JobStatus::Scheduled => "scheduled",
				JobStatus::Running => "running",
				JobStatus::Retrying => "retrying",
				JobStatus::Completed => "completed",
				JobStatus::Failed => "failed",
				JobStatus::Cancelled => "cancelled",
			};
			*stats.entry(key).or_insert(0) += 1;
		}
		stats
	}

	/// Promote every `scheduled` job whose `run_at` has arrived to
	/// `pending`, then pick the single highest-priority, earliest-FIFO
	/// dispatchable job (a `pending` job, or a `retrying` job whose
	/// back-off has elapsed) and run it to completion. A no-op if
	/// nothing is dispatchable.
	pub async fn dispatch_tick(&self) {
		let now = Utc::now();
		let Some(id) = self.pick_next(now) else { return };
		self.run_one(&id).await;
	}

	fn pick_next(&self, now: DateTime<Utc>) -> Option<String> {
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

		for entry in entries.values_mut() {
			if entry.job.status == JobStatus::Scheduled && entry.job.run_at.is_some_and(|run_at| now >= run_at) {
				entry.job.status = JobStatus::Pending;
			}
		}

		let mut candidates: Vec<(&String, &Entry)> = entries
			.iter()
			.filter(|(_, entry)| {
				let retry_ready_at = entry.job.last_attempt_at.map(|last| last + self.config.retry_strategy.calculate_delay(entry.job.attempts));
				entry.job.is_dispatchable(now, retry_ready_at)
			})
			.collect();

		candidates.sort_by(|a, b| b.1.job.priority.cmp(&a.1.job.priority).then(a.1.seq.cmp(&b.1.seq)));

		candidates.first().map(|(id, _)| (*id).clone())
	}

	async fn run_one(&self, id: &str) {
		let handler = {
			let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
			let Some(entry) = entries.get_mut(id) else { return };
			entry.job.status = JobStatus::Running;
			entry.job.attempts += 1;
			entry.job.last_attempt_at = Some(Utc::now());
			self.handlers.lock().unwrap_or_else(PoisonError::into_inner).get(&entry.job.name).cloned()
		};

		let started_payload = {
			let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
			Self::job_payload(&entries[id].job)
		};
		self.emit("job.started", started_payload).await;

		let (payload, name) = {
			let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
			let job = &entries[id].job;
			(job.payload.clone(), job.name.clone())
		};

		let outcome = match handler {
			Some(handler) => handler(payload).await,
			None => Err(Box::new(JobError::NoHandler(name)) as JobHandlerError),
		};

		match outcome {
			Ok(()) => self.complete(id).await,
			Err(err) => self.fail(id, err.to_string()).await,
		}
	}

	async fn complete(&self, id: &str) {
		let payload = {
			let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
			let Some(entry) = entries.get_mut(id) else { return };
			entry.job.status = JobStatus::Completed;
			entry.job.error = None;
			Self::job_payload(&entry.job)
		};
		self.emit("job.completed", payload).await;
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).remove(id);
	}

	async fn fail(&self, id: &str, error: String) {
		let (failed_payload, retried_payload) = {
			let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
			let Some(entry) = entries.get_mut(id) else { return };
			entry.job.error = Some(error);

			let will_retry = self.config.retry_strategy.should_retry(entry.job.attempts, entry.job.max_retries);
			entry.job.status = if will_retry { JobStatus::Retrying } else { JobStatus::Failed };

			let failed_payload = Self::job_payload(&entry.job);
			let retried_payload = will_retry.then(|| Self::job_payload(&entry.job));
			(failed_payload, retried_payload)
		};

		self.emit("job.failed", failed_payload).await;
		if let Some(retried_payload) = retried_payload {
			self.emit("job.retried", retried_payload).await;
		}
	}
}
