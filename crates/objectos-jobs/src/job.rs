//! The `Job` data model and its status state machine (spec §3, §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error as ThisError;

/// Dispatch priority. Higher variants are dispatched before lower ones;
/// within a priority band, dispatch is FIFO by enqueue time (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
	Low,
	Normal,
	High,
	Critical,
}

impl Default for Priority {
	fn default() -> Self {
		Priority::Normal
	}
}

/// A job's lifecycle state (spec §3: `pending -> (scheduled?) -> running
/// -> {completed | failed (-> retrying -> running | dead) | cancelled}`).
/// `Retrying` is the transient state between a failed attempt and the
/// next dispatch, named explicitly in spec §4.8's dispatch-loop prose
/// even though §3's summary table omits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
	Pending,
	Scheduled,
	Running,
	Retrying,
	Completed,
	Failed,
	Cancelled,
}

#[derive(Debug, ThisError)]
pub enum JobError {
	#[error("job '{0}' not found")]
	NotFound(String),

	#[error("job '{id}' cannot be {action} from status {status:?}")]
	InvalidTransition { id: String, status: JobStatus, action: &'static str },

	#[error("no handler registered for job name '{0}'")]
	NoHandler(String),
}

pub type JobResult<T> = Result<T, JobError>;

/// One queued unit of work (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
	pub id: String,
	pub name: String,
	pub priority: Priority,
	pub status: JobStatus,
	pub attempts: u32,
	pub max_retries: u32,
	pub created_at: DateTime<Utc>,
	pub last_attempt_at: Option<DateTime<Utc>>,
	pub run_at: Option<DateTime<Utc>>,
	pub error: Option<String>,
	pub payload: Value,
}

impl Job {
	pub(crate) fn new(id: String, name: String, payload: Value, priority: Priority, max_retries: u32, run_at: Option<DateTime<Utc>>) -> Self {
		Self {
			id,
			name,
			priority,
			status: if run_at.is_some() { JobStatus::Scheduled } else { JobStatus::Pending },
			attempts: 0,
			max_retries,
			created_at: Utc::now(),
			last_attempt_at: None,
			run_at,
			error: None,
			payload,
		}
	}

	/// Whether this job is eligible to be handed to a worker right now:
	/// `Pending`, a `Scheduled` job whose `run_at` has arrived, or a
	/// `Retrying` job whose back-off delay has elapsed.
	pub(crate) fn is_dispatchable(&self, now: DateTime<Utc>, retry_ready_at: Option<DateTime<Utc>>) -> bool {
		match self.status {
			JobStatus::Pending => true,
			JobStatus::Scheduled => self.run_at.is_some_and(|run_at| now >= run_at),
			JobStatus::Retrying => retry_ready_at.is_some_and(|ready| now >= ready),
			_ => false,
		}
	}
}
