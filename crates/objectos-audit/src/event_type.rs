//! The typed event taxonomy behind the audit pipeline's stringly-typed
//! hook-topic boundary.
//!
//! Hook topics stay plain strings so plugin authors can subscribe without
//! depending on this crate, but the pipeline itself converts each
//! incoming topic into an [`AuditEventType`] once, at the boundary,
//! rather than carrying a string through storage and query filters.

/// Every topic the audit pipeline subscribes to, named the way the
/// teacher framework's audit reference names its `AuditEventType`
/// variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditEventType {
	DataCreate,
	DataUpdate,
	DataDelete,
	DataFind,
	JobEnqueued,
	JobScheduled,
	JobStarted,
	JobCompleted,
	JobFailed,
	JobRetried,
	JobCancelled,
}

impl AuditEventType {
	/// The full list of topics the pipeline subscribes to at boot.
	pub const ALL_TOPICS: &'static [&'static str] = &[
		"data.create",
		"data.update",
		"data.delete",
		"data.find",
		"job.enqueued",
		"job.scheduled",
		"job.started",
		"job.completed",
		"job.failed",
		"job.retried",
		"job.cancelled",
	];

	pub fn from_topic(topic: &str) -> Option<Self> {
		match topic {
			"data.create" => Some(Self::DataCreate),
			"data.update" => Some(Self::DataUpdate),
			"data.delete" => Some(Self::DataDelete),
			"data.find" => Some(Self::DataFind),
			"job.enqueued" => Some(Self::JobEnqueued),
			"job.scheduled" => Some(Self::JobScheduled),
			"job.started" => Some(Self::JobStarted),
			"job.completed" => Some(Self::JobCompleted),
			"job.failed" => Some(Self::JobFailed),
			"job.retried" => Some(Self::JobRetried),
			"job.cancelled" => Some(Self::JobCancelled),
			_ => None,
		}
	}

	pub fn as_topic(&self) -> &'static str {
		match self {
			Self::DataCreate => "data.create",
			Self::DataUpdate => "data.update",
			Self::DataDelete => "data.delete",
			Self::DataFind => "data.find",
			Self::JobEnqueued => "job.enqueued",
			Self::JobScheduled => "job.scheduled",
			Self::JobStarted => "job.started",
			Self::JobCompleted => "job.completed",
			Self::JobFailed => "job.failed",
			Self::JobRetried => "job.retried",
			Self::JobCancelled => "job.cancelled",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_subscribed_topic_round_trips_through_the_enum() {
		for topic in AuditEventType::ALL_TOPICS {
			let event_type = AuditEventType::from_topic(topic).unwrap();
			assert_eq!(event_type.as_topic(), *topic);
		}
	}

	#[test]
	fn an_unsubscribed_topic_has_no_mapping() {
		assert!(AuditEventType::from_topic("data.beforeCreate").is_none());
	}
}
