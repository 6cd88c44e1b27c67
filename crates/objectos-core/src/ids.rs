//! Shared id and timestamp helpers used by the audit pipeline, job queue,
//! and notification queue.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Current time as an ISO-8601 string (spec: Audit Entry `timestamp`).
pub fn now_iso8601() -> String {
	Utc::now().to_rfc3339()
}

pub fn now() -> DateTime<Utc> {
	Utc::now()
}

/// A monotonically-unique id of the shape `<prefix>_<timestamp>_<sequence>`
/// (spec §4.7: `audit_<timestamp>_<random>`). A process-local atomic
/// sequence number stands in for the random component: it is cheaper than
/// a CSPRNG draw per event and, unlike randomness, is guaranteed unique
/// within one kernel process without a collision check.
pub fn unique_id(prefix: &str) -> String {
	let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
	format!("{prefix}_{}_{seq:x}", Utc::now().timestamp_millis())
}
