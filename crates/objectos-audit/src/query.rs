//! Filtering, sorting, and pagination over stored audit entries.

use chrono::{DateTime, Utc};

use crate::entry::AuditEntry;
use crate::event_type::AuditEventType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
	Ascending,
	Descending,
}

#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
	pub object_name: Option<String>,
	pub record_id: Option<String>,
	pub user_id: Option<String>,
	pub event_type: Option<AuditEventType>,
	pub start_date: Option<DateTime<Utc>>,
	pub end_date: Option<DateTime<Utc>>,
	pub page: usize,
	pub page_size: usize,
	pub sort: Option<SortOrder>,
}

impl AuditQuery {
	pub fn new() -> Self {
		Self {
			page: 1,
			page_size: 50,
			sort: Some(SortOrder::Descending),
			..Default::default()
		}
	}

	fn matches(&self, entry: &AuditEntry) -> bool {
		if let Some(object_name) = &self.object_name {
			if entry.object_name.as_deref() != Some(object_name.as_str()) {
				return false;
			}
		}
		if let Some(record_id) = &self.record_id {
			if entry.record_id.as_deref() != Some(record_id.as_str()) {
				return false;
			}
		}
		if let Some(user_id) = &self.user_id {
			if entry.user_id.as_deref() != Some(user_id.as_str()) {
				return false;
			}
		}
		if let Some(event_type) = self.event_type {
			if entry.event_type != event_type {
				return false;
			}
		}
		if let Some(start) = self.start_date {
			if entry.timestamp < start {
				return false;
			}
		}
		if let Some(end) = self.end_date {
			if entry.timestamp > end {
				return false;
			}
		}
		true
	}
}

/// The result of a query: the page of matching entries plus the total
/// match count (for the caller to compute page counts).
pub struct QueryPage {
	pub entries: Vec<AuditEntry>,
	pub total: usize,
}

/// Filter `entries` against `query`, sort, then slice out one page.
pub fn run(entries: &[AuditEntry], query: &AuditQuery) -> QueryPage {
	let mut matched: Vec<&AuditEntry> = entries.iter().filter(|e| query.matches(e)).collect();

	match query.sort.unwrap_or(SortOrder::Descending) {
		SortOrder::Ascending => matched.sort_by_key(|e| e.timestamp),
		SortOrder::Descending => matched.sort_by_key(|e| std::cmp::Reverse(e.timestamp)),
	}

	let total = matched.len();
	let page_size = query.page_size.max(1);
	let start = query.page.saturating_sub(1) * page_size;

	let entries = matched
		.into_iter()
		.skip(start)
		.take(page_size)
		.cloned()
		.collect();

	QueryPage { entries, total }
}
