//! Wires the audit pipeline into the kernel's event bus and owns the
//! append-only store of recorded entries.

use std::sync::{Arc, Mutex, PoisonError};

use objectos_core::ids;
use objectos_events::EventBus;
use serde_json::{json, Value};

use crate::entry::{
	extract_field_changes, redact_payload, resolve_metadata, resolve_resource, resolve_success, resolve_user_id, resolve_user_name, AuditEntry,
	DEFAULT_EXCLUDED_FIELDS,
};
use crate::event_type::AuditEventType;
use crate::query::{run, AuditQuery, QueryPage};

/// The audit plugin's deserializable configuration surface (spec §6:
/// `{enabled, trackFieldChanges, retentionDays, auditedObjects[],
/// excludedFields[]}`).
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditConfig {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_true")]
	pub track_field_changes: bool,
	/// Entries older than this are eligible for deletion by
	/// `purge_older_than`. Zero disables retention-based purging.
	#[serde(default)]
	pub retention_days: u32,
	/// Object names to record; empty means every object is audited.
	#[serde(default)]
	pub audited_objects: Vec<String>,
	#[serde(default = "default_excluded_fields")]
	pub excluded_fields: Vec<String>,
}

fn default_true() -> bool {
	true
}

fn default_excluded_fields() -> Vec<String> {
	DEFAULT_EXCLUDED_FIELDS.iter().map(|s| s.to_string()).collect()
}

impl Default for AuditConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			track_field_changes: true,
			retention_days: 0,
			audited_objects: Vec::new(),
			excluded_fields: default_excluded_fields(),
		}
	}
}

/// Subscribes to every `data.*`/`job.*` topic it cares about and
/// accumulates an append-only log of [`AuditEntry`] records.
pub struct AuditPipeline {
	config: AuditConfig,
	entries: Mutex<Vec<AuditEntry>>,
}

impl AuditPipeline {
	pub fn new(config: AuditConfig) -> Arc<Self> {
		Arc::new(Self {
			config,
			entries: Mutex::new(Vec::new()),
		})
	}

	/// Register an observer handler for every topic this pipeline records
	/// (spec §4.7's subscription list), plus the `audit.event.recorded`
	/// topic it emits once an entry has been appended (spec §2's data
	/// flow: "Audit Pipeline records entry and emits
	/// `audit.event.recorded`"). Observer topics never abort the
	/// triggering mutation even if recording logic were to fail.
	pub fn subscribe(self: &Arc<Self>, events: &EventBus) {
		if !self.config.enabled {
			tracing::info!("audit pipeline disabled; not subscribing to any topic");
			return;
		}
		events.register_topic("audit.event.recorded");
		for topic in AuditEventType::ALL_TOPICS {
			events.register_topic(topic);
			let pipeline = self.clone();
			let topic_owned = topic.to_string();
			let events_for_handler = events.clone();
			events.hook(
				topic,
				Arc::new(move |payload: Value| {
					let pipeline = pipeline.clone();
					let topic = topic_owned.clone();
					let events = events_for_handler.clone();
					Box::pin(async move {
						if let Some(id) = pipeline.record(&topic, payload) {
							let _ = events.trigger("audit.event.recorded", json!({ "id": id, "topic": topic })).await;
						}
						Ok(())
					})
				}),
			);
		}
	}

	/// Build and append an [`AuditEntry`] from a raw event payload,
	/// returning its id. Silently does nothing (returning `None`) for a
	/// topic this pipeline doesn't recognize.
	pub fn record(&self, topic: &str, payload: Value) -> Option<String> {
		let Some(event_type) = AuditEventType::from_topic(topic) else {
			tracing::warn!(topic, "audit pipeline invoked for an unrecognized topic");
			return None;
		};

		let object_name = payload.get("objectName").and_then(Value::as_str).map(str::to_string);
		if !self.config.audited_objects.is_empty() {
			if let Some(name) = &object_name {
				if !self.config.audited_objects.iter().any(|o| o == name) {
					return None;
				}
			}
		}

		let record_id = payload.get("recordId").and_then(Value::as_str).map(str::to_string);
		let user_id = resolve_user_id(&payload);
		let user_name = resolve_user_name(&payload);
		let resource = resolve_resource(&payload);
		let success = resolve_success(&payload);
		let metadata = resolve_metadata(&payload);
		let changes = if self.config.track_field_changes {
			extract_field_changes(&payload, &self.config.excluded_fields)
		} else {
			Vec::new()
		};
		let redacted = redact_payload(&payload, &self.config.excluded_fields);

		let entry = AuditEntry {
			id: ids::unique_id("audit"),
			timestamp: ids::now(),
			event_type,
			object_name,
			record_id,
			user_id,
			user_name,
			resource,
			success,
			changes,
			metadata,
			payload: redacted,
		};

		let id = entry.id.clone();
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
		Some(id)
	}

	pub fn query(&self, query: &AuditQuery) -> QueryPage {
		let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		run(&entries, query)
	}

	pub fn len(&self) -> usize {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Remove every entry older than `cutoff`, returning the count
	/// removed. A no-op contract when `retention_days` is zero is the
	/// caller's responsibility to honor — this method always purges what
	/// it's asked to (spec: "the core only defines the contract").
	pub fn purge_older_than(&self, cutoff: chrono::DateTime<chrono::Utc>) -> usize {
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		let before = entries.len();
		entries.retain(|entry| entry.timestamp >= cutoff);
		before - entries.len()
	}
}
