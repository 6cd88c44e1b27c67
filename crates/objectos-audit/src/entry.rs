//! The audit entry model and the field-change/exclusion extraction that
//! builds one from a raw event payload.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::event_type::AuditEventType;

/// One field's before/after value, extracted from a payload shaped
/// `{ field: { oldValue, newValue } }`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
	pub field: String,
	pub old_value: Value,
	pub new_value: Value,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
	pub id: String,
	pub timestamp: DateTime<Utc>,
	pub event_type: AuditEventType,
	pub object_name: Option<String>,
	pub record_id: Option<String>,
	pub user_id: Option<String>,
	pub user_name: Option<String>,
	/// A free-form descriptor of the resource acted on, distinct from
	/// `object_name`/`record_id` (spec §3: "optional resource
	/// descriptor") — e.g. an HTTP route or a job name, for events that
	/// have no single object/record pair.
	pub resource: Option<Value>,
	/// Whether the underlying operation succeeded (spec §3: "success
	/// flag"). Events recorded by [`crate::pipeline::AuditPipeline`]
	/// default this to `true`; a `*.failed` job/notification event sets
	/// it to `false`.
	pub success: bool,
	pub changes: Vec<FieldChange>,
	pub metadata: Option<Value>,
	pub payload: Value,
}

/// Fields excluded from recorded entries unless the pipeline is
/// configured otherwise.
pub const DEFAULT_EXCLUDED_FIELDS: &[&str] = &["password", "token", "secret"];

/// Resolve the `userId` field out of an event payload, if present.
pub fn resolve_user_id(payload: &Value) -> Option<String> {
	payload.get("userId")?.as_str().map(str::to_string)
}

/// Resolve the `userName` field out of an event payload, if present.
pub fn resolve_user_name(payload: &Value) -> Option<String> {
	payload.get("userName")?.as_str().map(str::to_string)
}

/// Resolve an event's resource descriptor, if the payload carries one.
pub fn resolve_resource(payload: &Value) -> Option<Value> {
	payload.get("resource").cloned()
}

/// Resolve an event's free-form metadata map, if the payload carries one.
pub fn resolve_metadata(payload: &Value) -> Option<Value> {
	payload.get("metadata").cloned()
}

/// Whether the event reports a successful operation. A payload with no
/// `success` key is assumed successful — the pipeline subscribes to
/// `data.*`/`job.*` topics that fire on completion, and most of them
/// (`data.create`, `job.completed`) carry no explicit flag because
/// their firing at all implies success; only `*.failed` topics are
/// expected to set this to `false`.
pub fn resolve_success(payload: &Value) -> bool {
	payload.get("success").and_then(Value::as_bool).unwrap_or(true)
}

/// A payload value is a field change when it is an object with exactly
/// the `oldValue`/`newValue` keys.
fn is_field_change_shape(value: &Value) -> bool {
	value
		.as_object()
		.is_some_and(|obj| obj.contains_key("oldValue") && obj.contains_key("newValue"))
}

/// Extract every `{oldValue, newValue}`-shaped entry from `payload`'s
/// top-level `changes` object, excluding any field named in
/// `excluded_fields`.
pub fn extract_field_changes(payload: &Value, excluded_fields: &[String]) -> Vec<FieldChange> {
	let Some(changes) = payload.get("changes").and_then(Value::as_object) else {
		return Vec::new();
	};

	changes
		.iter()
		.filter(|(field, _)| !excluded_fields.iter().any(|excluded| excluded == *field))
		.filter(|(_, value)| is_field_change_shape(value))
		.map(|(field, value)| FieldChange {
			field: field.clone(),
			old_value: value["oldValue"].clone(),
			new_value: value["newValue"].clone(),
		})
		.collect()
}

/// Strip excluded field names from the top-level payload before it's
/// stored on the entry.
pub fn redact_payload(payload: &Value, excluded_fields: &[String]) -> Value {
	match payload.as_object() {
		Some(obj) => Value::Object(
			obj.iter()
				.filter(|(key, _)| !excluded_fields.iter().any(|excluded| excluded == *key))
				.map(|(key, value)| (key.clone(), value.clone()))
				.collect(),
		),
		None => payload.clone(),
	}
}
