//! `{{ variable }}` substitution inside a filter tree.
//!
//! Walks a [`serde_json::Value`] recursively over objects, arrays, and
//! strings, replacing `{{ userId }}`, `{{ profile }}` (the requester's
//! first profile), and any `{{ key }}` found in the permission context's
//! metadata map.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::context::PermissionContext;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").unwrap());

/// Substitute every `{{ ... }}` placeholder in `value`, in place.
pub fn substitute(value: &Value, ctx: &PermissionContext) -> Value {
	match value {
		Value::String(s) => Value::String(substitute_string(s, ctx)),
		Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, ctx)).collect()),
		Value::Object(map) => Value::Object(
			map.iter()
				.map(|(k, v)| (k.clone(), substitute(v, ctx)))
				.collect(),
		),
		other => other.clone(),
	}
}

fn substitute_string(s: &str, ctx: &PermissionContext) -> String {
	PLACEHOLDER
		.replace_all(s, |caps: &regex::Captures| resolve(&caps[1], ctx))
		.into_owned()
}

fn resolve(name: &str, ctx: &PermissionContext) -> String {
	match name {
		"userId" => ctx.user_id.clone(),
		"profile" => ctx.first_profile().unwrap_or_default().to_string(),
		other => ctx
			.metadata
			.get(other)
			.map(value_to_plain_string)
			.unwrap_or_default(),
	}
}

fn value_to_plain_string(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn ctx() -> PermissionContext {
		PermissionContext::new("u1")
			.with_profile("sales")
			.with_metadata("department", json!("north"))
	}

	#[test]
	fn substitutes_user_id_and_profile() {
		let filter = json!({ "ownerId": "{{ userId }}", "profile": "{{ profile }}" });
		let result = substitute(&filter, &ctx());
		assert_eq!(result, json!({ "ownerId": "u1", "profile": "sales" }));
	}

	#[test]
	fn substitutes_from_metadata_map() {
		let filter = json!({ "department": "{{ department }}" });
		let result = substitute(&filter, &ctx());
		assert_eq!(result, json!({ "department": "north" }));
	}

	#[test]
	fn walks_nested_arrays_and_objects() {
		let filter = json!({ "$or": [{ "ownerId": "{{ userId }}" }, { "teamId": "t1" }] });
		let result = substitute(&filter, &ctx());
		assert_eq!(result, json!({ "$or": [{ "ownerId": "u1" }, { "teamId": "t1" }] }));
	}

	#[test]
	fn an_unresolvable_placeholder_becomes_empty_string() {
		let filter = json!("{{ missing }}");
		let result = substitute(&filter, &ctx());
		assert_eq!(result, json!(""));
	}
}
