//! `{{ user.name }}`-style variable substitution for notification bodies
//! (spec §4.9), resolving dotted paths against the request's `data` map.
//!
//! Distinct from `objectos_permissions::template`: that module resolves a
//! fixed, small set of permission-context variables; this one resolves
//! arbitrary dotted paths into an arbitrary JSON `data` payload, which is
//! what a notification template needs (`{{ user.name }}`,
//! `{{ order.total }}`, ...).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error as ThisError;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*)\s*\}\}").unwrap());

#[derive(Debug, ThisError)]
#[error("template variable '{0}' could not be resolved against the supplied data")]
pub struct TemplateError(pub String);

/// Render every `{{ path.to.value }}` placeholder in `text` against
/// `data`. A placeholder whose path does not resolve is a
/// [`TemplateError`] naming it (spec §7: "template rendering error" is
/// one of the operational error kinds).
pub fn render(text: &str, data: &Value) -> Result<String, TemplateError> {
	let mut error = None;
	let rendered = PLACEHOLDER.replace_all(text, |caps: &regex::Captures| {
		let path = &caps[1];
		match resolve_path(data, path) {
			Some(value) => value_to_plain_string(value),
			None => {
				error.get_or_insert_with(|| TemplateError(path.to_string()));
				String::new()
			}
		}
	});
	match error {
		Some(err) => Err(err),
		None => Ok(rendered.into_owned()),
	}
}

fn resolve_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
	path.split('.').try_fold(data, |current, segment| current.get(segment))
}

fn value_to_plain_string(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}
