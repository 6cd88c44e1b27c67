//! # Manifest Validator
//!
//! Verifies a plugin manifest's shape before the plugin may be registered
//! (spec §4.3): a valid identifier, a semver version, non-empty
//! name/description/author/license, identifier-shaped dependency keys,
//! semver-range dependency values, and string-only declared permissions.
//!
//! Every failure is collected rather than raised on the first one, so an
//! operator sees every problem in a manifest at once (spec §4.3, §7.1).
//!
//! The in-memory shape is fixed here; the manifest *file* format (YAML in
//! the reference deployment) is an external loader's concern (spec §6) —
//! this crate validates an already-parsed [`ManifestInput`].

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// The identifier shape: reverse-DNS or kebab-case, e.g. `audit-log` or
/// `com.acme.audit-log` (spec §4.3).
const IDENTIFIER_PATTERN: &str = r"^[a-z][a-z0-9_-]*([.-][a-z0-9]+)*$";

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(IDENTIFIER_PATTERN).expect("static pattern is valid"));

/// A manifest as received from a loader, before validation: every field
/// that must be checked is still a plain string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestInput {
	pub identifier: String,
	pub name: String,
	pub version: String,
	pub description: String,
	pub author: String,
	pub license: String,
	#[serde(default)]
	pub keywords: Vec<String>,
	/// dependency identifier -> semver range string (`^1.2`, `~1.2.3`,
	/// `>=1.0`, or an exact version).
	#[serde(default)]
	pub dependencies: HashMap<String, String>,
	#[serde(default)]
	pub engines: HashMap<String, String>,
	#[serde(default)]
	pub declared_permissions: Vec<String>,
	/// Named extension points this plugin provides, distinct from the
	/// permissions it needs (supplemental to spec §3 — grounded in the
	/// teacher framework's WASM plugin `get_capabilities`).
	#[serde(default)]
	pub capabilities: Vec<String>,
}

/// A manifest that has passed every check in [`validate`].
#[derive(Debug, Clone)]
pub struct Manifest {
	pub identifier: String,
	pub name: String,
	pub version: Version,
	pub description: String,
	pub author: String,
	pub license: String,
	pub keywords: Vec<String>,
	pub dependencies: HashMap<String, VersionReq>,
	pub engines: HashMap<String, String>,
	pub declared_permissions: Vec<String>,
	pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, ThisError, PartialEq, Eq)]
pub enum ValidationError {
	#[error("identifier '{0}' does not match the required shape (reverse-DNS or kebab-case)")]
	InvalidIdentifier(String),

	#[error("version '{0}' is not a valid semver version")]
	InvalidVersion(String),

	#[error("field '{0}' must not be empty")]
	EmptyField(&'static str),

	#[error("dependency key '{0}' is not a valid plugin identifier")]
	InvalidDependencyKey(String),

	#[error("dependency range '{range}' for '{dependency}' is not a valid semver range")]
	InvalidDependencyRange { dependency: String, range: String },
}

/// Validate `input`, collecting every failure instead of stopping at the
/// first one (spec §4.3, §7.1).
pub fn validate(input: ManifestInput) -> Result<Manifest, Vec<ValidationError>> {
	let mut errors = Vec::new();

	if !IDENTIFIER_RE.is_match(&input.identifier) {
		errors.push(ValidationError::InvalidIdentifier(input.identifier.clone()));
	}

	let version = Version::parse(&input.version);
	if version.is_err() {
		errors.push(ValidationError::InvalidVersion(input.version.clone()));
	}

	if input.name.trim().is_empty() {
		errors.push(ValidationError::EmptyField("name"));
	}
	if input.description.trim().is_empty() {
		errors.push(ValidationError::EmptyField("description"));
	}
	if input.author.trim().is_empty() {
		errors.push(ValidationError::EmptyField("author"));
	}
	if input.license.trim().is_empty() {
		errors.push(ValidationError::EmptyField("license"));
	}

	let mut dependencies = HashMap::with_capacity(input.dependencies.len());
	for (dep_key, range) in &input.dependencies {
		if !IDENTIFIER_RE.is_match(dep_key) {
			errors.push(ValidationError::InvalidDependencyKey(dep_key.clone()));
			continue;
		}
		match VersionReq::parse(range) {
			Ok(parsed) => {
				dependencies.insert(dep_key.clone(), parsed);
			}
			Err(_) => errors.push(ValidationError::InvalidDependencyRange {
				dependency: dep_key.clone(),
				range: range.clone(),
			}),
		}
	}

	if !errors.is_empty() {
		tracing::warn!(identifier = %input.identifier, error_count = errors.len(), "manifest failed validation");
		return Err(errors);
	}

	tracing::debug!(identifier = %input.identifier, "manifest passed validation");
	Ok(Manifest {
		identifier: input.identifier,
		name: input.name,
		version: version.expect("checked above"),
		description: input.description,
		author: input.author,
		license: input.license,
		keywords: input.keywords,
		dependencies,
		engines: input.engines,
		declared_permissions: input.declared_permissions,
		capabilities: input.capabilities,
	})
}

/// Collapses a failed validation into the kernel-wide [`objectos_core::Error::Validation`]
/// kind, so an HTTP adapter that only depends on `objectos-core` can surface
/// every collected problem without also depending on this crate (spec §7.1).
impl From<Vec<ValidationError>> for objectos_core::Error {
	fn from(errors: Vec<ValidationError>) -> Self {
		objectos_core::Error::Validation(errors.iter().map(ToString::to_string).collect())
	}
}
