//! Kernel-wide error kinds.
//!
//! Every crate in the workspace defines its own `thiserror`-derived error
//! enum for the specifics of its domain. [`Error`] is the small, stable
//! subset that crosses crate boundaries and that an HTTP adapter is
//! expected to translate into a status code (see spec §7).

use thiserror::Error as ThisError;

/// The six error kinds the kernel produces, per spec §7.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Malformed manifest, unknown field type, invalid permission filter.
	/// Collected rather than fail-fast; see [`Error::Validation`]'s payload.
	#[error("validation failed: {0:?}")]
	Validation(Vec<String>),

	/// Missing dependency, dependency cycle, or version-range conflict.
	/// Fatal to bootstrap.
	#[error("dependency error: {0}")]
	Dependency(String),

	/// A plugin's `init` or `start` returned an error. Fatal to bootstrap;
	/// triggers best-effort rollback of already-initialized plugins.
	#[error("lifecycle error in plugin '{plugin}': {message}")]
	Lifecycle { plugin: String, message: String },

	/// A pre-mutation gate hook denied the operation.
	#[error("permission denied: {0}")]
	PermissionDenied(String),

	/// Service, job, or permission-set lookup failed.
	#[error("not found: {0}")]
	NotFound(String),

	/// Queue max-retries exhausted, health-check failure, template
	/// rendering error, or other non-fatal runtime failure.
	#[error("operational error: {0}")]
	Operational(String),
}

impl Error {
	/// A stable machine-readable code, for the HTTP boundary's status-code
	/// mapping (`PERMISSION_DENIED` -> 403, etc.).
	pub fn code(&self) -> &'static str {
		match self {
			Error::Validation(_) => "VALIDATION_ERROR",
			Error::Dependency(_) => "DEPENDENCY_ERROR",
			Error::Lifecycle { .. } => "LIFECYCLE_ERROR",
			Error::PermissionDenied(_) => "PERMISSION_DENIED",
			Error::NotFound(_) => "NOT_FOUND",
			Error::Operational(_) => "OPERATIONAL_ERROR",
		}
	}

	/// The HTTP status code an adapter should surface for this error.
	pub fn http_status(&self) -> u16 {
		match self {
			Error::Validation(_) => 400,
			Error::Dependency(_) => 500,
			Error::Lifecycle { .. } => 500,
			Error::PermissionDenied(_) => 403,
			Error::NotFound(_) => 404,
			Error::Operational(_) => 500,
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;

/// Standard response envelope for non-`data.*` HTTP endpoints (spec §6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Envelope<T: serde::Serialize> {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

impl<T: serde::Serialize> Envelope<T> {
	pub fn ok(data: T) -> Self {
		Self {
			success: true,
			data: Some(data),
			error: None,
			message: None,
		}
	}

	pub fn err(error: &Error) -> Envelope<T> {
		Envelope {
			success: false,
			data: None,
			error: Some(error.code().to_string()),
			message: Some(error.to_string()),
		}
	}
}
