//! The capability interface every plugin implements (spec §3, §9).
//!
//! Duck-typed plugin objects in the source system are replaced here with a
//! single trait: `init`, `start`, `destroy`, and an optional
//! `health_check`, enforced at compile time instead of by reflection
//! (spec §9's redesign note).

use async_trait::async_trait;
use objectos_manifest::Manifest;
use serde_json::Value;

use crate::context::PluginContext;

/// An error returned from any plugin lifecycle method. Carries enough
/// detail for the kernel to log and, for `init`/`start`, to build a
/// [`crate::lifecycle::KernelError::Lifecycle`].
#[derive(Debug, Clone)]
pub struct PluginError {
	pub code: String,
	pub message: String,
	pub details: Option<Value>,
}

impl PluginError {
	pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			code: code.into(),
			message: message.into(),
			details: None,
		}
	}

	pub fn with_details(mut self, details: Value) -> Self {
		self.details = Some(details);
		self
	}
}

impl std::fmt::Display for PluginError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "[{}] {}", self.code, self.message)
	}
}

impl std::error::Error for PluginError {}

pub type PluginResult<T> = Result<T, PluginError>;

/// Overall verdict of a plugin's [`Plugin::health_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
	Healthy,
	Degraded,
	Unhealthy,
}

/// One named sub-check contributing to a [`HealthReport`].
#[derive(Debug, Clone)]
pub struct HealthCheck {
	pub name: String,
	pub status: HealthStatus,
	pub message: Option<String>,
}

/// The result of `healthCheck()` (spec §4.5).
#[derive(Debug, Clone)]
pub struct HealthReport {
	pub status: HealthStatus,
	pub message: Option<String>,
	pub metrics: Value,
	pub checks: Vec<HealthCheck>,
}

impl HealthReport {
	pub fn healthy() -> Self {
		Self {
			status: HealthStatus::Healthy,
			message: None,
			metrics: Value::Null,
			checks: Vec::new(),
		}
	}
}

/// The capability set every plugin must implement: construction happens
/// externally (the embedder builds the concrete type), then the kernel
/// drives it through `init -> start -> (running) -> destroy` (spec §3).
#[async_trait]
pub trait Plugin: Send + Sync {
	/// The plugin's validated manifest — identifier, version, declared
	/// dependencies, permissions, and capabilities.
	fn manifest(&self) -> &Manifest;

	/// Called once, in dependency order, before any plugin's `start`.
	async fn init(&self, ctx: &PluginContext) -> PluginResult<()>;

	/// Called once, in dependency order, after every plugin has
	/// initialized — every service registered during `init` is available.
	async fn start(&self, ctx: &PluginContext) -> PluginResult<()>;

	/// Called once, in reverse dependency order, during shutdown or
	/// bootstrap rollback. Failures here are logged, not propagated
	/// (spec §4.5: best-effort shutdown).
	async fn destroy(&self) -> PluginResult<()>;

	/// Optional self-report; the kernel aggregates these by worst status
	/// across all plugins (spec §4.5).
	async fn health_check(&self) -> Option<HealthReport> {
		None
	}
}
