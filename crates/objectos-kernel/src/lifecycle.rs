//! The kernel's boot and shutdown sequence.
//!
//! `use_plugin` queues a plugin; `bootstrap` resolves a dependency order
//! (dependencies before dependents) and drives every plugin through
//! `init` then, once every plugin has initialized, `start`. Any failure
//! during bootstrap destroys the plugins that already succeeded, in
//! reverse order, before returning the original error. `shutdown` runs
//! the same reverse-order destroy, but best-effort: one plugin's failure
//! to tear down does not stop the others from being asked to.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use objectos_events::EventBus;
use objectos_registry::ServiceRegistry;
use objectos_resolver::{self as resolver, PluginNode, ResolverError};
use thiserror::Error as ThisError;

use crate::context::PluginContext;
use crate::plugin::{HealthReport, HealthStatus, Plugin, PluginError};

#[derive(Debug, ThisError)]
pub enum KernelError {
	#[error("dependency resolution failed: {0}")]
	Resolution(#[from] ResolverError),

	#[error("plugin '{plugin}' failed during {phase}: {message}")]
	Lifecycle {
		plugin: String,
		phase: &'static str,
		message: String,
	},

	#[error("the kernel has already been bootstrapped")]
	AlreadyBootstrapped,

	#[error("the kernel has not been bootstrapped yet")]
	NotBootstrapped,
}

/// So an HTTP adapter depending only on `objectos-core` can translate a
/// bootstrap/shutdown failure without also depending on this crate (spec
/// §7: dependency errors and lifecycle errors are both fatal to bootstrap).
impl From<KernelError> for objectos_core::Error {
	fn from(err: KernelError) -> Self {
		match err {
			KernelError::Resolution(resolver_err) => resolver_err.into(),
			KernelError::Lifecycle { plugin, message, .. } => objectos_core::Error::Lifecycle { plugin, message },
			KernelError::AlreadyBootstrapped | KernelError::NotBootstrapped => objectos_core::Error::Operational(err.to_string()),
		}
	}
}

pub type KernelResult<T> = Result<T, KernelError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
	Pending,
	Running,
	ShutDown,
}

/// Owns the plugin set, the shared registry and event bus, and the boot
/// order computed at bootstrap time.
pub struct Kernel {
	registry: ServiceRegistry,
	events: EventBus,
	pending: StdMutex<Vec<Arc<dyn Plugin>>>,
	boot_order: StdMutex<Vec<Arc<dyn Plugin>>>,
	state: StdMutex<State>,
}

impl Default for Kernel {
	fn default() -> Self {
		Self::new()
	}
}

impl Kernel {
	pub fn new() -> Self {
		Self {
			registry: ServiceRegistry::new(),
			events: EventBus::new(),
			pending: StdMutex::new(Vec::new()),
			boot_order: StdMutex::new(Vec::new()),
			state: StdMutex::new(State::Pending),
		}
	}

	pub fn registry(&self) -> &ServiceRegistry {
		&self.registry
	}

	pub fn events(&self) -> &EventBus {
		&self.events
	}

	/// Queue a plugin for the next `bootstrap()` call. A plugin's manifest
	/// is already a validated [`objectos_manifest::Manifest`] by the time
	/// it reaches this trait object, so an unvalidated manifest can never
	/// be queued in the first place.
	pub fn use_plugin(&self, plugin: Arc<dyn Plugin>) {
		self.pending.lock().unwrap_or_else(|e| e.into_inner()).push(plugin);
	}

	fn context_for(&self, plugin_id: &str) -> PluginContext {
		PluginContext::new(plugin_id.to_string(), self.registry.clone(), self.events.clone())
	}

	/// Resolve the queued plugins into dependency order, then run `init`
	/// followed by `start` across every plugin in that order. On any
	/// failure, already-initialized plugins are torn down in reverse
	/// order before the error is returned.
	pub async fn bootstrap(&self) -> KernelResult<()> {
		{
			let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
			if *state != State::Pending {
				return Err(KernelError::AlreadyBootstrapped);
			}
			*state = State::Running;
		}

		let plugins = self.pending.lock().unwrap_or_else(|e| e.into_inner()).clone();

		let nodes: Vec<PluginNode> = plugins
			.iter()
			.map(|plugin| {
				let manifest = plugin.manifest();
				let mut node = PluginNode::new(manifest.identifier.clone(), manifest.version.clone());
				for (dep_id, range) in &manifest.dependencies {
					node = node.depends_on(dep_id.clone(), range.clone());
				}
				node
			})
			.collect();

		let order = resolver::resolve(&nodes)?;

		let by_id: std::collections::HashMap<&str, &Arc<dyn Plugin>> = plugins
			.iter()
			.map(|plugin| (plugin.manifest().identifier.as_str(), plugin))
			.collect();
		let ordered: Vec<Arc<dyn Plugin>> = order
			.iter()
			.map(|id| by_id[id.as_str()].clone())
			.collect();

		let mut initialized: Vec<Arc<dyn Plugin>> = Vec::with_capacity(ordered.len());
		for plugin in &ordered {
			let id = plugin.manifest().identifier.clone();
			let ctx = self.context_for(&id);
			if let Err(err) = plugin.init(&ctx).await {
				tracing::error!(plugin = %id, error = %err, "plugin init failed, rolling back");
				self.rollback(&initialized).await;
				*self.state.lock().unwrap_or_else(|e| e.into_inner()) = State::Pending;
				return Err(lifecycle_error(&id, "init", err));
			}
			initialized.push(plugin.clone());
		}

		let mut started: Vec<Arc<dyn Plugin>> = Vec::with_capacity(ordered.len());
		for plugin in &ordered {
			let id = plugin.manifest().identifier.clone();
			let ctx = self.context_for(&id);
			if let Err(err) = plugin.start(&ctx).await {
				tracing::error!(plugin = %id, error = %err, "plugin start failed, rolling back");
				self.rollback(&initialized).await;
				*self.state.lock().unwrap_or_else(|e| e.into_inner()) = State::Pending;
				return Err(lifecycle_error(&id, "start", err));
			}
			started.push(plugin.clone());
		}

		*self.boot_order.lock().unwrap_or_else(|e| e.into_inner()) = ordered;
		Ok(())
	}

	/// Destroy `initialized` plugins in reverse order, logging but not
	/// propagating failures — used both for bootstrap rollback and for
	/// `shutdown`. Either way, every service the plugin registered during
	/// `init`/`start` is withdrawn from the registry once `destroy` runs,
	/// regardless of whether `destroy` itself succeeded (spec §8
	/// round-trip law: "services registered during init are removed").
	async fn rollback(&self, initialized: &[Arc<dyn Plugin>]) {
		for plugin in initialized.iter().rev() {
			let id = plugin.manifest().identifier.clone();
			if let Err(err) = plugin.destroy().await {
				tracing::warn!(plugin = %id, error = %err, "destroy during rollback failed, continuing");
			}
			let removed = self.registry.remove_owned_by(&id);
			if !removed.is_empty() {
				tracing::debug!(plugin = %id, services = ?removed, "withdrew services owned by destroyed plugin");
			}
		}
	}

	/// Destroy every running plugin in reverse boot order. Best-effort:
	/// one plugin's failure does not stop the rest from being asked to
	/// tear down.
	pub async fn shutdown(&self) -> KernelResult<()> {
		let ordered = {
			let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
			if *state != State::Running {
				return Err(KernelError::NotBootstrapped);
			}
			*state = State::ShutDown;
			std::mem::take(&mut *self.boot_order.lock().unwrap_or_else(|e| e.into_inner()))
		};

		self.rollback(&ordered).await;
		Ok(())
	}

	/// Aggregate health across every running plugin that reports one,
	/// taking the worst status (`Unhealthy` > `Degraded` > `Healthy`).
	/// Plugins that don't implement `health_check` are not considered.
	pub async fn health(&self) -> HealthReport {
		let ordered = self.boot_order.lock().unwrap_or_else(|e| e.into_inner()).clone();
		let mut worst = HealthStatus::Healthy;
		let mut checks = Vec::new();

		for plugin in &ordered {
			if let Some(report) = plugin.health_check().await {
				if report.status > worst {
					worst = report.status;
				}
				checks.push(crate::plugin::HealthCheck {
					name: plugin.manifest().identifier.clone(),
					status: report.status,
					message: report.message,
				});
			}
		}

		HealthReport {
			status: worst,
			message: None,
			metrics: serde_json::Value::Null,
			checks,
		}
	}
}

fn lifecycle_error(plugin: &str, phase: &'static str, err: PluginError) -> KernelError {
	KernelError::Lifecycle {
		plugin: plugin.to_string(),
		phase,
		message: err.to_string(),
	}
}
