//! What a plugin is handed at `init`/`start` time.
//!
//! A plugin never sees the [`crate::lifecycle::Kernel`] itself — only a
//! [`PluginContext`] carrying shared handles to the service registry and
//! event bus, plus its own identifier for logging. There is deliberately
//! no back-reference from context to kernel: a plugin cannot reach into
//! the collection of other plugins or the boot sequence, only into the
//! services they chose to publish.

use objectos_events::{EventBus, Handler};
use objectos_registry::{RegistryError, ServiceRegistry};
use std::any::Any;
use std::sync::Arc;

/// Handed to a plugin on every lifecycle call. Cheap to clone — it only
/// holds `Arc`-backed shared state.
#[derive(Clone)]
pub struct PluginContext {
	plugin_id: String,
	registry: ServiceRegistry,
	events: EventBus,
}

impl PluginContext {
	pub fn new(plugin_id: impl Into<String>, registry: ServiceRegistry, events: EventBus) -> Self {
		Self {
			plugin_id: plugin_id.into(),
			registry,
			events,
		}
	}

	/// The identifier of the plugin this context was built for.
	pub fn plugin_id(&self) -> &str {
		&self.plugin_id
	}

	/// Publish a service under `name` for other plugins to consume. The
	/// registration is attributed to this context's plugin, so it is
	/// automatically withdrawn when that plugin is destroyed (spec §8
	/// round-trip law).
	pub fn register_service<T: Any + Send + Sync>(
		&self,
		name: &str,
		instance: T,
	) -> Result<(), RegistryError> {
		self.registry.register_owned(&self.plugin_id, name, instance)
	}

	/// Look up a service another plugin registered.
	pub fn service<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, RegistryError> {
		self.registry.get(name)
	}

	/// Register a handler on a topic, observer or gate alike.
	pub fn hook(&self, topic: &str, handler: Handler) {
		self.events.hook(topic, handler);
	}

	/// A handle to the shared event bus, for plugins that need to call
	/// `trigger` directly rather than only hook into topics.
	pub fn events(&self) -> &EventBus {
		&self.events
	}

	/// A handle to the shared service registry.
	pub fn registry(&self) -> &ServiceRegistry {
		&self.registry
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn register_and_fetch_a_service_through_the_context() {
		let ctx = PluginContext::new("audit", ServiceRegistry::new(), EventBus::new());
		ctx.register_service("clock", 42u32).unwrap();
		let value = ctx.service::<u32>("clock").unwrap();
		assert_eq!(*value, 42);
	}

	#[test]
	fn context_carries_its_own_plugin_id() {
		let ctx = PluginContext::new("jobs", ServiceRegistry::new(), EventBus::new());
		assert_eq!(ctx.plugin_id(), "jobs");
	}
}
