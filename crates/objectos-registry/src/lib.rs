//! # Service Registry
//!
//! A name -> instance map for process-lifetime-shared services placed by
//! initializing plugins (spec §4.1). First registration for a name wins;
//! every later attempt for the same name fails rather than silently
//! overwriting, since a service is immutable from the registry's view once
//! placed.
//!
//! Modeled after the teacher framework's `Apps` registry (lock behind a
//! `Mutex`, `PoisonError::into_inner` to keep a poisoned lock usable rather
//! than propagating a panic from one call into every later one).

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum RegistryError {
	#[error("service already registered: {0}")]
	AlreadyRegistered(String),

	#[error("service not found: {0}")]
	NotFound(String),

	#[error("service '{0}' registered under a different type than requested")]
	TypeMismatch(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// So an HTTP adapter depending only on `objectos-core` can translate a
/// registry lookup failure without also depending on this crate (spec §7).
impl From<RegistryError> for objectos_core::Error {
	fn from(err: RegistryError) -> Self {
		match err {
			RegistryError::NotFound(name) => objectos_core::Error::NotFound(format!("service '{name}'")),
			RegistryError::AlreadyRegistered(_) | RegistryError::TypeMismatch(_) => objectos_core::Error::Operational(err.to_string()),
		}
	}
}

type BoxedService = Arc<dyn Any + Send + Sync>;

/// The kernel's service registry.
///
/// Cloning a `ServiceRegistry` clones the handle, not the contents — all
/// clones see the same underlying map, matching the kernel-owned,
/// shared-for-the-life-of-the-process nature of the registry (spec §5).
#[derive(Clone, Default)]
pub struct ServiceRegistry {
	services: Arc<Mutex<HashMap<String, BoxedService>>>,
	/// service name -> the plugin identifier that registered it, so a
	/// plugin's registrations can be unwound as a batch when it's
	/// destroyed (spec §8 round-trip law: "registering then destroying a
	/// plugin leaves the service registry in its prior state").
	owners: Arc<Mutex<HashMap<String, String>>>,
}

impl ServiceRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register `instance` under `name`. Fails if `name` is already
	/// present; registrations are one-shot (spec §4.1, §3 Service
	/// invariant: "first registration wins and subsequent attempts fail").
	pub fn register<T: Any + Send + Sync>(&self, name: &str, instance: T) -> RegistryResult<()> {
		let mut services = self.services.lock().unwrap_or_else(PoisonError::into_inner);
		if services.contains_key(name) {
			return Err(RegistryError::AlreadyRegistered(name.to_string()));
		}
		services.insert(name.to_string(), Arc::new(instance));
		tracing::debug!(service = name, "registered service");
		Ok(())
	}

	/// Register `instance` under `name`, recording `plugin_id` as its
	/// owner so a later [`ServiceRegistry::remove_owned_by`] can undo it.
	/// Used by [`crate::ServiceRegistry`]'s callers in the plugin context
	/// rather than by plugins registering on another's behalf.
	pub fn register_owned<T: Any + Send + Sync>(&self, plugin_id: &str, name: &str, instance: T) -> RegistryResult<()> {
		self.register(name, instance)?;
		self.owners.lock().unwrap_or_else(PoisonError::into_inner).insert(name.to_string(), plugin_id.to_string());
		Ok(())
	}

	/// Remove every service owned by `plugin_id`, returning the names
	/// removed. Called when a plugin is destroyed so its registrations
	/// don't outlive it (spec §8 round-trip law).
	pub fn remove_owned_by(&self, plugin_id: &str) -> Vec<String> {
		let owned: Vec<String> = {
			let mut owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
			let owned: Vec<String> = owners.iter().filter(|(_, owner)| owner.as_str() == plugin_id).map(|(name, _)| name.clone()).collect();
			for name in &owned {
				owners.remove(name);
			}
			owned
		};
		let mut services = self.services.lock().unwrap_or_else(PoisonError::into_inner);
		for name in &owned {
			services.remove(name);
		}
		owned
	}

	/// Look up a service by name, downcasting to `T`.
	///
	/// Returns [`RegistryError::NotFound`] naming the absent service, or
	/// [`RegistryError::TypeMismatch`] if a service is registered under
	/// `name` but as a different concrete type. Wrapping call sites in a
	/// typed accessor function per service localizes this downcast (spec
	/// §9's note on reflection/dynamic service lookup).
	pub fn get<T: Any + Send + Sync>(&self, name: &str) -> RegistryResult<Arc<T>> {
		let services = self.services.lock().unwrap_or_else(PoisonError::into_inner);
		let entry = services
			.get(name)
			.ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
		entry
			.clone()
			.downcast::<T>()
			.map_err(|_| RegistryError::TypeMismatch(name.to_string()))
	}

	/// Whether a service is registered under `name`. Never fails.
	pub fn has(&self, name: &str) -> bool {
		self.services
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.contains_key(name)
	}

	/// Names of every currently registered service, for diagnostics.
	pub fn names(&self) -> Vec<String> {
		self.services
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.keys()
			.cloned()
			.collect()
	}

	/// Remove a service by name. Not part of normal operation (spec §4.1:
	/// "no deletion during normal operation") — reserved for the lifecycle
	/// manager to undo a plugin's registrations during rollback/shutdown.
	pub fn remove(&self, name: &str) -> bool {
		self.services
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(name)
			.is_some()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(true, true, false)] // registered, requested as matching type -> ok
	#[case(true, false, true)] // registered, requested as wrong type -> type mismatch
	#[case(false, true, true)] // never registered -> not found regardless of requested type
	fn get_decision_table(#[case] registered: bool, #[case] request_matching_type: bool, #[case] is_err: bool) {
		let registry = ServiceRegistry::new();
		if registered {
			registry.register("svc", 1u32).unwrap();
		}
		let result = if request_matching_type {
			registry.get::<u32>("svc").map(|_| ())
		} else {
			registry.get::<String>("svc").map(|_| ())
		};
		assert_eq!(result.is_err(), is_err);
	}

	#[test]
	fn register_then_get_roundtrips() {
		let registry = ServiceRegistry::new();
		registry.register("cache", 42u32).unwrap();
		assert_eq!(*registry.get::<u32>("cache").unwrap(), 42);
	}

	#[test]
	fn second_registration_of_same_name_fails() {
		let registry = ServiceRegistry::new();
		registry.register("cache", 1u32).unwrap();
		let err = registry.register("cache", 2u32).unwrap_err();
		assert!(matches!(err, RegistryError::AlreadyRegistered(name) if name == "cache"));
	}

	#[test]
	fn get_missing_service_names_it_in_the_error() {
		let registry = ServiceRegistry::new();
		let err = registry.get::<u32>("missing").unwrap_err();
		assert!(matches!(err, RegistryError::NotFound(name) if name == "missing"));
	}

	#[test]
	fn has_never_fails_and_reflects_registration() {
		let registry = ServiceRegistry::new();
		assert!(!registry.has("cache"));
		registry.register("cache", 1u32).unwrap();
		assert!(registry.has("cache"));
	}

	#[test]
	fn type_mismatch_is_distinct_from_not_found() {
		let registry = ServiceRegistry::new();
		registry.register("cache", 1u32).unwrap();
		let err = registry.get::<String>("cache").unwrap_err();
		assert!(matches!(err, RegistryError::TypeMismatch(_)));
	}

	#[test]
	fn remove_drops_registration_so_it_can_be_replaced() {
		let registry = ServiceRegistry::new();
		registry.register("cache", 1u32).unwrap();
		assert!(registry.remove("cache"));
		registry.register("cache", 2u32).unwrap();
		assert_eq!(*registry.get::<u32>("cache").unwrap(), 2);
	}

	#[test]
	fn clone_shares_the_same_underlying_map() {
		let registry = ServiceRegistry::new();
		let handle = registry.clone();
		registry.register("cache", 1u32).unwrap();
		assert!(handle.has("cache"));
	}

	#[test]
	fn remove_owned_by_only_drops_that_plugins_services() {
		let registry = ServiceRegistry::new();
		registry.register_owned("audit", "audit.store", 1u32).unwrap();
		registry.register_owned("jobs", "jobs.queue", 2u32).unwrap();

		let removed = registry.remove_owned_by("audit");
		assert_eq!(removed, vec!["audit.store".to_string()]);
		assert!(!registry.has("audit.store"));
		assert!(registry.has("jobs.queue"));
	}

	#[test]
	fn remove_owned_by_an_unknown_plugin_is_a_no_op() {
		let registry = ServiceRegistry::new();
		registry.register_owned("audit", "audit.store", 1u32).unwrap();
		assert!(registry.remove_owned_by("ghost").is_empty());
		assert!(registry.has("audit.store"));
	}

	#[rstest]
	#[case(RegistryError::NotFound("cache".into()), "NOT_FOUND", 404)]
	#[case(RegistryError::AlreadyRegistered("cache".into()), "OPERATIONAL_ERROR", 500)]
	#[case(RegistryError::TypeMismatch("cache".into()), "OPERATIONAL_ERROR", 500)]
	fn converts_into_the_matching_core_error_kind(#[case] err: RegistryError, #[case] code: &str, #[case] status: u16) {
		let core_err: objectos_core::Error = err.into();
		assert_eq!(core_err.code(), code);
		assert_eq!(core_err.http_status(), status);
	}
}
