//! The request-scoped identity a permission check is evaluated against.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

/// Carries everything the engine needs to decide a check: who is asking,
/// under which profiles/role/permission-sets, and any metadata a
/// permission set's filter templates may reference.
///
/// Generalized from one HTTP request's derived booleans to the
/// multi-profile, multi-tenant shape this engine's checks need.
#[derive(Debug, Clone, Default)]
pub struct PermissionContext {
	pub user_id: String,
	pub organization_id: Option<String>,
	pub profiles: Vec<String>,
	pub role: Option<String>,
	pub permission_sets: HashSet<String>,
	pub metadata: HashMap<String, Value>,
}

impl PermissionContext {
	pub fn new(user_id: impl Into<String>) -> Self {
		Self {
			user_id: user_id.into(),
			organization_id: None,
			profiles: Vec::new(),
			role: None,
			permission_sets: HashSet::new(),
			metadata: HashMap::new(),
		}
	}

	pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
		self.profiles.push(profile.into());
		self
	}

	pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
		self.metadata.insert(key.into(), value);
		self
	}

	/// The first assigned profile, used by the `{{ profile }}` filter
	/// template.
	pub fn first_profile(&self) -> Option<&str> {
		self.profiles.first().map(String::as_str)
	}
}
