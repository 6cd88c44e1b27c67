//! A permission set attaches an object to per-profile action flags and
//! per-field visibility/editability lists.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error as ThisError;

/// The four object-level actions a permission set can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
	Create,
	Read,
	Update,
	Delete,
}

impl Action {
	pub fn as_str(&self) -> &'static str {
		match self {
			Action::Create => "create",
			Action::Read => "read",
			Action::Update => "update",
			Action::Delete => "delete",
		}
	}
}

impl std::fmt::Display for Action {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// One profile's grant for an object: create/read/edit/delete flags and
/// an optional view filter restricting which records the grant covers.
#[derive(Debug, Clone, Default)]
pub struct ProfilePermission {
	pub allow_create: bool,
	pub allow_read: bool,
	pub allow_edit: bool,
	pub allow_delete: bool,
	pub view_filters: Option<Value>,
}

impl ProfilePermission {
	fn flag_for(&self, action: Action) -> bool {
		match action {
			Action::Create => self.allow_create,
			Action::Read => self.allow_read,
			Action::Update => self.allow_edit,
			Action::Delete => self.allow_delete,
		}
	}
}

/// Which profiles may see a field, and which of those may also edit it.
/// `editable_by` must be a subset of `visible_to` — validated by
/// [`PermissionSet::new`].
#[derive(Debug, Clone, Default)]
pub struct FieldPermission {
	pub visible_to: Vec<String>,
	pub editable_by: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAction {
	Read,
	Edit,
}

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum PermissionSetError {
	#[error("field '{field}' grants edit to '{profile}' without also granting read")]
	EditWithoutRead { field: String, profile: String },
}

/// The profile grants and field visibility rules for one object.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
	pub object: String,
	pub profiles: HashMap<String, ProfilePermission>,
	pub fields: HashMap<String, FieldPermission>,
}

impl PermissionSet {
	/// Build a permission set, rejecting a field whose `editable_by` grants
	/// a profile that isn't also in `visible_to` (spec: "editable requires
	/// readable, validated at load time").
	pub fn new(
		object: impl Into<String>,
		profiles: HashMap<String, ProfilePermission>,
		fields: HashMap<String, FieldPermission>,
	) -> Result<Self, PermissionSetError> {
		for (field, perm) in &fields {
			for profile in &perm.editable_by {
				if !perm.visible_to.iter().any(|p| p == profile) {
					return Err(PermissionSetError::EditWithoutRead {
						field: field.clone(),
						profile: profile.clone(),
					});
				}
			}
		}
		Ok(Self {
			object: object.into(),
			profiles,
			fields,
		})
	}

	pub fn profile_allows(&self, profile: &str, action: Action) -> Option<&ProfilePermission> {
		self.profiles
			.get(profile)
			.filter(|perm| perm.flag_for(action))
	}

	pub fn check_field(&self, field: &str, profiles: &[String], action: FieldAction) -> bool {
		let Some(perm) = self.fields.get(field) else {
			return false;
		};
		match action {
			FieldAction::Read => profiles.iter().any(|p| perm.visible_to.iter().any(|v| v == p)),
			FieldAction::Edit => profiles.iter().any(|p| perm.editable_by.iter().any(|v| v == p)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn editable_by_without_visible_to_is_rejected() {
		let fields = HashMap::from([(
			"salary".to_string(),
			FieldPermission {
				visible_to: vec!["manager".to_string()],
				editable_by: vec!["admin".to_string()],
			},
		)]);
		let err = PermissionSet::new("employee", HashMap::new(), fields).unwrap_err();
		assert!(matches!(err, PermissionSetError::EditWithoutRead { .. }));
	}

	#[test]
	fn check_field_matrix() {
		let fields = HashMap::from([(
			"salary".to_string(),
			FieldPermission {
				visible_to: vec!["manager".to_string()],
				editable_by: vec!["manager".to_string()],
			},
		)]);
		let set = PermissionSet::new("employee", HashMap::new(), fields).unwrap();

		let manager = vec!["manager".to_string()];
		let clerk = vec!["clerk".to_string()];

		assert!(set.check_field("salary", &manager, FieldAction::Read));
		assert!(set.check_field("salary", &manager, FieldAction::Edit));
		assert!(!set.check_field("salary", &clerk, FieldAction::Read));
		assert!(!set.check_field("salary", &clerk, FieldAction::Edit));
	}
}
