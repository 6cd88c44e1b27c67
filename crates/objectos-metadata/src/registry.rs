//! The metadata registry: a typed collection keyed by `(type, id)` with
//! customizability guards for system-owned entries (spec §4.10).

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use thiserror::Error as ThisError;

use crate::entry::{EntryKey, MetadataEntry, MetadataType};

#[derive(Debug, ThisError)]
pub enum MetadataError {
	#[error("no {metadata_type} metadata entry '{id}'")]
	NotFound { metadata_type: MetadataType, id: String },

	#[error("'{id}' is a system {metadata_type} and cannot be customized")]
	NotCustomizable { metadata_type: MetadataType, id: String },
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// So an HTTP adapter depending only on `objectos-core` can translate a
/// metadata lookup/customizability failure without also depending on this
/// crate (spec §7).
impl From<MetadataError> for objectos_core::Error {
	fn from(err: MetadataError) -> Self {
		match err {
			MetadataError::NotFound { metadata_type, id } => {
				objectos_core::Error::NotFound(format!("{metadata_type} '{id}'"))
			}
			MetadataError::NotCustomizable { .. } => objectos_core::Error::Operational(err.to_string()),
		}
	}
}

/// Field ids are namespaced under their owning object: `{object}.{field}`.
fn field_id(object: &str, field: &str) -> String {
	format!("{object}.{field}")
}

#[derive(Default)]
pub struct MetadataRegistry {
	entries: Mutex<HashMap<EntryKey, MetadataEntry>>,
}

impl MetadataRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add or replace an entry. Replacing a system-owned entry is not
	/// itself guarded here (it's an internal load operation, e.g. at
	/// boot); runtime mutation call sites are expected to consult
	/// `validate_object_customizable`/`validate_field_customizable`
	/// first (spec §4.10).
	pub fn register(&self, entry: MetadataEntry) {
		let key = (entry.metadata_type, entry.id.clone());
		tracing::debug!(metadata_type = %entry.metadata_type, id = %entry.id, "registered metadata entry");
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).insert(key, entry);
	}

	/// Remove an entry. A no-op that raises [`MetadataError::NotCustomizable`]
	/// for a system-flagged entry — "the entry is still present after"
	/// (spec §8 invariant 7).
	pub fn unregister(&self, metadata_type: MetadataType, id: &str) -> MetadataResult<()> {
		let key = (metadata_type, id.to_string());
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		let Some(entry) = entries.get(&key) else {
			return Err(MetadataError::NotFound { metadata_type, id: id.to_string() });
		};
		if !entry.customizable {
			return Err(MetadataError::NotCustomizable { metadata_type, id: id.to_string() });
		}
		entries.remove(&key);
		Ok(())
	}

	pub fn get(&self, metadata_type: MetadataType, id: &str) -> MetadataResult<MetadataEntry> {
		self.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get(&(metadata_type, id.to_string()))
			.cloned()
			.ok_or_else(|| MetadataError::NotFound { metadata_type, id: id.to_string() })
	}

	/// Every entry of `metadata_type`, sorted by id for deterministic
	/// listing order.
	pub fn list(&self, metadata_type: MetadataType) -> Vec<MetadataEntry> {
		let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		let mut matching: Vec<MetadataEntry> = entries
			.values()
			.filter(|entry| entry.metadata_type == metadata_type)
			.cloned()
			.collect();
		matching.sort_by(|a, b| a.id.cmp(&b.id));
		matching
	}

	/// Remove every entry belonging to `package`, regardless of
	/// customizability — package teardown is a bulk, trusted operation
	/// distinct from a single-entry runtime `unregister`.
	pub fn unregister_package(&self, package: &str) -> usize {
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		let before = entries.len();
		entries.retain(|_, entry| entry.package.as_deref() != Some(package));
		before - entries.len()
	}

	/// Whether object `id` may be created or customized: `true` if it
	/// doesn't exist yet, `true` if it exists and is customizable, and an
	/// error naming the system object otherwise (spec §4.10).
	pub fn validate_object_customizable(&self, id: &str) -> MetadataResult<bool> {
		let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		match entries.get(&(MetadataType::Object, id.to_string())) {
			None => Ok(true),
			Some(entry) if entry.customizable => Ok(true),
			Some(_) => Err(MetadataError::NotCustomizable { metadata_type: MetadataType::Object, id: id.to_string() }),
		}
	}

	/// Same contract as `validate_object_customizable`, for a field
	/// namespaced under `object`.
	pub fn validate_field_customizable(&self, object: &str, field: &str) -> MetadataResult<bool> {
		let id = field_id(object, field);
		let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		match entries.get(&(MetadataType::Field, id.clone())) {
			None => Ok(true),
			Some(entry) if entry.customizable => Ok(true),
			Some(_) => Err(MetadataError::NotCustomizable { metadata_type: MetadataType::Field, id }),
		}
	}

	pub fn len(&self) -> usize {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
