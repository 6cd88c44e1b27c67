//! The metadata entry shape and its type tag (spec §4.10).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One of the five kinds of metadata the registry tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataType {
	Object,
	Field,
	App,
	Chart,
	Page,
}

impl std::fmt::Display for MetadataType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			MetadataType::Object => "object",
			MetadataType::Field => "field",
			MetadataType::App => "app",
			MetadataType::Chart => "chart",
			MetadataType::Page => "page",
		};
		write!(f, "{s}")
	}
}

/// A registry entry: an id within its type, an optional owning package,
/// a customizability flag, and an opaque content payload (spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataEntry {
	pub id: String,
	pub metadata_type: MetadataType,
	pub package: Option<String>,
	/// `false` flags a system-owned entry: it rejects `unregister` and
	/// any mutation validated via `validate_object_customizable` /
	/// `validate_field_customizable` (spec §4.10).
	pub customizable: bool,
	pub content: Value,
}

impl MetadataEntry {
	pub fn new(id: impl Into<String>, metadata_type: MetadataType, content: Value) -> Self {
		Self {
			id: id.into(),
			metadata_type,
			package: None,
			customizable: true,
			content,
		}
	}

	pub fn system_owned(mut self) -> Self {
		self.customizable = false;
		self
	}

	pub fn with_package(mut self, package: impl Into<String>) -> Self {
		self.package = Some(package.into());
		self
	}
}

/// Composite key for an entry: its type plus its id within that type.
pub type EntryKey = (MetadataType, String);
