//! # Dependency Resolver
//!
//! Produces a total order over a set of plugins such that every plugin
//! appears after all of its declared dependencies (spec §4.4), via a
//! topological sort implemented as DFS with three-colour marking —
//! white (unvisited), gray (on the current path), black (fully
//! processed). A back-edge to a gray node is a cycle; its members are
//! read off the current DFS path. A dependency identifier with no
//! matching node is reported separately from a cycle. A declared
//! version range that the available dependency's version does not
//! satisfy is reported as a conflict naming both sides.

use std::collections::HashMap;

use semver::{Version, VersionReq};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ResolverError {
	#[error("dependency cycle detected: {}", .0.join(" -> "))]
	Cycle(Vec<String>),

	#[error("plugin '{plugin}' depends on unresolved plugin '{dependency}'")]
	MissingDependency { plugin: String, dependency: String },

	#[error(
		"plugin '{plugin}' requires '{dependency}' {required}, but the available version is {available}"
	)]
	VersionConflict {
		plugin: String,
		dependency: String,
		required: String,
		available: String,
	},
}

pub type ResolverResult<T> = Result<T, ResolverError>;

/// So an HTTP adapter depending only on `objectos-core` can translate a
/// dependency-resolution failure without also depending on this crate
/// (spec §7: "dependency errors... fatal to bootstrap").
impl From<ResolverError> for objectos_core::Error {
	fn from(err: ResolverError) -> Self {
		objectos_core::Error::Dependency(err.to_string())
	}
}

/// One resolvable node: a plugin identifier, its version, and the version
/// ranges it requires of its declared dependencies.
#[derive(Debug, Clone)]
pub struct PluginNode {
	pub id: String,
	pub version: Version,
	/// dependency identifier -> required semver range
	pub dependencies: HashMap<String, VersionReq>,
}

impl PluginNode {
	pub fn new(id: impl Into<String>, version: Version) -> Self {
		Self {
			id: id.into(),
			version,
			dependencies: HashMap::new(),
		}
	}

	pub fn depends_on(mut self, id: impl Into<String>, range: VersionReq) -> Self {
		self.dependencies.insert(id.into(), range);
		self
	}
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
	White,
	Gray,
	Black,
}

/// Resolve `nodes` into a boot order where every dependency precedes its
/// dependents. Checks are reported in this priority: a missing dependency
/// or a version conflict is detected before recursing further into it, and
/// a cycle is detected as soon as the back-edge is found.
pub fn resolve(nodes: &[PluginNode]) -> ResolverResult<Vec<String>> {
	let by_id: HashMap<&str, &PluginNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
	let mut marks: HashMap<&str, Mark> = nodes.iter().map(|n| (n.id.as_str(), Mark::White)).collect();
	let mut order = Vec::with_capacity(nodes.len());
	let mut path: Vec<&str> = Vec::new();

	for node in nodes {
		if marks[node.id.as_str()] == Mark::White {
			if let Err(err) = visit(node, &by_id, &mut marks, &mut path, &mut order) {
				tracing::warn!(error = %err, "dependency resolution failed");
				return Err(err);
			}
		}
	}

	tracing::debug!(count = order.len(), "resolved plugin boot order");
	Ok(order)
}

fn visit<'a>(
	node: &'a PluginNode,
	by_id: &HashMap<&'a str, &'a PluginNode>,
	marks: &mut HashMap<&'a str, Mark>,
	path: &mut Vec<&'a str>,
	order: &mut Vec<String>,
) -> ResolverResult<()> {
	marks.insert(node.id.as_str(), Mark::Gray);
	path.push(node.id.as_str());

	let mut dep_ids: Vec<&String> = node.dependencies.keys().collect();
	dep_ids.sort();

	for dep_id in dep_ids {
		let required = &node.dependencies[dep_id];
		let dep = by_id.get(dep_id.as_str()).copied().ok_or_else(|| {
			ResolverError::MissingDependency {
				plugin: node.id.clone(),
				dependency: dep_id.clone(),
			}
		})?;

		if !required.matches(&dep.version) {
			return Err(ResolverError::VersionConflict {
				plugin: node.id.clone(),
				dependency: dep_id.clone(),
				required: required.to_string(),
				available: dep.version.to_string(),
			});
		}

		match marks.get(dep.id.as_str()).copied().unwrap_or(Mark::White) {
			Mark::White => visit(dep, by_id, marks, path, order)?,
			Mark::Gray => {
				let start = path.iter().position(|id| *id == dep.id.as_str()).unwrap_or(0);
				let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
				cycle.push(dep.id.clone());
				return Err(ResolverError::Cycle(cycle));
			}
			Mark::Black => {}
		}
	}

	path.pop();
	marks.insert(node.id.as_str(), Mark::Black);
	order.push(node.id.clone());
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn v(s: &str) -> Version {
		Version::parse(s).unwrap()
	}

	fn req(s: &str) -> VersionReq {
		VersionReq::parse(s).unwrap()
	}

	#[test]
	fn a_depends_on_nothing_b_depends_on_a_c_depends_on_a_and_b() {
		let a = PluginNode::new("a", v("1.0.0"));
		let b = PluginNode::new("b", v("1.0.0")).depends_on("a", req("^1.0"));
		let c = PluginNode::new("c", v("1.0.0"))
			.depends_on("a", req("^1.0"))
			.depends_on("b", req("^1.0"));

		let order = resolve(&[a, b, c]).unwrap();
		assert_eq!(order, vec!["a", "b", "c"]);
	}

	#[test]
	fn missing_dependency_names_the_unresolved_identifier() {
		let a = PluginNode::new("a", v("1.0.0")).depends_on("ghost", req("^1.0"));
		let err = resolve(&[a]).unwrap_err();
		assert!(matches!(
			err,
			ResolverError::MissingDependency { dependency, .. } if dependency == "ghost"
		));
	}

	#[test]
	fn two_node_cycle_names_both_members() {
		let a = PluginNode::new("a", v("1.0.0")).depends_on("b", req("^1.0"));
		let b = PluginNode::new("b", v("1.0.0")).depends_on("a", req("^1.0"));
		let err = resolve(&[a, b]).unwrap_err();
		match err {
			ResolverError::Cycle(members) => {
				assert!(members.contains(&"a".to_string()));
				assert!(members.contains(&"b".to_string()));
			}
			other => panic!("expected Cycle, got {other:?}"),
		}
	}

	#[test]
	fn version_range_conflict_names_both_sides() {
		let a = PluginNode::new("a", v("2.0.0"));
		let b = PluginNode::new("b", v("1.0.0")).depends_on("a", req("^1.0"));
		let err = resolve(&[a, b]).unwrap_err();
		match err {
			ResolverError::VersionConflict { required, available, .. } => {
				assert_eq!(required, "^1.0");
				assert_eq!(available, "2.0.0");
			}
			other => panic!("expected VersionConflict, got {other:?}"),
		}
	}

	#[test]
	fn self_loop_is_a_cycle_of_one() {
		let a = PluginNode::new("a", v("1.0.0")).depends_on("a", req("^1.0"));
		let err = resolve(&[a]).unwrap_err();
		assert!(matches!(err, ResolverError::Cycle(members) if members == vec!["a", "a"]));
	}

	#[rstest]
	#[case("1.0.0", "^1.0", true)]
	#[case("1.9.9", "^1.0", true)]
	#[case("2.0.0", "^1.0", false)] // major bump out of range
	#[case("1.0.0", "~1.0.1", false)] // tilde range excludes lower patch
	#[case("1.5.0", ">=1.0", true)]
	fn version_range_decision_table(#[case] available: &str, #[case] required: &str, #[case] satisfies: bool) {
		let a = PluginNode::new("a", v(available));
		let b = PluginNode::new("b", v("1.0.0")).depends_on("a", req(required));
		let result = resolve(&[a, b]);
		assert_eq!(result.is_ok(), satisfies);
	}

	#[test]
	fn every_resolver_error_converts_into_a_dependency_core_error() {
		let a = PluginNode::new("a", v("1.0.0")).depends_on("b", req("^1.0"));
		let err = resolve(&[a]).unwrap_err();
		let core_err: objectos_core::Error = err.into();
		assert_eq!(core_err.code(), "DEPENDENCY_ERROR");
		assert_eq!(core_err.http_status(), 500);
	}
}
