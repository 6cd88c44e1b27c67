//! Record-level security: an organization-wide default combined with
//! sharing rules that extend it.

use serde_json::{json, Value};

/// The baseline access policy for an object, before sharing rules
/// (spec §3: OWD `internalAccess`/`externalAccess`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owd {
	PublicReadWrite,
	PublicReadOnly,
	Private,
	/// Access mirrors a parent record's policy rather than carrying one
	/// of its own. `evaluate` honors a supplied parent filter; with none
	/// supplied there is no parent context to mirror and it falls back
	/// to `Private`'s owner-filter baseline.
	ControlledByParent,
}

/// An object's full organization-wide default: separate policies for
/// same-domain (`internal_access`) and cross-domain (`external_access`)
/// requesters, plus whether access may additionally flow down the role
/// hierarchy (spec §3).
///
/// This engine evaluates `internal_access` only — resolving whether a
/// given request is "external" (cross-organization) is a tenant/data-
/// driver concern (spec §1 lists persistence drivers as external
/// collaborators), so `external_access` is carried on this struct for
/// that driver to consult rather than evaluated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrgWideDefault {
	pub internal_access: Owd,
	pub external_access: Owd,
	pub grant_access_using_hierarchy: bool,
}

impl OrgWideDefault {
	pub fn new(internal_access: Owd, external_access: Owd) -> Self {
		Self {
			internal_access,
			external_access,
			grant_access_using_hierarchy: true,
		}
	}

	pub fn without_hierarchy(mut self) -> Self {
		self.grant_access_using_hierarchy = false;
		self
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingAccess {
	ReadOnly,
	ReadWrite,
}

/// How a sharing rule selects the records it extends access to (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingRuleType {
	OwnerBased,
	CriteriaBased,
	TerritoryBased,
}

/// One rule extending the OWD baseline with an additional filter, from a
/// source group to a target group. `cascade` names related objects this
/// rule's access additionally extends to (spec §3: "optional cascade
/// list of related objects") — the core records the list; propagating
/// access to those related objects is a data-driver concern.
#[derive(Debug, Clone)]
pub struct SharingRule {
	pub rule_type: SharingRuleType,
	pub source_group: String,
	pub target_group: String,
	pub access: SharingAccess,
	pub filter: Value,
	pub cascade: Vec<String>,
}

impl SharingRule {
	pub fn new(
		rule_type: SharingRuleType,
		source_group: impl Into<String>,
		target_group: impl Into<String>,
		access: SharingAccess,
		filter: Value,
	) -> Self {
		Self {
			rule_type,
			source_group: source_group.into(),
			target_group: target_group.into(),
			access,
			filter,
			cascade: Vec::new(),
		}
	}

	pub fn with_cascade(mut self, cascade: Vec<String>) -> Self {
		self.cascade = cascade;
		self
	}
}

/// Evaluate `owd` and `sharing_rules` into a record filter for `user_id`,
/// or `None` for unrestricted access.
///
/// - `PublicReadWrite`: no filter.
/// - `PublicReadOnly`: no filter for read; sharing rules granting
///   `ReadWrite` OR the owner filter restrict writes.
/// - `Private`: the owner filter, OR'd with every sharing rule's filter.
/// - `ControlledByParent`: `parent_filter` verbatim when supplied,
///   otherwise `Private`'s owner-filter baseline.
pub fn evaluate(owd: Owd, sharing_rules: &[SharingRule], user_id: &str, parent_filter: Option<&Value>) -> Option<Value> {
	let owner_filter = json!({ "ownerId": user_id });

	match owd {
		Owd::PublicReadWrite => None,
		Owd::PublicReadOnly => {
			let mut clauses = vec![owner_filter];
			clauses.extend(
				sharing_rules
					.iter()
					.filter(|rule| rule.access == SharingAccess::ReadWrite)
					.map(|rule| rule.filter.clone()),
			);
			Some(or_filter(clauses))
		}
		Owd::Private => {
			let mut clauses = vec![owner_filter];
			clauses.extend(sharing_rules.iter().map(|rule| rule.filter.clone()));
			Some(or_filter(clauses))
		}
		Owd::ControlledByParent => match parent_filter {
			Some(filter) => Some(filter.clone()),
			None => evaluate(Owd::Private, sharing_rules, user_id, None),
		},
	}
}

fn or_filter(clauses: Vec<Value>) -> Value {
	if clauses.len() == 1 {
		clauses.into_iter().next().expect("len checked above")
	} else {
		json!({ "$or": clauses })
	}
}
