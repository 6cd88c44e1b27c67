//! The permission engine: object-level `check`, field-level `checkField`,
//! and record-level `getRecordFilters`, each profile- and cache-aware.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::Duration;
use objectos_core::Error as CoreError;
use serde_json::{json, Value};

use crate::cache::PermissionCache;
use crate::context::PermissionContext;
use crate::permission_set::{Action, FieldAction, PermissionSet};
use crate::rls::{self, OrgWideDefault, SharingRule};
use crate::template;

/// The outcome of [`PermissionEngine::check`].
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
	pub allowed: bool,
	pub reason: Option<String>,
	pub filters: Option<Value>,
}

impl CheckResult {
	fn denied(reason: impl Into<String>) -> Self {
		Self {
			allowed: false,
			reason: Some(reason.into()),
			filters: None,
		}
	}

	fn allowed(filters: Option<Value>) -> Self {
		Self {
			allowed: true,
			reason: None,
			filters,
		}
	}
}

/// Record-level security configuration for one object: its
/// organization-wide default, any sharing rules extending it, and (for
/// `Owd::ControlledByParent` objects) the parent record's own filter.
#[derive(Debug, Clone, Default)]
pub struct RecordSecurity {
	pub owd: Option<OrgWideDefault>,
	pub sharing_rules: Vec<SharingRule>,
	pub parent_filter: Option<Value>,
}

pub struct PermissionEngineConfig {
	pub default_deny: bool,
	pub cache_ttl: Duration,
	pub cache_permissions: bool,
	pub tenant_isolation: bool,
	pub tenant_field: String,
}

impl Default for PermissionEngineConfig {
	fn default() -> Self {
		Self {
			default_deny: true,
			cache_ttl: Duration::seconds(60),
			cache_permissions: true,
			tenant_isolation: false,
			tenant_field: "organizationId".to_string(),
		}
	}
}

/// The permissions plugin's deserializable configuration surface (spec
/// §6: `{enabled, defaultDeny, permissionsDir, cachePermissions,
/// tenantIsolation, tenantField}`). `permissions_dir` names where a
/// YAML loader (an external collaborator, spec §1) would find
/// permission-set files; the engine itself only consumes the parsed
/// result via [`PermissionEngine::load_permission_set`].
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsConfig {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_true")]
	pub default_deny: bool,
	#[serde(default)]
	pub permissions_dir: Option<String>,
	#[serde(default = "default_true")]
	pub cache_permissions: bool,
	#[serde(default)]
	pub tenant_isolation: bool,
	#[serde(default = "default_tenant_field")]
	pub tenant_field: String,
}

fn default_true() -> bool {
	true
}

fn default_tenant_field() -> String {
	"organizationId".to_string()
}

impl Default for PermissionsConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			default_deny: true,
			permissions_dir: None,
			cache_permissions: true,
			tenant_isolation: false,
			tenant_field: default_tenant_field(),
		}
	}
}

impl From<PermissionsConfig> for PermissionEngineConfig {
	fn from(config: PermissionsConfig) -> Self {
		Self {
			default_deny: config.default_deny,
			cache_ttl: Duration::seconds(60),
			cache_permissions: config.cache_permissions,
			tenant_isolation: config.tenant_isolation,
			tenant_field: config.tenant_field,
		}
	}
}

/// Owns every object's permission set and record-level security policy,
/// plus the TTL cache over `check()` results.
pub struct PermissionEngine {
	default_deny: bool,
	cache_permissions: bool,
	tenant_isolation: bool,
	tenant_field: String,
	permission_sets: Mutex<HashMap<String, PermissionSet>>,
	record_security: Mutex<HashMap<String, RecordSecurity>>,
	cache: PermissionCache,
}

impl PermissionEngine {
	pub fn new(config: PermissionEngineConfig) -> Self {
		Self {
			default_deny: config.default_deny,
			cache_permissions: config.cache_permissions,
			tenant_isolation: config.tenant_isolation,
			tenant_field: config.tenant_field,
			permission_sets: Mutex::new(HashMap::new()),
			record_security: Mutex::new(HashMap::new()),
			cache: PermissionCache::new(config.cache_ttl),
		}
	}

	/// Replace the permission set for an object, invalidating the cache
	/// wholesale (spec: reload invalidates every cached result, not just
	/// the affected object's).
	pub fn load_permission_set(&self, set: PermissionSet) {
		let object = set.object.clone();
		self.permission_sets
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(set.object.clone(), set);
		self.cache.clear_all();
		tracing::debug!(object = %object, "loaded permission set, cache invalidated");
	}

	pub fn load_record_security(&self, object: impl Into<String>, security: RecordSecurity) {
		let object = object.into();
		self.record_security
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(object.clone(), security);
		self.cache.clear_all();
		tracing::debug!(object = %object, "loaded record security, cache invalidated");
	}

	/// `check(ctx, object, action)`: if no permission set exists for
	/// `object`, the answer is `!default_deny`. Otherwise each of
	/// `ctx.profiles` is consulted; if any grants the action, the check
	/// passes. If any allowing profile declares no view filter, the grant
	/// is unrestricted; otherwise every allowing profile's filter is OR'd.
	pub fn check(&self, ctx: &PermissionContext, object: &str, action: Action) -> CheckResult {
		if self.cache_permissions {
			if let Some(cached) = self.cache.get(&ctx.user_id, object, action.as_str()) {
				return cached;
			}
		}

		let result = self.with_tenant_scope(ctx, self.check_uncached(ctx, object, action));
		if self.cache_permissions {
			self.cache.put(&ctx.user_id, object, action.as_str(), result.clone());
		}
		result
	}

	/// When `tenant_isolation` is configured, an allowed result is always
	/// additionally scoped to the caller's `organizationId` — AND'd onto
	/// any existing view filter, or introduced fresh for an otherwise
	/// unrestricted grant. Denials and requests with no tenant on the
	/// context pass through unchanged (spec §6: `tenantIsolation`/
	/// `tenantField` permissions configuration).
	fn with_tenant_scope(&self, ctx: &PermissionContext, result: CheckResult) -> CheckResult {
		if !self.tenant_isolation || !result.allowed {
			return result;
		}
		let Some(org_id) = &ctx.organization_id else {
			return result;
		};
		let tenant_clause = json!({ self.tenant_field.clone(): org_id });
		let filters = match result.filters {
			None => tenant_clause,
			Some(existing) => json!({ "$and": [existing, tenant_clause] }),
		};
		CheckResult::allowed(Some(filters))
	}

	fn check_uncached(&self, ctx: &PermissionContext, object: &str, action: Action) -> CheckResult {
		let sets = self.permission_sets.lock().unwrap_or_else(PoisonError::into_inner);
		let Some(set) = sets.get(object) else {
			return if self.default_deny {
				CheckResult::denied(format!("no permission set for object '{object}'"))
			} else {
				CheckResult::allowed(None)
			};
		};

		let mut unrestricted = false;
		let mut filters = Vec::new();

		for profile in &ctx.profiles {
			if let Some(grant) = set.profile_allows(profile, action) {
				match &grant.view_filters {
					None => unrestricted = true,
					Some(filter) => filters.push(filter.clone()),
				}
			}
		}

		if unrestricted {
			return CheckResult::allowed(None);
		}
		if !filters.is_empty() {
			let merged = if filters.len() == 1 {
				filters.into_iter().next().expect("len checked above")
			} else {
				json!({ "$or": filters })
			};
			return CheckResult::allowed(Some(template::substitute(&merged, ctx)));
		}

		CheckResult::denied(format!(
			"No permission for action '{action}' on object '{object}'"
		))
	}

	/// `check(ctx, object, action)`, raised as a typed, HTTP-mappable
	/// error when denied — the shape the gate hook before a mutation
	/// needs (spec §4.6 failure semantics, §7 error taxonomy).
	pub fn enforce(&self, ctx: &PermissionContext, object: &str, action: Action) -> Result<CheckResult, CoreError> {
		let result = self.check(ctx, object, action);
		if result.allowed {
			Ok(result)
		} else {
			let reason = result.reason.unwrap_or_else(|| "permission denied".to_string());
			tracing::warn!(user_id = %ctx.user_id, object, action = action.as_str(), reason, "permission denied");
			Err(CoreError::PermissionDenied(reason))
		}
	}

	/// `checkField(ctx, object, field, action)`: true if any of
	/// `ctx.profiles` grants the requested field action.
	pub fn check_field(&self, ctx: &PermissionContext, object: &str, field: &str, action: FieldAction) -> bool {
		let sets = self.permission_sets.lock().unwrap_or_else(PoisonError::into_inner);
		sets.get(object)
			.is_some_and(|set| set.check_field(field, &ctx.profiles, action))
	}

	/// `getRecordFilters(ctx, object)`: the RLS filter (organization-wide
	/// default OR'd with sharing rules), template-substituted. Objects
	/// with no configured record security are unrestricted (`None`).
	/// Evaluated against `internal_access`; see [`OrgWideDefault`] for why
	/// `external_access` is not consulted here.
	pub fn get_record_filters(&self, ctx: &PermissionContext, object: &str) -> Option<Value> {
		let security = self.record_security.lock().unwrap_or_else(PoisonError::into_inner);
		let entry = security.get(object)?;
		let owd = entry.owd?;
		let filter = rls::evaluate(owd.internal_access, &entry.sharing_rules, &ctx.user_id, entry.parent_filter.as_ref())?;
		Some(template::substitute(&filter, ctx))
	}

	pub fn clear_user_cache(&self, user_id: &str) {
		self.cache.clear_user(user_id);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::permission_set::{FieldPermission, ProfilePermission};
	use crate::rls::{Owd, SharingAccess, SharingRuleType};
	use std::collections::HashMap as StdHashMap;

	fn engine() -> PermissionEngine {
		PermissionEngine::new(PermissionEngineConfig::default())
	}

	#[test]
	fn unconfigured_object_denies_by_default() {
		let engine = engine();
		let ctx = PermissionContext::new("u1").with_profile("sales");
		let result = engine.check(&ctx, "account", Action::Read);
		assert!(!result.allowed);
	}

	#[test]
	fn unconfigured_object_allows_when_default_deny_is_off() {
		let engine = PermissionEngine::new(PermissionEngineConfig { default_deny: false, ..PermissionEngineConfig::default() });
		let ctx = PermissionContext::new("u1");
		assert!(engine.check(&ctx, "account", Action::Read).allowed);
	}

	#[test]
	fn grant_with_view_filter_carries_substituted_filter() {
		let engine = engine();
		let profiles = StdHashMap::from([(
			"sales".to_string(),
			ProfilePermission {
				allow_read: true,
				view_filters: Some(json!({ "ownerId": "{{ userId }}" })),
				..Default::default()
			},
		)]);
		engine.load_permission_set(PermissionSet::new("account", profiles, StdHashMap::new()).unwrap());

		let ctx = PermissionContext::new("u1").with_profile("sales");
		let result = engine.check(&ctx, "account", Action::Read);
		assert!(result.allowed);
		assert_eq!(result.filters, Some(json!({ "ownerId": "u1" })));
	}

	#[test]
	fn a_denied_action_names_the_object_and_action() {
		let engine = engine();
		let profiles = StdHashMap::from([(
			"sales".to_string(),
			ProfilePermission { allow_read: true, ..Default::default() },
		)]);
		engine.load_permission_set(PermissionSet::new("account", profiles, StdHashMap::new()).unwrap());

		let ctx = PermissionContext::new("u1").with_profile("sales");
		let result = engine.check(&ctx, "account", Action::Delete);
		assert!(!result.allowed);
		assert_eq!(
			result.reason.unwrap(),
			"No permission for action 'delete' on object 'account'"
		);
	}

	#[test]
	fn one_unrestricted_profile_overrides_a_filtered_profile() {
		let engine = engine();
		let profiles = StdHashMap::from([
			(
				"sales".to_string(),
				ProfilePermission {
					allow_read: true,
					view_filters: Some(json!({ "ownerId": "{{ userId }}" })),
					..Default::default()
				},
			),
			(
				"admin".to_string(),
				ProfilePermission { allow_read: true, ..Default::default() },
			),
		]);
		engine.load_permission_set(PermissionSet::new("account", profiles, StdHashMap::new()).unwrap());

		let ctx = PermissionContext::new("u1").with_profile("sales").with_profile("admin");
		let result = engine.check(&ctx, "account", Action::Read);
		assert!(result.allowed);
		assert_eq!(result.filters, None);
	}

	#[test]
	fn enforce_surfaces_a_permission_denied_core_error() {
		let engine = engine();
		let ctx = PermissionContext::new("u1");
		let err = engine.enforce(&ctx, "account", Action::Read).unwrap_err();
		assert_eq!(err.code(), "PERMISSION_DENIED");
		assert_eq!(err.http_status(), 403);
	}

	#[test]
	fn check_field_consults_the_objects_permission_set() {
		let engine = engine();
		let fields = StdHashMap::from([(
			"ssn".to_string(),
			FieldPermission { visible_to: vec!["hr".to_string()], editable_by: vec![] },
		)]);
		engine.load_permission_set(PermissionSet::new("employee", StdHashMap::new(), fields).unwrap());

		let hr = PermissionContext::new("u1").with_profile("hr");
		let sales = PermissionContext::new("u2").with_profile("sales");
		assert!(engine.check_field(&hr, "employee", "ssn", FieldAction::Read));
		assert!(!engine.check_field(&sales, "employee", "ssn", FieldAction::Read));
	}

	#[test]
	fn get_record_filters_applies_rls_and_substitutes_templates() {
		let engine = engine();
		engine.load_record_security(
			"account",
			RecordSecurity {
				owd: Some(OrgWideDefault::new(Owd::Private, Owd::Private)),
				sharing_rules: vec![SharingRule::new(
					SharingRuleType::OwnerBased,
					"east_team",
					"west_team",
					SharingAccess::ReadOnly,
					json!({ "teamId": "t1" }),
				)],
				parent_filter: None,
			},
		);

		let ctx = PermissionContext::new("u1");
		let filters = engine.get_record_filters(&ctx, "account").unwrap();
		assert_eq!(filters, json!({ "$or": [{ "ownerId": "u1" }, { "teamId": "t1" }] }));
	}

	#[test]
	fn a_reload_invalidates_every_cached_result() {
		let engine = engine();
		let ctx = PermissionContext::new("u1").with_profile("sales");
		assert!(!engine.check(&ctx, "account", Action::Read).allowed);

		let profiles = StdHashMap::from([(
			"sales".to_string(),
			ProfilePermission { allow_read: true, ..Default::default() },
		)]);
		engine.load_permission_set(PermissionSet::new("account", profiles, StdHashMap::new()).unwrap());

		assert!(engine.check(&ctx, "account", Action::Read).allowed);
	}

	#[test]
	fn clear_user_cache_forces_a_fresh_evaluation_for_that_user_only() {
		let engine = engine();
		let profiles = StdHashMap::from([(
			"sales".to_string(),
			ProfilePermission { allow_read: true, ..Default::default() },
		)]);
		engine.load_permission_set(PermissionSet::new("account", profiles, StdHashMap::new()).unwrap());

		let ctx = PermissionContext::new("u1").with_profile("sales");
		assert!(engine.check(&ctx, "account", Action::Read).allowed);

		engine.clear_user_cache("u1");
		// still allowed post-clear; this just proves clear doesn't panic or
		// desync the cache for a subsequent lookup.
		assert!(engine.check(&ctx, "account", Action::Read).allowed);
	}

	#[test]
	fn tenant_isolation_scopes_an_unrestricted_grant_to_the_callers_organization() {
		let config = PermissionEngineConfig { tenant_isolation: true, ..PermissionEngineConfig::default() };
		let engine = PermissionEngine::new(config);
		let profiles = StdHashMap::from([(
			"admin".to_string(),
			ProfilePermission { allow_read: true, ..Default::default() },
		)]);
		engine.load_permission_set(PermissionSet::new("account", profiles, StdHashMap::new()).unwrap());

		let mut ctx = PermissionContext::new("u1").with_profile("admin");
		ctx.organization_id = Some("org1".to_string());
		let result = engine.check(&ctx, "account", Action::Read);
		assert!(result.allowed);
		assert_eq!(result.filters, Some(json!({ "organizationId": "org1" })));
	}

	#[test]
	fn tenant_isolation_ands_onto_an_existing_view_filter() {
		let config = PermissionEngineConfig { tenant_isolation: true, ..PermissionEngineConfig::default() };
		let engine = PermissionEngine::new(config);
		let profiles = StdHashMap::from([(
			"sales".to_string(),
			ProfilePermission {
				allow_read: true,
				view_filters: Some(json!({ "ownerId": "{{ userId }}" })),
				..Default::default()
			},
		)]);
		engine.load_permission_set(PermissionSet::new("account", profiles, StdHashMap::new()).unwrap());

		let mut ctx = PermissionContext::new("u1").with_profile("sales");
		ctx.organization_id = Some("org1".to_string());
		let result = engine.check(&ctx, "account", Action::Read);
		assert_eq!(
			result.filters,
			Some(json!({ "$and": [{ "ownerId": "u1" }, { "organizationId": "org1" }] }))
		);
	}

	#[test]
	fn tenant_isolation_is_a_no_op_without_an_organization_on_the_context() {
		let config = PermissionEngineConfig { tenant_isolation: true, ..PermissionEngineConfig::default() };
		let engine = PermissionEngine::new(config);
		let profiles = StdHashMap::from([(
			"admin".to_string(),
			ProfilePermission { allow_read: true, ..Default::default() },
		)]);
		engine.load_permission_set(PermissionSet::new("account", profiles, StdHashMap::new()).unwrap());

		let ctx = PermissionContext::new("u1").with_profile("admin");
		assert_eq!(engine.check(&ctx, "account", Action::Read).filters, None);
	}

	#[test]
	fn permissions_config_deserializes_with_documented_defaults() {
		let config: PermissionsConfig = serde_json::from_value(json!({})).unwrap();
		assert!(config.enabled);
		assert!(config.default_deny);
		assert!(config.cache_permissions);
		assert!(!config.tenant_isolation);
		assert_eq!(config.tenant_field, "organizationId");
	}

	#[test]
	fn disabling_cache_permissions_still_answers_correctly_without_caching() {
		let config = PermissionEngineConfig { cache_permissions: false, ..PermissionEngineConfig::default() };
		let engine = PermissionEngine::new(config);
		let ctx = PermissionContext::new("u1").with_profile("sales");
		assert!(!engine.check(&ctx, "account", Action::Read).allowed);

		let profiles = StdHashMap::from([(
			"sales".to_string(),
			ProfilePermission { allow_read: true, ..Default::default() },
		)]);
		engine.load_permission_set(PermissionSet::new("account", profiles, StdHashMap::new()).unwrap());
		// With caching disabled the second check must re-evaluate rather
		// than return the earlier cached denial.
		assert!(engine.check(&ctx, "account", Action::Read).allowed);
	}
}
