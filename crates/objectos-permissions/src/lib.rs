//! # Permission Engine
//!
//! Object, field, and record-level access control: `check` answers
//! whether a profile-bearing caller may perform an action on an object
//! and, if so, under which view filters; `checkField` answers the same
//! for one field; `getRecordFilters` applies organization-wide defaults
//! and sharing rules independent of the profile check. Results are
//! cached per `(userId, object, action)` with a TTL, invalidated on
//! reload or explicit `clearUserCache`.
//!
//! Built around a `Permission`/`PermissionContext` trait pair and
//! per-action flag checks, generalized from a single HTTP-derived
//! boolean set to multi-profile evaluation with filter templating and
//! record-level security.

pub mod cache;
pub mod context;
pub mod engine;
pub mod permission_set;
pub mod rls;
pub mod template;

pub use context::PermissionContext;
pub use engine::{CheckResult, PermissionEngine, PermissionEngineConfig, PermissionsConfig, RecordSecurity};
pub use permission_set::{Action, FieldAction, FieldPermission, PermissionSet, PermissionSetError, ProfilePermission};
pub use rls::{Owd, OrgWideDefault, SharingAccess, SharingRule, SharingRuleType};
