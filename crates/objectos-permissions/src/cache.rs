//! TTL cache for `check()` results, keyed by `(userId, object, action)`.
//!
//! Modeled on the teacher framework's `JwksCache`/`CachedJwks` pair: a
//! value plus an expiry timestamp, invalidated wholesale on reload and
//! per-user on `clearUserCache`.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::engine::CheckResult;

#[derive(Clone)]
struct CachedCheck {
	result: CheckResult,
	expires_at: DateTime<Utc>,
}

impl CachedCheck {
	fn is_expired(&self) -> bool {
		Utc::now() > self.expires_at
	}
}

pub struct PermissionCache {
	entries: Mutex<HashMap<(String, String, String), CachedCheck>>,
	ttl: Duration,
}

impl PermissionCache {
	pub fn new(ttl: Duration) -> Self {
		Self {
			entries: Mutex::new(HashMap::new()),
			ttl,
		}
	}

	pub fn get(&self, user_id: &str, object: &str, action: &str) -> Option<CheckResult> {
		let key = (user_id.to_string(), object.to_string(), action.to_string());
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		match entries.get(&key) {
			Some(entry) if !entry.is_expired() => Some(entry.result.clone()),
			Some(_) => {
				entries.remove(&key);
				None
			}
			None => None,
		}
	}

	pub fn put(&self, user_id: &str, object: &str, action: &str, result: CheckResult) {
		let key = (user_id.to_string(), object.to_string(), action.to_string());
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).insert(
			key,
			CachedCheck {
				result,
				expires_at: Utc::now() + self.ttl,
			},
		);
	}

	/// Drop every cached entry for `user_id` (e.g. after their profiles or
	/// permission sets changed).
	pub fn clear_user(&self, user_id: &str) {
		self.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.retain(|(cached_user, _, _), _| cached_user != user_id);
	}

	/// Drop every cached entry (e.g. after a permission-set reload).
	pub fn clear_all(&self) {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn result(allowed: bool) -> CheckResult {
		CheckResult {
			allowed,
			reason: None,
			filters: None,
		}
	}

	#[test]
	fn put_then_get_round_trips() {
		let cache = PermissionCache::new(Duration::seconds(60));
		cache.put("u1", "account", "read", result(true));
		assert!(cache.get("u1", "account", "read").unwrap().allowed);
	}

	#[test]
	fn expired_entries_are_not_returned() {
		let cache = PermissionCache::new(Duration::seconds(-1));
		cache.put("u1", "account", "read", result(true));
		assert!(cache.get("u1", "account", "read").is_none());
	}

	#[test]
	fn clear_user_only_drops_that_users_entries() {
		let cache = PermissionCache::new(Duration::seconds(60));
		cache.put("u1", "account", "read", result(true));
		cache.put("u2", "account", "read", result(true));
		cache.clear_user("u1");
		assert!(cache.get("u1", "account", "read").is_none());
		assert!(cache.get("u2", "account", "read").is_some());
	}

	#[test]
	fn clear_all_empties_the_cache() {
		let cache = PermissionCache::new(Duration::seconds(60));
		cache.put("u1", "account", "read", result(true));
		cache.clear_all();
		assert!(cache.get("u1", "account", "read").is_none());
	}
}
