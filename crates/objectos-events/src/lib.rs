//! # Event / Hook Bus
//!
//! Named topics with an ordered list of async handlers (spec §4.2).
//! Handlers on one topic run serially, awaited one at a time, in
//! registration order — there is no cross-topic ordering guarantee.
//!
//! Two topic kinds:
//!
//! - **Gate** topics (the last dot-separated segment starts with
//!   `before`, e.g. `data.beforeCreate`): the first handler to return an
//!   error aborts the remaining handlers for that invocation, and the
//!   error surfaces to the caller of `trigger`.
//! - **Observer** topics (everything else, e.g. `data.create`,
//!   `audit.event.recorded`): a handler's error is recorded but does not
//!   stop the remaining handlers from running, and does not fail the
//!   `trigger` call — callers that care can inspect the returned list of
//!   per-handler failures.
//!
//! Connect/send over `Arc<Mutex<Vec<_>>>`, cloning the receiver list out
//! from under the lock before invoking callbacks, generalized from a
//! single payload type to an opaque `serde_json::Value`, since hooks span
//! plugin boundaries and stay stringly-typed by design (spec §9).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use thiserror::Error as ThisError;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = Result<(), HandlerError>;

/// An event handler: takes the topic's payload, returns a future resolving
/// to success or a boxed error.
pub type Handler = Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// One handler's failure during an observer-topic trigger.
#[derive(Debug, ThisError)]
#[error("handler #{handler_index} for topic '{topic}' failed: {error}")]
pub struct HandlerFailure {
	pub topic: String,
	pub handler_index: usize,
	#[source]
	pub error: HandlerError,
}

/// The error surfaced when a gate topic's handler chain aborts.
#[derive(Debug, ThisError)]
#[error("gate '{topic}' aborted at handler #{handler_index}: {error}")]
pub struct GateError {
	pub topic: String,
	pub handler_index: usize,
	#[source]
	pub error: HandlerError,
}

/// So an HTTP adapter depending only on `objectos-core` can translate an
/// aborted gate chain without also depending on this crate (spec §7).
impl From<GateError> for objectos_core::Error {
	fn from(err: GateError) -> Self {
		objectos_core::Error::Operational(err.to_string())
	}
}

fn is_gate_topic(topic: &str) -> bool {
	topic
		.rsplit('.')
		.next()
		.is_some_and(|segment| segment.starts_with("before"))
}

#[derive(Default)]
struct Inner {
	handlers: HashMap<String, Vec<Handler>>,
	known_topics: HashSet<String>,
}

/// The kernel's event/hook bus. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct EventBus {
	inner: Arc<Mutex<Inner>>,
}

impl EventBus {
	pub fn new() -> Self {
		Self::default()
	}

	/// Declare a topic at boot time so later `hook()`/`trigger()` calls for
	/// a misspelled name can be distinguished from a deliberately-new one.
	/// Supplemental to spec §4.2 per spec §9's redesign note.
	pub fn register_topic(&self, topic: &str) {
		let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
		inner.known_topics.insert(topic.to_string());
		inner.handlers.entry(topic.to_string()).or_default();
	}

	/// Whether `topic` was declared via [`EventBus::register_topic`].
	pub fn is_known_topic(&self, topic: &str) -> bool {
		self.inner
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.known_topics
			.contains(topic)
	}

	/// Append `handler` to `topic`. A plugin may hook a topic nobody has
	/// declared via `register_topic` — it simply won't show up in
	/// `is_known_topic` (spec §9: hooks remain stringly-typed and open).
	pub fn hook(&self, topic: &str, handler: Handler) {
		self.inner
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.handlers
			.entry(topic.to_string())
			.or_default()
			.push(handler);
	}

	/// Invoke every handler registered for `topic`, in registration order,
	/// awaiting each before starting the next.
	///
	/// For gate topics, the first error aborts the chain and is returned.
	/// For observer topics, every handler runs regardless of earlier
	/// failures, and the (possibly empty) list of failures is returned.
	pub async fn trigger(
		&self,
		topic: &str,
		payload: serde_json::Value,
	) -> Result<Vec<HandlerFailure>, GateError> {
		let handlers: Vec<Handler> = {
			let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
			inner.handlers.get(topic).cloned().unwrap_or_default()
		};

		let gate = is_gate_topic(topic);
		let mut failures = Vec::new();

		for (index, handler) in handlers.into_iter().enumerate() {
			if let Err(error) = handler(payload.clone()).await {
				if gate {
					tracing::warn!(topic, handler_index = index, %error, "gate handler aborted trigger");
					return Err(GateError {
						topic: topic.to_string(),
						handler_index: index,
						error,
					});
				}
				tracing::warn!(topic, handler_index = index, %error, "observer handler failed, continuing");
				failures.push(HandlerFailure {
					topic: topic.to_string(),
					handler_index: index,
					error,
				});
			}
		}

		Ok(failures)
	}

	/// Number of handlers currently registered for `topic`.
	pub fn handler_count(&self, topic: &str) -> usize {
		self.inner
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.handlers
			.get(topic)
			.map(Vec::len)
			.unwrap_or(0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn ok_handler(order: Arc<Mutex<Vec<usize>>>, id: usize) -> Handler {
		Arc::new(move |_payload| {
			let order = order.clone();
			Box::pin(async move {
				order.lock().unwrap().push(id);
				Ok(())
			})
		})
	}

	fn failing_handler(counter: Arc<AtomicUsize>) -> Handler {
		Arc::new(move |_payload| {
			let counter = counter.clone();
			Box::pin(async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err("boom".into())
			})
		})
	}

	#[tokio::test]
	async fn handlers_run_in_registration_order() {
		let bus = EventBus::new();
		let order = Arc::new(Mutex::new(Vec::new()));
		bus.hook("data.create", ok_handler(order.clone(), 1));
		bus.hook("data.create", ok_handler(order.clone(), 2));
		bus.hook("data.create", ok_handler(order.clone(), 3));

		bus.trigger("data.create", serde_json::json!({})).await.unwrap();

		assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
	}

	#[tokio::test]
	async fn gate_topic_aborts_on_first_error() {
		let bus = EventBus::new();
		let ran_after = Arc::new(AtomicUsize::new(0));
		let fail_count = Arc::new(AtomicUsize::new(0));

		bus.hook("data.beforeCreate", failing_handler(fail_count.clone()));
		bus.hook(
			"data.beforeCreate",
			{
				let ran_after = ran_after.clone();
				Arc::new(move |_payload| {
					let ran_after = ran_after.clone();
					Box::pin(async move {
						ran_after.fetch_add(1, Ordering::SeqCst);
						Ok(())
					})
				})
			},
		);

		let result = bus.trigger("data.beforeCreate", serde_json::json!({})).await;
		assert!(result.is_err());
		assert_eq!(fail_count.load(Ordering::SeqCst), 1);
		assert_eq!(ran_after.load(Ordering::SeqCst), 0, "handler after the failing gate handler must not run");
	}

	#[tokio::test]
	async fn observer_topic_runs_every_handler_despite_errors() {
		let bus = EventBus::new();
		let fail_count = Arc::new(AtomicUsize::new(0));
		let ran_after = Arc::new(AtomicUsize::new(0));

		bus.hook("data.create", failing_handler(fail_count.clone()));
		bus.hook(
			"data.create",
			{
				let ran_after = ran_after.clone();
				Arc::new(move |_payload| {
					let ran_after = ran_after.clone();
					Box::pin(async move {
						ran_after.fetch_add(1, Ordering::SeqCst);
						Ok(())
					})
				})
			},
		);

		let failures = bus.trigger("data.create", serde_json::json!({})).await.unwrap();
		assert_eq!(failures.len(), 1);
		assert_eq!(ran_after.load(Ordering::SeqCst), 1, "observer handlers after a failure must still run");
	}

	#[rstest]
	#[case("data.beforeCreate", true)]
	#[case("data.beforeUpdate", true)]
	#[case("data.create", false)]
	#[case("audit.event.recorded", false)] // last segment 'recorded' doesn't start with 'before'
	#[case("before.data.create", false)] // 'before' in an earlier segment doesn't count
	#[case("data.beforeCreateAndSomething", true)] // prefix match, not exact
	fn gate_detection_looks_at_the_last_dot_segment(#[case] topic: &str, #[case] is_gate: bool) {
		assert_eq!(is_gate_topic(topic), is_gate);
	}

	#[tokio::test]
	async fn trigger_on_unhooked_topic_is_a_no_op() {
		let bus = EventBus::new();
		let failures = bus.trigger("nothing.registered", serde_json::json!({})).await.unwrap();
		assert!(failures.is_empty());
	}

	#[test]
	fn register_topic_marks_it_known() {
		let bus = EventBus::new();
		assert!(!bus.is_known_topic("data.create"));
		bus.register_topic("data.create");
		assert!(bus.is_known_topic("data.create"));
	}

	#[test]
	fn gate_error_converts_into_an_operational_core_error() {
		let err = GateError {
			topic: "data.beforeCreate".to_string(),
			handler_index: 0,
			error: "boom".into(),
		};
		let core_err: objectos_core::Error = err.into();
		assert_eq!(core_err.code(), "OPERATIONAL_ERROR");
		assert_eq!(core_err.http_status(), 500);
	}
}
