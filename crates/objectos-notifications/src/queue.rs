//! The notification queue: the same FIFO/retry dispatch pattern as
//! `objectos_jobs::JobQueue` (spec §4.9: "sibling pattern to Job
//! Queue"), differing in that entries route to a per-channel handler and
//! get template-rendered before dispatch. When disabled, `send` calls
//! the channel handler synchronously instead of queueing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use futures::future::BoxFuture;
use objectos_core::ids;
use objectos_events::EventBus;
use objectos_jobs::RetryStrategy;
use serde_json::Value;
use thiserror::Error as ThisError;

use crate::channel::Channel;
use crate::request::{Notification, NotificationRequest, NotificationStatus};
use crate::template;

#[derive(Debug, ThisError)]
pub enum NotificationError {
	#[error("notification '{0}' not found")]
	NotFound(String),

	#[error("no handler registered for channel '{0}'")]
	NoHandler(Channel),

	#[error("template rendering error: {0}")]
	Template(#[from] template::TemplateError),

	#[error("channel handler failed: {0}")]
	Handler(String),
}

pub type NotificationResult<T> = Result<T, NotificationError>;

/// What a channel handler receives: the request with `subject`/`body`
/// already template-rendered.
#[derive(Debug, Clone)]
pub struct RenderedNotification {
	pub channel: Channel,
	pub recipients: Vec<String>,
	pub subject: Option<String>,
	pub body: Option<String>,
}

pub type ChannelHandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type ChannelHandler = Arc<dyn Fn(RenderedNotification) -> BoxFuture<'static, Result<(), ChannelHandlerError>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct NotificationQueueConfig {
	pub enabled: bool,
	pub max_retries: u32,
	pub retry_strategy: RetryStrategy,
}

impl Default for NotificationQueueConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			max_retries: 3,
			retry_strategy: RetryStrategy::default(),
		}
	}
}

struct Entry {
	notification: Notification,
	seq: u64,
}

pub struct NotificationQueue {
	config: NotificationQueueConfig,
	events: EventBus,
	entries: Mutex<HashMap<String, Entry>>,
	handlers: Mutex<HashMap<Channel, ChannelHandler>>,
	next_seq: std::sync::atomic::AtomicU64,
}

impl NotificationQueue {
	pub fn new(config: NotificationQueueConfig, events: EventBus) -> Arc<Self> {
		for topic in ["notification.queued", "notification.sent", "notification.failed", "notification.retried"] {
			events.register_topic(topic);
		}
		Arc::new(Self {
			config,
			events,
			entries: Mutex::new(HashMap::new()),
			handlers: Mutex::new(HashMap::new()),
			next_seq: std::sync::atomic::AtomicU64::new(0),
		})
	}

	pub fn register_handler(&self, channel: Channel, handler: ChannelHandler) {
		self.handlers.lock().unwrap_or_else(PoisonError::into_inner).insert(channel, handler);
	}

	async fn emit(&self, topic: &str, payload: Value) {
		if let Err(err) = self.events.trigger(topic, payload).await {
			tracing::warn!(topic, error = %err, "notification event gate handler aborted (unexpected for an observer topic)");
		}
	}

	fn notification_payload(n: &Notification) -> Value {
		serde_json::json!({
			"id": n.id,
			"channel": n.request.channel,
			"status": n.status,
			"attempts": n.attempts,
		})
	}

	/// Always queues, regardless of `config.enabled` — callers that want
	/// the disabled-queue synchronous behavior should call `send`.
	pub async fn enqueue(&self, request: NotificationRequest) -> String {
		let id = ids::unique_id("notif");
		let notification = Notification::new(id.clone(), request, self.config.max_retries);
		let seq = self.next_seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
		let payload = Self::notification_payload(&notification);
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).insert(id.clone(), Entry { notification, seq });
		self.emit("notification.queued", payload).await;
		id
	}

	/// `send(request)` (spec §4.9): queues it when the queue is enabled,
	/// or renders and dispatches it synchronously against the channel
	/// handler when disabled.
	pub async fn send(&self, request: NotificationRequest) -> NotificationResult<()> {
		if self.config.enabled {
			self.enqueue(request).await;
			return Ok(());
		}

		let rendered = render(&request)?;
		let handler = self
			.handlers
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get(&request.channel)
			.cloned()
			.ok_or(NotificationError::NoHandler(request.channel))?;
		handler(rendered).await.map_err(|e| NotificationError::Handler(e.to_string()))
	}

	pub fn get(&self, id: &str) -> NotificationResult<Notification> {
		self.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get(id)
			.map(|entry| entry.notification.clone())
			.ok_or_else(|| NotificationError::NotFound(id.to_string()))
	}

	pub fn len(&self) -> usize {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Status summary, the backing data for `GET
	/// /api/v1/notifications/queue/status`.
	pub fn stats(&self) -> HashMap<&'static str, usize> {
		let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		let mut stats = HashMap::new();
		for entry in entries.values() {
			let key = match entry.notification.status {
				NotificationStatus::Pending => "pending",
				NotificationStatus::Sending => "sending",
				NotificationStatus::Sent => "sent",
				NotificationStatus::Retrying => "retrying",
				NotificationStatus::Failed => "failed",
			};
			*stats.entry(key).or_insert(0) += 1;
		}
		stats
	}

	/// Dispatch the single oldest dispatchable entry (a `pending` entry,
	/// or a `retrying` one whose backoff has elapsed), FIFO — no
	/// priority tiers for notifications.
	pub async fn dispatch_tick(&self) {
		let now = Utc::now();
		let id = {
			let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
			let mut candidates: Vec<(&String, &Entry)> = entries
				.iter()
				.filter(|(_, entry)| match entry.notification.status {
					NotificationStatus::Pending => true,
					NotificationStatus::Retrying => entry
						.notification
						.last_attempt_at
						.is_some_and(|last| now >= last + self.config.retry_strategy.calculate_delay(entry.notification.attempts)),
					_ => false,
				})
				.collect();
			candidates.sort_by_key(|(_, entry)| entry.seq);
			candidates.first().map(|(id, _)| (*id).clone())
		};
		let Some(id) = id else { return };
		self.run_one(&id).await;
	}

	async fn run_one(&self, id: &str) {
		let request = {
			let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
			let Some(entry) = entries.get_mut(id) else { return };
			entry.notification.status = NotificationStatus::Sending;
			entry.notification.attempts += 1;
			entry.notification.last_attempt_at = Some(Utc::now());
			entry.notification.request.clone()
		};

		let outcome = async {
			let rendered = render(&request)?;
			let handler = self
				.handlers
				.lock()
				.unwrap_or_else(PoisonError::into_inner)
				.get(&request.channel)
				.cloned()
				.ok_or(NotificationError::NoHandler(request.channel))?;
			handler(rendered).await.map_err(|e| NotificationError::Handler(e.to_string()))
		}
		.await;

		match outcome {
			Ok(()) => self.complete(id).await,
			Err(err) => self.fail(id, err.to_string()).await,
		}
	}

	async fn complete(&self, id: &str) {
		let payload = {
			let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
			let Some(entry) = entries.get_mut(id) else { return };
			entry.notification.status = NotificationStatus::Sent;
			entry.notification.error = None;
			Self::notification_payload(&entry.notification)
		};
		self.emit("notification.sent", payload).await;
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).remove(id);
	}

	async fn fail(&self, id: &str, error: String) {
		let (failed_payload, retried_payload) = {
			let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
			let Some(entry) = entries.get_mut(id) else { return };
			entry.notification.error = Some(error);
			let will_retry = self.config.retry_strategy.should_retry(entry.notification.attempts, entry.notification.max_retries);
			entry.notification.status = if will_retry { NotificationStatus::Retrying } else { NotificationStatus::Failed };
			let failed_payload = Self::notification_payload(&entry.notification);
			let retried_payload = will_retry.then(|| Self::notification_payload(&entry.notification));
			(failed_payload, retried_payload)
		};
		self.emit("notification.failed", failed_payload).await;
		if let Some(retried_payload) = retried_payload {
			self.emit("notification.retried", retried_payload).await;
		}
	}
}

fn render(request: &NotificationRequest) -> NotificationResult<RenderedNotification> {
	let data = request.data.clone().unwrap_or(Value::Null);
	let subject = request.subject.as_deref().map(|s| template::render(s, &data)).transpose()?;
	let body = match (&request.template, &request.body) {
		(Some(t), _) => Some(template::render(t, &data)?),
		(None, Some(b)) => Some(template::render(b, &data)?),
		(None, None) => None,
	};
	Ok(RenderedNotification {
		channel: request.channel,
		recipients: request.recipients.clone(),
		subject,
		body,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case(Some("from template"), Some("from body"), Some("from template"))] // template wins
	#[case(None, Some("from body"), Some("from body"))]
	#[case(None, None, None)]
	fn render_prefers_template_over_plain_body(#[case] template: Option<&str>, #[case] body: Option<&str>, #[case] expected: Option<&str>) {
		let mut request = NotificationRequest::new(Channel::Email, vec!["a@example.com".into()]);
		if let Some(t) = template {
			request = request.with_template(t);
		}
		if let Some(b) = body {
			request = request.with_body(b);
		}
		let rendered = render(&request).unwrap();
		assert_eq!(rendered.body.as_deref(), expected);
	}

	fn ok_handler(calls: Arc<Mutex<Vec<String>>>) -> ChannelHandler {
		Arc::new(move |rendered| {
			let calls = calls.clone();
			Box::pin(async move {
				calls.lock().unwrap().push(rendered.body.unwrap_or_default());
				Ok(())
			})
		})
	}

	#[tokio::test]
	async fn send_with_queue_enabled_enqueues_rather_than_dispatching() {
		let queue = NotificationQueue::new(NotificationQueueConfig::default(), EventBus::new());
		let request = NotificationRequest::new(Channel::Email, vec!["a@example.com".into()]).with_body("hi");
		queue.send(request).await.unwrap();
		assert_eq!(queue.len(), 1);
		assert_eq!(queue.stats().get("pending"), Some(&1));
	}

	#[tokio::test]
	async fn send_with_queue_disabled_calls_the_handler_synchronously() {
		let calls = Arc::new(Mutex::new(Vec::new()));
		let queue = NotificationQueue::new(
			NotificationQueueConfig { enabled: false, ..NotificationQueueConfig::default() },
			EventBus::new(),
		);
		queue.register_handler(Channel::Email, ok_handler(calls.clone()));

		let request = NotificationRequest::new(Channel::Email, vec!["a@example.com".into()])
			.with_body("Hi {{ user.name }}")
			.with_data(json!({ "user": { "name": "Ada" } }));
		queue.send(request).await.unwrap();

		assert_eq!(*calls.lock().unwrap(), vec!["Hi Ada".to_string()]);
		assert_eq!(queue.len(), 0, "disabled queue never stores the entry");
	}

	#[tokio::test]
	async fn dispatch_renders_the_template_before_calling_the_handler() {
		let calls = Arc::new(Mutex::new(Vec::new()));
		let queue = NotificationQueue::new(NotificationQueueConfig::default(), EventBus::new());
		queue.register_handler(Channel::Email, ok_handler(calls.clone()));

		let request = NotificationRequest::new(Channel::Email, vec!["a@example.com".into()])
			.with_template("Welcome, {{ user.name }}!")
			.with_data(json!({ "user": { "name": "Grace" } }));
		queue.enqueue(request).await;

		queue.dispatch_tick().await;
		assert_eq!(*calls.lock().unwrap(), vec!["Welcome, Grace!".to_string()]);
	}

	#[tokio::test]
	async fn a_missing_channel_handler_fails_the_notification() {
		let queue = NotificationQueue::new(NotificationQueueConfig { max_retries: 0, ..NotificationQueueConfig::default() }, EventBus::new());
		let request = NotificationRequest::new(Channel::Sms, vec!["+10000000000".into()]).with_body("hi");
		let id = queue.enqueue(request).await;

		queue.dispatch_tick().await;
		assert_eq!(queue.get(&id).unwrap().status, NotificationStatus::Failed);
	}
}
