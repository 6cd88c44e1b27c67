//! The `NotificationRequest` input shape and its queued form,
//! `Notification` (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::Channel;

/// What a caller submits to `send`/`enqueue` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
	pub channel: Channel,
	pub recipients: Vec<String>,
	pub subject: Option<String>,
	pub body: Option<String>,
	pub template: Option<String>,
	pub data: Option<Value>,
}

impl NotificationRequest {
	pub fn new(channel: Channel, recipients: Vec<String>) -> Self {
		Self {
			channel,
			recipients,
			subject: None,
			body: None,
			template: None,
			data: None,
		}
	}

	pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = Some(subject.into());
		self
	}

	pub fn with_body(mut self, body: impl Into<String>) -> Self {
		self.body = Some(body.into());
		self
	}

	pub fn with_template(mut self, template: impl Into<String>) -> Self {
		self.template = Some(template.into());
		self
	}

	pub fn with_data(mut self, data: Value) -> Self {
		self.data = Some(data);
		self
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
	Pending,
	Sending,
	Sent,
	Retrying,
	Failed,
}

/// A `NotificationRequest` once queued: it "gain[s] an id, status,
/// attempts, and timestamps" (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
	pub id: String,
	pub request: NotificationRequest,
	pub status: NotificationStatus,
	pub attempts: u32,
	pub max_retries: u32,
	pub created_at: DateTime<Utc>,
	pub last_attempt_at: Option<DateTime<Utc>>,
	pub error: Option<String>,
}

impl Notification {
	pub(crate) fn new(id: String, request: NotificationRequest, max_retries: u32) -> Self {
		Self {
			id,
			request,
			status: NotificationStatus::Pending,
			attempts: 0,
			max_retries,
			created_at: Utc::now(),
			last_attempt_at: None,
			error: None,
		}
	}
}
