//! Notification channels (spec §3: `channel ∈ {email, sms, push, webhook}`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
	Email,
	Sms,
	Push,
	Webhook,
}

impl Channel {
	pub fn as_str(&self) -> &'static str {
		match self {
			Channel::Email => "email",
			Channel::Sms => "sms",
			Channel::Push => "push",
			Channel::Webhook => "webhook",
		}
	}
}

impl std::fmt::Display for Channel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}
