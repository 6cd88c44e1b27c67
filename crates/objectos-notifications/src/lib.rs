//! # Notification Queue
//!
//! Channel-dispatched FIFO notification queue with retry, the sibling
//! pattern to `objectos_jobs::JobQueue` (spec §4.9), plus
//! `{{ variable }}` template rendering applied before dispatch.

pub mod channel;
pub mod queue;
pub mod request;
pub mod template;

pub use channel::Channel;
pub use queue::{ChannelHandler, ChannelHandlerError, NotificationError, NotificationQueue, NotificationQueueConfig, NotificationResult, RenderedNotification};
pub use request::{Notification, NotificationRequest, NotificationStatus};
