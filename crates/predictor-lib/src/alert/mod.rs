//! Flood alert dispatch
//!
//! This module provides:
//! - Tier-to-topic routing with one topic per non-NORMAL tier
//! - Alert subject and message formatting
//! - Notification transports (webhook, log-only)

mod dispatcher;
mod transport;

pub use dispatcher::{alert_message, format_percent, AlertDispatcher, DispatchOutcome, TopicSet};
pub use transport::{LogTransport, Notification, NotificationTransport, WebhookTransport};
