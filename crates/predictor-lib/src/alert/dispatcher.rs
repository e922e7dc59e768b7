//! Alert dispatch policy
//!
//! At most one notification per evaluation, to the topic of the
//! evaluated tier. NORMAL has no topic and never notifies.

use super::NotificationTransport;
use crate::error::TransportError;
use crate::models::AlertTier;
use std::sync::Arc;
use tracing::debug;

/// One topic per alerting tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    pub emergency: String,
    pub warning: String,
    pub watch: String,
}

impl TopicSet {
    /// Topics named `arn:aws:sns:{region}:{account_id}:flood-alerts-{tier}`
    pub fn for_account(region: &str, account_id: &str) -> Self {
        let topic = |tier: AlertTier| {
            format!(
                "arn:aws:sns:{}:{}:flood-alerts-{}",
                region,
                account_id,
                tier.as_str().to_lowercase()
            )
        };
        Self {
            emergency: topic(AlertTier::Emergency),
            warning: topic(AlertTier::Warning),
            watch: topic(AlertTier::Watch),
        }
    }

    pub fn topic_for(&self, tier: AlertTier) -> Option<&str> {
        match tier {
            AlertTier::Emergency => Some(&self.emergency),
            AlertTier::Warning => Some(&self.warning),
            AlertTier::Watch => Some(&self.watch),
            AlertTier::Normal => None,
        }
    }
}

/// Result of a dispatch attempt
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Tier does not warrant a notification
    Skipped,
    Sent { topic: String },
    Failed { topic: String, error: TransportError },
}

/// Probability as a percentage with one decimal place, e.g. `40.0%`
pub fn format_percent(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

/// Human-readable summary of an evaluation
pub fn alert_message(tier: AlertTier, probability: f64) -> String {
    match tier {
        AlertTier::Normal => format!(
            "Normal conditions - {} flood probability",
            format_percent(probability)
        ),
        _ => format!(
            "{}: ML model predicts {} flood probability in next 6 hours",
            tier,
            format_percent(probability)
        ),
    }
}

/// Sends tier notifications through a transport
pub struct AlertDispatcher {
    transport: Arc<dyn NotificationTransport>,
    topics: TopicSet,
    site_name: String,
}

impl AlertDispatcher {
    pub fn new(
        transport: Arc<dyn NotificationTransport>,
        topics: TopicSet,
        site_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            topics,
            site_name: site_name.into(),
        }
    }

    pub fn subject(&self, tier: AlertTier) -> String {
        format!("{} Flood {}", self.site_name, tier)
    }

    /// Publish once for any tier above NORMAL; failures are reported, not retried
    pub async fn dispatch(&self, tier: AlertTier, probability: f64) -> DispatchOutcome {
        let Some(topic) = self.topics.topic_for(tier) else {
            debug!(probability, "Normal conditions, no alert dispatched");
            return DispatchOutcome::Skipped;
        };

        let subject = self.subject(tier);
        let message = alert_message(tier, probability);

        match self.transport.publish(topic, &subject, &message).await {
            Ok(()) => DispatchOutcome::Sent {
                topic: topic.to_string(),
            },
            Err(error) => DispatchOutcome::Failed {
                topic: topic.to_string(),
                error,
            },
        }
    }
}
