//! NATS subscription for incoming scoring requests

use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Subscribes to the request subject. Callers reply on each message's reply subject.
///
/// With a queue group, replicas of the worker share the subject and NATS
/// delivers each request to one of them.
pub struct RequestConsumer {
    client: Client,
    subject: String,
    queue_group: Option<String>,
}

impl RequestConsumer {
    pub fn new(client: Client, subject: &str, queue_group: Option<&str>) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            queue_group: normalize_group(queue_group),
        }
    }

    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = match &self.queue_group {
            Some(group) => {
                self.client
                    .queue_subscribe(self.subject.clone(), group.clone())
                    .await?
            }
            None => self.client.subscribe(self.subject.clone()).await?,
        };
        info!(
            subject = %self.subject,
            queue_group = ?self.queue_group,
            "Subscribed to scoring requests"
        );
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn queue_group(&self) -> Option<&str> {
        self.queue_group.as_deref()
    }
}

/// Blank group names fall back to a plain subscription
fn normalize_group(group: Option<&str>) -> Option<String> {
    group
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_group_is_kept() {
        assert_eq!(
            normalize_group(Some(" credit-scoring ")),
            Some("credit-scoring".to_string())
        );
    }

    #[test]
    fn test_blank_group_means_plain_subscription() {
        assert_eq!(normalize_group(Some("")), None);
        assert_eq!(normalize_group(Some("   ")), None);
        assert_eq!(normalize_group(None), None);
    }
}
