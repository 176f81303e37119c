//! Replies to scoring requests

use crate::types::RiskAssessment;
use anyhow::Result;
use async_nats::{Client, Subject};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Body sent when a request could not be scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

impl ErrorReply {
    pub fn new(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

/// Serialized reply body for a scoring outcome
pub fn reply_body<E: std::fmt::Display>(
    outcome: &std::result::Result<RiskAssessment, E>,
) -> Result<Vec<u8>> {
    let body = match outcome {
        Ok(assessment) => serde_json::to_vec(assessment)?,
        Err(e) => serde_json::to_vec(&ErrorReply::new(e))?,
    };
    Ok(body)
}

/// Publishes replies back to requesters
#[derive(Clone)]
pub struct ReplyProducer {
    client: Client,
}

impl ReplyProducer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Send an assessment or an error body to the request's reply subject
    pub async fn reply<E: std::fmt::Display>(
        &self,
        reply_to: Subject,
        outcome: &std::result::Result<RiskAssessment, E>,
    ) -> Result<()> {
        let payload = reply_body(outcome)?;

        debug!(reply_to = %reply_to, bytes = payload.len(), ok = outcome.is_ok(), "Publishing reply");
        self.client.publish(reply_to, payload.into()).await?;
        Ok(())
    }
}
