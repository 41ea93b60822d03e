//! Outbound notifications.
//!
//! The vote ledger knows nothing about delivery: it hands events to whichever
//! [`Notifier`] is managed, strictly after the vote has been committed.

use aws_sdk_sns::{types::MessageAttributeValue, Client as SnsClient};
use chrono::{DateTime, Utc};
use rocket::serde::json::serde_json;
use serde::Serialize;
use thiserror::Error;

use crate::model::mongodb::Id;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to serialise notification: {0}")]
    Serialise(#[from] serde_json::Error),
    #[error("Failed to publish notification: {0}")]
    Publish(String),
}

/// A vote has been committed to the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct VoteCastEvent {
    pub vote_id: Id,
    pub election_id: Id,
    pub election_title: String,
    pub voter_email: String,
    pub vote_hash: String,
    pub created_at: DateTime<Utc>,
}

/// An invitation has been created and should be delivered.
#[derive(Debug, Clone, Serialize)]
pub struct InvitationEvent {
    pub email: String,
    pub first_name: String,
    pub event_title: String,
    pub registration_link: String,
}

/// A sink for notification events.
#[rocket::async_trait]
pub trait Notifier: Send + Sync {
    async fn vote_cast(&self, event: &VoteCastEvent) -> Result<(), NotifyError>;
    async fn invitation_created(&self, event: &InvitationEvent) -> Result<(), NotifyError>;
}

/// Publishes events to an Amazon SNS topic, tagged with an `event` message attribute.
pub struct SnsNotifier {
    client: SnsClient,
    topic_arn: String,
}

impl SnsNotifier {
    pub fn new(client: SnsClient, topic_arn: String) -> Self {
        Self { client, topic_arn }
    }

    async fn publish<T: Serialize + Sync>(&self, kind: &str, event: &T) -> Result<(), NotifyError> {
        let message = serde_json::to_string(event)?;
        let attribute = MessageAttributeValue::builder()
            .data_type("String")
            .string_value(kind)
            .build()
            .map_err(|e| NotifyError::Publish(e.to_string()))?;
        self.client
            .publish()
            .topic_arn(&self.topic_arn)
            .message(message)
            .message_attributes("event", attribute)
            .send()
            .await
            .map_err(|e| NotifyError::Publish(e.to_string()))?;
        debug!("Published {kind} notification");
        Ok(())
    }
}

#[rocket::async_trait]
impl Notifier for SnsNotifier {
    async fn vote_cast(&self, event: &VoteCastEvent) -> Result<(), NotifyError> {
        self.publish("vote_cast", event).await
    }

    async fn invitation_created(&self, event: &InvitationEvent) -> Result<(), NotifyError> {
        self.publish("invitation_created", event).await
    }
}

/// Logs events instead of delivering them.
pub struct LogNotifier;

#[rocket::async_trait]
impl Notifier for LogNotifier {
    async fn vote_cast(&self, event: &VoteCastEvent) -> Result<(), NotifyError> {
        info!(
            "Vote confirmation for {} in election {}: receipt {}",
            event.voter_email, event.election_id, event.vote_hash
        );
        Ok(())
    }

    async fn invitation_created(&self, event: &InvitationEvent) -> Result<(), NotifyError> {
        info!(
            "Invitation for {} to {}: {}",
            event.email, event.event_title, event.registration_link
        );
        Ok(())
    }
}
