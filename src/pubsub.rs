//! Pub/Sub REST client for pulling and acknowledging notifications

use crate::config::PubSubConfig;
use crate::error::{Error, Result};
use crate::types::Notification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Message as delivered by `subscriptions.pull`
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubsubMessage {
    /// Decoded payload bytes
    #[serde(default, deserialize_with = "base64_serde::deserialize")]
    pub data: Vec<u8>,
    /// Message attributes
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// Server-assigned message id
    #[serde(default)]
    pub message_id: Option<String>,
    /// Publish timestamp
    #[serde(default)]
    pub publish_time: Option<DateTime<Utc>>,
}

/// A pulled message together with its acknowledgment id
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedMessage {
    /// Id used to acknowledge or nack this delivery
    pub ack_id: String,
    /// The message itself
    pub message: PubsubMessage,
    /// Delivery attempt counter (only set with dead-lettering enabled)
    #[serde(default)]
    pub delivery_attempt: Option<u32>,
}

impl ReceivedMessage {
    /// Split into the acknowledgment id and the notification
    pub fn into_parts(self) -> (String, Notification) {
        let PubsubMessage {
            data,
            attributes,
            message_id,
            publish_time,
        } = self.message;
        (
            self.ack_id,
            Notification {
                data,
                attributes,
                message_id,
                publish_time,
            },
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
    max_messages: u32,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<ReceivedMessage>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeRequest<'a> {
    ack_ids: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyAckDeadlineRequest<'a> {
    ack_ids: &'a [String],
    ack_deadline_seconds: u32,
}

/// Client bound to a single subscription
#[derive(Clone)]
pub struct PubSubClient {
    http: reqwest::Client,
    endpoint: String,
    subscription_path: String,
    access_token: Option<String>,
}

impl PubSubClient {
    /// Build a client for `subscription_path` (`projects/{p}/subscriptions/{s}`)
    pub fn new(
        config: &PubSubConfig,
        subscription_path: impl Into<String>,
        access_token: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            subscription_path: subscription_path.into(),
            access_token,
        })
    }

    /// Subscription this client pulls from
    pub fn subscription_path(&self) -> &str {
        &self.subscription_path
    }

    fn url(&self, method: &str) -> String {
        format!("{}/v1/{}:{}", self.endpoint, self.subscription_path, method)
    }

    async fn post<T: Serialize + ?Sized>(&self, method: &str, body: &T) -> Result<reqwest::Response> {
        let mut request = self.http.post(self.url(method)).json(body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::PubSub {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// Pull up to `max_messages` messages
    ///
    /// The server holds the request open for a while when nothing is
    /// available, so an empty result is normal.
    pub async fn pull(&self, max_messages: u32) -> Result<Vec<ReceivedMessage>> {
        let response = self.post("pull", &PullRequest { max_messages }).await?;
        let body = response.text().await?;
        // An empty subscription answers with `{}`
        let parsed: PullResponse = if body.trim().is_empty() {
            PullResponse::default()
        } else {
            serde_json::from_str(&body)?
        };

        trace!(count = parsed.received_messages.len(), "pulled messages");
        Ok(parsed.received_messages)
    }

    /// Acknowledge delivered messages
    pub async fn acknowledge(&self, ack_ids: &[String]) -> Result<()> {
        if ack_ids.is_empty() {
            return Ok(());
        }
        self.post("acknowledge", &AcknowledgeRequest { ack_ids })
            .await?;
        debug!(count = ack_ids.len(), "acknowledged messages");
        Ok(())
    }

    /// Change the ack deadline; zero hands the messages back for redelivery
    pub async fn modify_ack_deadline(&self, ack_ids: &[String], seconds: u32) -> Result<()> {
        if ack_ids.is_empty() {
            return Ok(());
        }
        self.post(
            "modifyAckDeadline",
            &ModifyAckDeadlineRequest {
                ack_ids,
                ack_deadline_seconds: seconds,
            },
        )
        .await?;
        debug!(count = ack_ids.len(), seconds, "modified ack deadline");
        Ok(())
    }
}

// Pub/Sub carries message data as standard base64 text
mod base64_serde {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, de};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD.decode(encoded.as_bytes()).map_err(de::Error::custom)
    }
}
