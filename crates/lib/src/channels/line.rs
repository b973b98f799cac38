//! LINE Messaging API: webhook payloads, X-Line-Signature check, and the reply call.

use crate::channels::reply::ReplySink;
use crate::compose::MAX_REPLY_MESSAGES;
use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying base64(HMAC-SHA256(channel secret, body)).
pub const SIGNATURE_HEADER: &str = "X-Line-Signature";

/// Compute the signature LINE sends for `body`.
pub fn sign_body(body: &[u8], channel_secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes()).ok()?;
    mac.update(body);
    Some(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Verify the X-Line-Signature header against the raw request body.
pub fn verify_signature(body: &[u8], channel_secret: &str, signature: Option<&str>) -> bool {
    let Some(provided) = signature else {
        return false;
    };
    let Some(expected) = sign_body(body, channel_secret) else {
        log::warn!("failed to create HMAC");
        return false;
    };
    constant_time_eq(expected.as_bytes(), provided.trim().as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Webhook POST body.
#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// One webhook event. Only the fields the relay reads are modelled.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub message: Option<LineMessage>,
    #[serde(default)]
    pub source: Option<LineSource>,
}

#[derive(Debug, Deserialize)]
pub struct LineMessage {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSource {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

impl LineSource {
    /// Group id, then room id, then user id.
    pub fn conversation_id(&self) -> Option<&str> {
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|v| !v.is_empty())
        }
        match self.typ.as_str() {
            "group" | "room" => non_empty(&self.group_id)
                .or_else(|| non_empty(&self.room_id))
                .or_else(|| non_empty(&self.user_id)),
            _ => non_empty(&self.user_id),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("line request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("line api error: {0}")]
    Api(String),
}

/// Reply API client for one channel.
pub struct LineClient {
    id: String,
    api_base: String,
    access_token: String,
    client: reqwest::Client,
}

impl LineClient {
    pub fn new(api_base: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            id: "line".to_string(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Reply request body: at most five text messages.
    pub fn reply_body(reply_token: &str, messages: &[String]) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = messages
            .iter()
            .take(MAX_REPLY_MESSAGES)
            .map(|m| serde_json::json!({ "type": "text", "text": m }))
            .collect();
        serde_json::json!({ "replyToken": reply_token, "messages": messages })
    }

    /// POST /v2/bot/message/reply.
    pub async fn reply_message(&self, reply_token: &str, messages: &[String]) -> Result<(), LineError> {
        if messages.len() > MAX_REPLY_MESSAGES {
            log::warn!(
                "dropping {} message(s) over the reply limit",
                messages.len() - MAX_REPLY_MESSAGES
            );
        }
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&Self::reply_body(reply_token, messages))
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LineError::Api(format!("{} {}", status, body)));
        }
        Ok(())
    }
}

#[async_trait]
impl ReplySink for LineClient {
    fn id(&self) -> &str {
        &self.id
    }

    async fn reply(&self, reply_token: &str, messages: &[String]) -> Result<(), String> {
        self.reply_message(reply_token, messages)
            .await
            .map_err(|e| e.to_string())
    }
}
