//! Yelp AI chat API client.
//!
//! One POST per query, bounded by the configured timeout. Every failure comes back
//! as a [`SearchError`] whose [`SearchError::reply_text`] is what the user sees.

use crate::compose::truncate_chars;
use crate::config::SearchSettings;
use serde::Serialize;
use serde_json::Value;

const MAX_STATUS_BODY_CHARS: usize = 2000;
const MAX_INVALID_JSON_CHARS: usize = 4000;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("yelp api key not configured")]
    NotConfigured,
    #[error("yelp request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("yelp api error: {status}")]
    Status { status: u16, body: String },
    #[error("yelp returned invalid json: {message}")]
    Decode { message: String, body: String },
}

impl SearchError {
    /// Single chat message describing the failure.
    pub fn reply_text(&self) -> String {
        match self {
            SearchError::NotConfigured => "Yelp API key is not configured.".to_string(),
            SearchError::Transport(e) => format!("Error calling Yelp API: {}", e),
            SearchError::Status { status, body } => format!(
                "Yelp API error {}:\n{}",
                status,
                truncate_chars(body, MAX_STATUS_BODY_CHARS)
            ),
            SearchError::Decode { body, .. } => format!(
                "Yelp API returned invalid JSON:\n{}",
                truncate_chars(body, MAX_INVALID_JSON_CHARS)
            ),
        }
    }
}

/// Optional location hints sent with each query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl UserContext {
    /// None unless a locale or a full coordinate pair is configured.
    pub fn from_settings(settings: &SearchSettings) -> Option<Self> {
        if settings.locale.is_none() && settings.coordinates.is_none() {
            return None;
        }
        Some(Self {
            locale: settings.locale.clone(),
            latitude: settings.coordinates.map(|(lat, _)| lat),
            longitude: settings.coordinates.map(|(_, lon)| lon),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_context: Option<&'a UserContext>,
}

/// Client for the Yelp AI chat endpoint.
#[derive(Clone)]
pub struct SearchClient {
    endpoint: String,
    api_key: Option<String>,
    user_context: Option<UserContext>,
    client: reqwest::Client,
}

impl SearchClient {
    pub fn new(settings: &SearchSettings) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            user_context: UserContext::from_settings(settings),
            client,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Request body for a query (exposed for logging and tests).
    pub fn request_body<'a>(&'a self, query: &'a str) -> SearchRequest<'a> {
        SearchRequest {
            query,
            user_context: self.user_context.as_ref(),
        }
    }

    /// POST the query and parse the response document.
    pub async fn query(&self, query: &str) -> Result<Value, SearchError> {
        let api_key = self.api_key.as_deref().ok_or(SearchError::NotConfigured)?;
        log::info!("yelp query: {}", query);
        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&self.request_body(query))
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            log::warn!("yelp api returned {}", status);
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| SearchError::Decode {
            message: e.to_string(),
            body,
        })
    }
}
