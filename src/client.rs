use std::time::Duration;

use serde_json::{Map, Value as JsonValue};

use crate::error::{Result, TableError};
use crate::models::{AuthContext, Envelope, Record};

/// Posts list requests to the training backend on behalf of one caller.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: AuthContext,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, auth: AuthContext, timeout: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout.max(1)))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
        }
    }

    /// Fetches the raw envelope. No retry: calling again is the retry.
    pub async fn fetch_envelope(
        &self,
        endpoint: &str,
        params: &Map<String, JsonValue>,
    ) -> Result<Envelope> {
        let body = request_body(&self.auth, params);
        let url = self.url(endpoint);
        tracing::info!(%url, user = %self.auth.user, "fetching records");

        let envelope = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<Envelope>()
            .await?;
        Ok(envelope)
    }

    pub async fn fetch_records(
        &self,
        endpoint: &str,
        params: &Map<String, JsonValue>,
    ) -> Result<Vec<Record>> {
        let envelope = self.fetch_envelope(endpoint, params).await?;
        if !envelope.is_success() {
            tracing::warn!(
                endpoint,
                response = %envelope.response,
                "server returned non-success envelope"
            );
        }
        envelope.into_records()
    }
}

/// `{ user, token, ...params }`; caller params cannot override the credentials.
pub fn request_body(auth: &AuthContext, params: &Map<String, JsonValue>) -> JsonValue {
    let mut body = params.clone();
    body.insert("user".to_string(), JsonValue::String(auth.user.clone()));
    body.insert("token".to_string(), JsonValue::String(auth.token.clone()));
    JsonValue::Object(body)
}

/// Parses `key=value` pairs into request params; numeric values stay numbers.
pub fn parse_params<S: AsRef<str>>(pairs: &[S]) -> Result<Map<String, JsonValue>> {
    let mut params = Map::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let Some((key, value)) = pair.split_once('=') else {
            return Err(TableError::InvalidConfig(format!(
                "expected key=value, got '{pair}'"
            )));
        };
        let value = match value.parse::<i64>() {
            Ok(n) => JsonValue::from(n),
            Err(_) => JsonValue::String(value.to_string()),
        };
        params.insert(key.trim().to_string(), value);
    }
    Ok(params)
}
