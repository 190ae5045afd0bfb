use std::env;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://api.novelai.net";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("provider request failed ({status}): {message}")]
    Provider { status: u16, message: String },
    #[error("provider request timed out")]
    ProviderTimeout,
    #[error("provider transport failed")]
    Transport(#[source] reqwest::Error),
    #[error("provider returned an invalid payload: {0}")]
    InvalidPayload(String),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ProviderTimeout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Content type without parameters, lowercased.
    pub fn media_type(&self) -> Option<String> {
        self.content_type.as_deref().map(|raw| {
            raw.split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase()
        })
    }

    pub fn is_event_stream(&self) -> bool {
        self.media_type().as_deref() == Some("text/event-stream")
    }

    pub fn is_json(&self) -> bool {
        self.media_type()
            .map(|media| media == "application/json" || media.ends_with("+json"))
            .unwrap_or(false)
    }
}

/// The single seam between the generation client and the network.
pub trait ApiTransport {
    fn post_json(
        &self,
        endpoint: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, ClientError>;
}

pub struct HttpTransport {
    api_base: String,
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, ClientError> {
        let http = HttpClient::builder()
            .timeout(request_timeout)
            .build()
            .map_err(ClientError::Transport)?;
        Ok(Self {
            api_base: env::var("NAI_API_BASE")
                .ok()
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            http,
        })
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim().trim_end_matches('/').to_string();
        self
    }
}

impl ApiTransport for HttpTransport {
    fn post_json(
        &self,
        endpoint: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, ClientError> {
        let url = format!("{}{}", self.api_base, endpoint);
        tracing::debug!(%url, authorized = bearer.is_some(), "provider request");
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().map_err(transport_error)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().map_err(transport_error)?;
        tracing::debug!(
            %url,
            status,
            content_type = content_type.as_deref().unwrap_or(""),
            bytes = body.len(),
            "provider response"
        );
        Ok(ApiResponse {
            status,
            content_type,
            body,
        })
    }
}

fn transport_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::ProviderTimeout
    } else {
        ClientError::Transport(err)
    }
}
