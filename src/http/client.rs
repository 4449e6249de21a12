use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::error::{AppLaunchError, ErrorCode, Result};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const APPLICATION_JSON: &str = "application/json";
pub const CLIENT_SECRET: &str = "clientSecret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// A request handed to an [`HttpInvoker`].
#[derive(Debug, Clone)]
pub struct InvokerRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl InvokerRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            timeout,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets a JSON body along with the matching content type.
    pub fn json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self.header(CONTENT_TYPE, APPLICATION_JSON)
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body text of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokerResponse {
    pub status: u16,
    pub text: String,
}

impl InvokerResponse {
    pub fn new(status: u16, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }
}

/// The request never produced a response.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }
}

/// Executes HTTP requests for the SDK.
///
/// Any status code, success or not, is a completed request; only a failure
/// to obtain a response is a [`TransportError`].
#[async_trait]
pub trait HttpInvoker: Send + Sync {
    async fn execute(&self, request: InvokerRequest) -> std::result::Result<InvokerResponse, TransportError>;
}

/// [`HttpInvoker`] backed by `reqwest`.
pub struct ReqwestInvoker {
    client: Client,
}

impl ReqwestInvoker {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("AppLaunch-Rust/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                AppLaunchError::with_source(ErrorCode::HttpClientError, "Failed to create HTTP client", e)
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn convert_error(error: reqwest::Error) -> TransportError {
        let message = if error.is_timeout() {
            "Request timed out".to_string()
        } else if error.is_connect() {
            "Connection failed".to_string()
        } else {
            error.to_string()
        };
        TransportError {
            message,
            source: Some(Box::new(error)),
        }
    }
}

#[async_trait]
impl HttpInvoker for ReqwestInvoker {
    async fn execute(&self, request: InvokerRequest) -> std::result::Result<InvokerResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.body(body.to_string());
        }

        tracing::debug!("{} {}", request.method.as_str(), request.url);

        let response = builder.send().await.map_err(Self::convert_error)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(Self::convert_error)?;

        Ok(InvokerResponse { status, text })
    }
}
