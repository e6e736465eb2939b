use bytes::Bytes;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::api::error::{self, ApiError};
use crate::config::PortalConfig;
use crate::session::store::TokenStore;

/// Shared HTTP layer. Attaches the bearer token to every request when one
/// is stored, tags requests with an `x-request-id`, and classifies every
/// failure into the [`ApiError`] taxonomy. Never retries, never refreshes;
/// a 401 is the caller's problem.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    store: Arc<TokenStore>,
}

impl HttpClient {
    pub fn new(config: &PortalConfig, store: Arc<TokenStore>) -> Result<Self, ApiError> {
        let base_url = config.gateway_url.trim_end_matches('/').to_string();

        let parsed = url::Url::parse(&base_url)
            .map_err(|e| ApiError::Configuration(format!("invalid URL `{base_url}`: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::Configuration(format!(
                "gateway URL must use http or https, got `{}`",
                parsed.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.request_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            store,
        })
    }

    /// Build a request against a gateway path, with credentials attached
    /// when present.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        let mut builder = self
            .client
            .request(method, url)
            .header("x-request-id", Uuid::new_v4().to_string());
        if let Some(token) = self.store.load() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Send a request, classifying transport failures. The response may
    /// still carry an error status; pair with one of the `expect_*` helpers.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        builder.send().await.map_err(classify_transport)
    }

    pub async fn expect_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.check(self.send(builder).await?).await?;
        response.json().await.map_err(classify_transport)
    }

    pub async fn expect_text(&self, builder: RequestBuilder) -> Result<String, ApiError> {
        let response = self.check(self.send(builder).await?).await?;
        response.text().await.map_err(classify_transport)
    }

    pub async fn expect_bytes(&self, builder: RequestBuilder) -> Result<Bytes, ApiError> {
        let response = self.check(self.send(builder).await?).await?;
        response.bytes().await.map_err(classify_transport)
    }

    pub async fn expect_empty(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        self.check(self.send(builder).await?).await?;
        Ok(())
    }

    /// Pass successful responses through; classify everything else.
    pub async fn check(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }
}

/// Map an HTTP error status to the domain taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> ApiError {
    match status {
        StatusCode::BAD_REQUEST => ApiError::BadRequest(error::bad_request_detail(body)),
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::FORBIDDEN => ApiError::AccessForbidden,
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::SERVICE_UNAVAILABLE => ApiError::ServiceUnavailable,
        other => ApiError::Unknown {
            status: other.as_u16(),
            message: if body.is_empty() {
                other
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            } else {
                body.chars().take(200).collect()
            },
        },
    }
}

/// Map a reqwest failure (no HTTP status reached us) to the taxonomy.
/// Connection-level failures are the browser's "status 0" case.
pub fn classify_transport(err: reqwest::Error) -> ApiError {
    if err.is_connect() || err.is_timeout() {
        ApiError::NetworkUnavailable(err.to_string())
    } else if let Some(status) = err.status() {
        classify_status(status, "")
    } else {
        ApiError::Unknown {
            status: 0,
            message: err.to_string(),
        }
    }
}
