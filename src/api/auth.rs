use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::error::{self, ApiError};
use crate::api::http::HttpClient;
use crate::models::{Credentials, RegisterRequest};
use crate::session::token;

/// Seam between the session state and the user service, so session logic
/// can be exercised without a live gateway.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Exchange credentials for a structurally valid bearer token.
    async fn login(&self, credentials: &Credentials) -> Result<String, ApiError>;

    /// Create an account; returns the confirmation text.
    async fn register(&self, request: &RegisterRequest) -> Result<String, ApiError>;

    /// Ask the gateway to invalidate the current token.
    async fn logout(&self) -> Result<(), ApiError>;
}

pub struct AuthClient {
    http: Arc<HttpClient>,
}

impl AuthClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AuthGateway for AuthClient {
    async fn login(&self, credentials: &Credentials) -> Result<String, ApiError> {
        info!("login attempt for user: {}", credentials.username);

        let builder = self
            .http
            .request(Method::POST, "/auth/login")
            .json(credentials);
        let body = match self.http.expect_text(builder).await {
            Ok(body) => body,
            // A rejected login surfaces as bad credentials, not as a
            // generic authorization failure.
            Err(ApiError::Unauthorized) | Err(ApiError::AccessForbidden) => {
                return Err(ApiError::InvalidCredentials);
            }
            Err(other) => return Err(other),
        };

        // The user service answers 200 for failed logins too, with the
        // literal text below instead of a token.
        let reply = body.trim();
        if reply == "Invalid credentials" {
            return Err(ApiError::InvalidCredentials);
        }
        if !token::is_well_formed(reply) {
            warn!("login reply is not a 3-segment token");
            return Err(ApiError::Credential(
                "login response is not a valid token".to_string(),
            ));
        }

        Ok(reply.to_string())
    }

    async fn register(&self, request: &RegisterRequest) -> Result<String, ApiError> {
        info!("registering user: {}", request.username);

        let builder = self
            .http
            .request(Method::POST, "/auth/register")
            .json(request);
        let response = self.http.send(builder).await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // Collisions may arrive as success-shaped text; classify the body
        // before trusting the status code.
        if let Some(field) = error::duplicate_field_in(&body) {
            return Err(ApiError::DuplicateAccount { field });
        }
        if status == reqwest::StatusCode::CONFLICT {
            return Err(ApiError::DuplicateAccount {
                field: error::DuplicateField::Generic,
            });
        }
        if !status.is_success() {
            return Err(crate::api::http::classify_status(status, &body));
        }

        Ok(body)
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let builder = self.http.request(Method::POST, "/auth/logout");
        self.http.expect_text(builder).await?;
        Ok(())
    }
}
