//! Client for the auth service: identifier lookup, credential exchange and
//! refresh exchange.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_response, join_url, ApiError};
use crate::models::UserProfile;

/// Tokens and user fields returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginGrant {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    #[serde(flatten)]
    pub user: UserProfile,
}

/// Tokens returned by a refresh. The refresh token is only present when the
/// service rotates it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshGrant {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,
}

/// The remote calls the session manager depends on.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Resolve the login handle (username) for a public identifier (email).
    async fn lookup_handle_by_identifier(&self, identifier: &str) -> Result<String, ApiError>;

    async fn exchange_credentials(
        &self,
        handle: &str,
        secret: &str,
        ttl_minutes: i64,
    ) -> Result<LoginGrant, ApiError>;

    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
        ttl_minutes: i64,
    ) -> Result<RefreshGrant, ApiError>;
}

#[derive(Debug, Deserialize)]
struct UserFilterResponse {
    #[serde(default)]
    users: Vec<UserHandle>,
}

#[derive(Debug, Deserialize)]
struct UserHandle {
    username: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(rename = "expiresInMins")]
    expires_in_mins: i64,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
    #[serde(rename = "expiresInMins")]
    expires_in_mins: i64,
}

/// The auth service answers rejected credentials and refresh tokens with 400.
fn rejected_as_unauthorized(e: ApiError) -> ApiError {
    match e {
        ApiError::BadRequest(_) => ApiError::Unauthorized,
        other => other,
    }
}

/// `AuthGateway` over the auth service's JSON API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpAuthGateway {
    client: Client,
    base_url: String,
}

impl HttpAuthGateway {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Ok(Self::with_client(super::http_client()?, base_url))
    }

    /// Share an existing connection pool.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn lookup_handle_by_identifier(&self, identifier: &str) -> Result<String, ApiError> {
        let url = join_url(&self.base_url, "users/filter");

        let response = self
            .client
            .get(&url)
            .query(&[("key", "email"), ("value", identifier)])
            .send()
            .await?;
        let response = check_response(response).await?;

        let body: UserFilterResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("user lookup: {}", e)))?;

        debug!(matches = body.users.len(), "User lookup complete");
        let mut users = body.users.into_iter();
        match (users.next(), users.next()) {
            (Some(user), None) => Ok(user.username),
            (None, _) => Err(ApiError::NotFound("no user matches identifier".to_string())),
            (Some(_), Some(_)) => Err(ApiError::InvalidResponse(
                "identifier matches more than one user".to_string(),
            )),
        }
    }

    async fn exchange_credentials(
        &self,
        handle: &str,
        secret: &str,
        ttl_minutes: i64,
    ) -> Result<LoginGrant, ApiError> {
        let url = join_url(&self.base_url, "auth/login");

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest {
                username: handle,
                password: secret,
                expires_in_mins: ttl_minutes,
            })
            .send()
            .await?;
        let response = check_response(response)
            .await
            .map_err(rejected_as_unauthorized)?;

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("login: {}", e)))
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
        ttl_minutes: i64,
    ) -> Result<RefreshGrant, ApiError> {
        let url = join_url(&self.base_url, "auth/refresh");

        let response = self
            .client
            .post(&url)
            .json(&RefreshRequest {
                refresh_token,
                expires_in_mins: ttl_minutes,
            })
            .send()
            .await?;
        let response = check_response(response)
            .await
            .map_err(rejected_as_unauthorized)?;

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("refresh: {}", e)))
    }
}
