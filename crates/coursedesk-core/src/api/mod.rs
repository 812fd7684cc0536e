//! REST clients for the auth and course services.
//!
//! - `AuthGateway` / `HttpAuthGateway`: identifier lookup, login and refresh
//!   exchanges against the auth service
//! - `CourseClient`: course catalog CRUD against the course service
//!
//! Both talk JSON over HTTP through a shared `reqwest::Client` configuration.

pub mod courses;
pub mod error;
pub mod gateway;

use std::time::Duration;

use reqwest::Client;

pub use courses::CourseClient;
pub use error::ApiError;
pub use gateway::{AuthGateway, HttpAuthGateway, LoginGrant, RefreshGrant};

/// HTTP request timeout in seconds.
/// Requests with no response are failures once this fires.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Build the HTTP client shared by the service clients.
pub fn http_client() -> Result<Client, ApiError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?)
}

/// Pass successful responses through; turn anything else into an `ApiError`.
pub(crate) async fn check_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
