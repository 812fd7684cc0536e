//! Authentication module for managing the user session and its credentials.
//!
//! This module provides:
//! - `SessionManager`: login, logout, expiry checks, silent refresh, restore
//! - `CredentialStore`: persisted access/refresh tokens and user snapshot
//! - `token`: local decoding of access token claims
//! - `RouteGuard`: tri-state access decisions for the front-end
//!
//! Access tokens live for 30 minutes, refresh tokens for 7 days.

pub mod error;
pub mod guard;
pub mod session;
pub mod store;
pub mod token;
pub mod validation;

pub use error::{AuthError, TokenError};
pub use guard::{Access, Route, RouteGuard};
pub use session::{AuthStatus, SessionManager, SessionSettings, SessionState};
pub use store::{Credential, CredentialStore, TokenTtl};
pub use token::TokenClaims;
pub use validation::validate_login_input;
