use thiserror::Error;

/// Local failure to read claims out of a bearer token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),
}

/// Session outcomes surfaced to the user.
///
/// Gateway failures never escape the session manager raw; they are folded
/// into one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Failed to save session: {0}")]
    Storage(String),
}
