//! Session lifecycle: login, logout, expiry checks, silent refresh and
//! startup restoration.
//!
//! `SessionManager` is the only writer of both the credential store and the
//! in-memory `SessionState`. Consumers (route guards, the course client, the
//! front-end header) read the state through a `watch` channel and are notified
//! on every change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use super::store::{Credential, CredentialStore, TokenTtl};
use super::token;
use super::AuthError;
use crate::api::AuthGateway;
use crate::models::UserProfile;

/// Default early-refresh margin before real token expiry.
const DEFAULT_SKEW_BUFFER_SECS: i64 = 60;

/// Where the session is in its lifecycle, as seen by route guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Initializing,
    Authenticated,
    Unauthenticated,
}

/// The process-wide session. `is_authenticated` is derived from the user, so
/// the two can't disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    current_user: Option<UserProfile>,
    is_initializing: bool,
}

impl SessionState {
    /// Session at process start, before restoration has run.
    pub fn initializing() -> Self {
        Self {
            current_user: None,
            is_initializing: true,
        }
    }

    /// A settled session, for consumers that don't go through restoration.
    pub fn settled(current_user: Option<UserProfile>) -> Self {
        Self {
            current_user,
            is_initializing: false,
        }
    }

    pub fn current_user(&self) -> Option<&UserProfile> {
        self.current_user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }

    pub fn is_initializing(&self) -> bool {
        self.is_initializing
    }

    pub fn status(&self) -> AuthStatus {
        if self.is_initializing {
            AuthStatus::Initializing
        } else if self.is_authenticated() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Unauthenticated
        }
    }
}

/// TTL and expiry policy for the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub ttl: TokenTtl,
    /// Tokens expiring within this window count as expired
    pub skew_buffer: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: TokenTtl::default(),
            skew_buffer: Duration::seconds(DEFAULT_SKEW_BUFFER_SECS),
        }
    }
}

pub struct SessionManager {
    store: CredentialStore,
    gateway: Arc<dyn AuthGateway>,
    settings: SessionSettings,
    state: watch::Sender<SessionState>,
    restored: AtomicBool,
    // Held for the whole check-then-refresh so a refresh token is spent once
    refresh_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        store: CredentialStore,
        gateway: Arc<dyn AuthGateway>,
        settings: SessionSettings,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::initializing());
        Self {
            store,
            gateway,
            settings,
            state,
            restored: AtomicBool::new(false),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Receive the current session and every later change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Snapshot of the current session
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> AuthStatus {
        self.state.borrow().status()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.state.borrow().current_user.clone()
    }

    /// Exchange an email and password for a token pair and start a session.
    ///
    /// Unknown identifiers and rejected passwords both fail with
    /// `InvalidCredentials`. Nothing is written unless both steps succeed.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<(), AuthError> {
        let handle = match self.gateway.lookup_handle_by_identifier(identifier).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "Identifier lookup failed");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let grant = match self
            .gateway
            .exchange_credentials(&handle, secret, self.settings.ttl.access_minutes())
            .await
        {
            Ok(grant) => grant,
            Err(e) => {
                warn!(error = %e, "Credential exchange failed");
                return Err(AuthError::InvalidCredentials);
            }
        };

        match token::decode(&grant.access_token) {
            Ok(claims) => debug!(
                expires_at = claims.expires_at,
                issued_at = claims.issued_at,
                subject_id = ?claims.subject_id,
                "Access token issued"
            ),
            Err(e) => warn!(error = %e, "Issued access token could not be decoded"),
        }

        let credential = Credential {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            user: grant.user,
        };

        if let Err(e) = self.store.write(&credential, &self.settings.ttl) {
            error!(error = %e, "Failed to persist credential");
            self.store.clear();
            return Err(AuthError::Storage(e.to_string()));
        }

        info!(user_id = credential.user.id, "Login successful");
        self.state
            .send_modify(|s| s.current_user = Some(credential.user));
        Ok(())
    }

    /// End the session. Safe to call with no active session.
    pub fn logout(&self) {
        self.store.clear();
        let changed = self
            .state
            .send_if_modified(|s| s.current_user.take().is_some());
        if changed {
            info!("Logged out");
        } else {
            debug!("Logout with no active session");
        }
    }

    /// True if the stored access token is missing, unreadable, or expires
    /// within the skew buffer.
    pub fn is_token_expired(&self) -> bool {
        let Some(access_token) = self.store.access_token() else {
            return true;
        };
        match token::decode(&access_token) {
            Ok(claims) => claims.is_expired_at(Utc::now(), self.settings.skew_buffer),
            Err(e) => {
                debug!(error = %e, "Stored access token is unreadable");
                true
            }
        }
    }

    /// Obtain a new access token with the stored refresh token.
    ///
    /// Returns false without side effects when there is no refresh token.
    /// A failed exchange ends the session: the store is cleared before this
    /// returns and the exchange is not retried. Concurrent refreshes are
    /// serialized.
    pub async fn refresh_access_token(&self) -> bool {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> bool {
        let Some(refresh_token) = self.store.refresh_token() else {
            debug!("No refresh token stored");
            return false;
        };

        let grant = match self
            .gateway
            .exchange_refresh_token(&refresh_token, self.settings.ttl.access_minutes())
            .await
        {
            Ok(grant) => grant,
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.logout();
                return false;
            }
        };

        if let Err(e) = self
            .store
            .write_access_token(&grant.access_token, &self.settings.ttl)
        {
            error!(error = %e, "Failed to persist refreshed access token");
            self.logout();
            return false;
        }

        match grant.refresh_token.filter(|t| !t.is_empty()) {
            Some(rotated) => {
                if let Err(e) = self.store.write_refresh_token(&rotated, &self.settings.ttl) {
                    error!(error = %e, "Failed to persist rotated refresh token");
                    self.logout();
                    return false;
                }
                debug!("Access token refreshed, refresh token rotated");
            }
            None => debug!("Access token refreshed"),
        }
        true
    }

    /// The stored access token, unvalidated.
    pub fn get_access_token(&self) -> Option<String> {
        self.store.access_token()
    }

    /// An access token that isn't about to expire, refreshing if needed.
    ///
    /// Callers racing on a stale token share one refresh. Fails with
    /// `SessionExpired` when no usable session remains; the store has been
    /// cleared by then.
    pub async fn valid_access_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.fresh_access_token() {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited
        if let Some(token) = self.fresh_access_token() {
            return Ok(token);
        }

        if self.refresh_locked().await {
            if let Some(token) = self.store.access_token() {
                return Ok(token);
            }
        }

        // Drop whatever is left so the session state matches the store
        self.logout();
        Err(AuthError::SessionExpired)
    }

    fn fresh_access_token(&self) -> Option<String> {
        if self.is_token_expired() {
            None
        } else {
            self.store.access_token()
        }
    }

    /// Seed the session from the credential store. Runs once per process;
    /// later calls log and return the current status.
    pub async fn restore(&self) -> AuthStatus {
        if self.restored.swap(true, Ordering::SeqCst) {
            warn!("Session restoration already ran");
            return self.status();
        }

        let user = self.restore_user().await;
        self.state.send_modify(|s| {
            // A login that finished while restoring takes precedence
            if s.current_user.is_none() {
                s.current_user = user;
            }
            s.is_initializing = false;
        });

        let status = self.status();
        info!(?status, "Session initialized");
        status
    }

    async fn restore_user(&self) -> Option<UserProfile> {
        let Some(snapshot) = self.store.user() else {
            debug!("No stored session");
            // Tokens without a user snapshot can't restore a session
            self.store.clear();
            return None;
        };

        if !self.is_token_expired() {
            debug!(user_id = snapshot.id, "Restored session from stored credential");
            return Some(snapshot);
        }

        if self.store.refresh_token().is_none() {
            debug!("Stored session expired and cannot be refreshed");
            self.store.clear();
            return None;
        }

        info!("Stored access token expired, attempting silent refresh");
        if self.refresh_access_token().await {
            self.store.user()
        } else {
            None
        }
    }
}
