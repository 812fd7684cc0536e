//! Core library for coursedesk, a course catalog admin client.
//!
//! - `auth`: session lifecycle (login, logout, silent refresh, restore)
//! - `api`: auth gateway and course service clients
//! - `storage`: expiry-bound credential storage backends
//! - `models`: user and course types
//! - `config`: file and environment configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{ApiError, AuthGateway, CourseClient, HttpAuthGateway};
pub use auth::{AuthError, AuthStatus, SessionManager, SessionState};
pub use config::Config;
