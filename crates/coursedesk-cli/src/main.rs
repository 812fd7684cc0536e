//! coursedesk - a terminal front-end for the course catalog admin.
//!
//! Composes the session manager and course client, restores any stored
//! session, then runs a single command.

mod commands;
mod prompt;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use coursedesk_core::api::{self, CourseClient, HttpAuthGateway};
use coursedesk_core::auth::{CredentialStore, SessionManager};
use coursedesk_core::storage;
use coursedesk_core::Config;

use commands::Command;

/// Initialize the tracing subscriber for logging.
///
/// Console output is filtered by `RUST_LOG` (default `warn`); the log file
/// under the cache directory records everything at debug and above.
fn init_tracing(cache_dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_appender = tracing_appender::rolling::daily(cache_dir.join("logs"), "coursedesk.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_filter(filter))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer)
                .with_filter(EnvFilter::new("coursedesk=debug,coursedesk_core=debug")),
        )
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(Command::Help) => {
            println!("{}", commands::USAGE);
            return Ok(());
        }
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, commands::USAGE);
            std::process::exit(2);
        }
    };

    let cache_dir = Config::cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
    let _log_guard = init_tracing(&cache_dir);
    info!(?command, "coursedesk starting");

    let mut config = match Config::load().and_then(|c| c.validate().map(|()| c)) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e);
        }
    };

    // Root composition: one session manager shared by everything
    let backend = storage::open(config.storage, &cache_dir)?;
    let store = CredentialStore::new(backend, config.production);
    let http = api::http_client()?;
    let gateway = Arc::new(HttpAuthGateway::with_client(
        http.clone(),
        config.auth_api_url()?,
    ));
    let session = Arc::new(SessionManager::new(
        store,
        gateway,
        config.session_settings(),
    ));
    let courses =
        CourseClient::with_client(http, config.course_api_url()?).with_session(Arc::clone(&session));

    let mut changes = session.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let state = changes.borrow_and_update().clone();
            debug!(
                status = ?state.status(),
                user = ?state.current_user().map(|u| u.username.as_str()),
                "Session changed"
            );
        }
    });

    let status = session.restore().await;
    debug!(?status, "Startup restoration finished");

    let result = commands::run(command, &session, &courses, &mut config).await;
    if let Err(ref e) = result {
        warn!(error = %e, "Command failed");
    }

    info!("coursedesk shutting down");
    result
}
