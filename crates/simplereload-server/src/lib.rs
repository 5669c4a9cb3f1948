//! Live reload for axum development servers.
//!
//! This crate provides:
//! - [`LiveReload`]: a heartbeat endpoint plus a middleware that injects a
//!   reconnect script into HTML responses, attachable to any `axum::Router`
//! - [`ShutdownBroadcast`]: the signal that ends heartbeat streams during
//!   graceful shutdown
//! - [`reconnect`]: the client reconnect protocol (backoff, reload-once)
//! - [`run_server`]: a small static file server with live reload attached
//!
//! No file watching is involved. A restart is inferred from the heartbeat
//! stream breaking and coming back.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::PathBuf;
//! use simplereload_server::{ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         root: PathBuf::from("public"),
//!         ..ServerConfig::default()
//!     };
//!
//!     run_server(config).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum router
//!                        │
//!                        ├─► inject middleware ──► app routes / static files
//!                        │        (HTML: script inserted after <head>)
//!                        │
//!                        └─► /simplereload (SSE heartbeat, one task per client)
//!                                 │
//!                                 └─► ends on disconnect or ShutdownBroadcast
//! ```

mod app;
mod error;
mod live_reload;
pub mod reconnect;

use std::path::PathBuf;
use std::time::Duration;

pub use error::ServerError;
pub use live_reload::{
    HEARTBEAT_DATA, LiveReload, LiveReloadBuilder, RELOAD_FLAG_KEY, ShutdownBroadcast,
};
pub use reconnect::RetryPolicy;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory served as static files.
    pub root: PathBuf,
    /// Enable live reload.
    pub live_reload_enabled: bool,
    /// Heartbeat endpoint path.
    pub live_reload_route: String,
    /// Interval between heartbeat messages.
    pub heartbeat_interval: Duration,
    /// Client retry bounds.
    pub retry_policy: RetryPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 7979,
            root: PathBuf::from("."),
            live_reload_enabled: true,
            live_reload_route: simplereload_config::DEFAULT_ROUTE.to_owned(),
            heartbeat_interval: Duration::from_secs(1),
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Live reload handle for this configuration, `None` when disabled.
    fn live_reload(&self) -> Option<LiveReload> {
        self.live_reload_enabled.then(|| {
            LiveReload::builder()
                .route(self.live_reload_route.clone())
                .heartbeat_interval(self.heartbeat_interval)
                .retry_policy(self.retry_policy)
                .build()
        })
    }
}

/// Run the server until SIGINT or SIGTERM.
///
/// On shutdown the live reload broadcast fires first so open heartbeat
/// streams end, then axum drains the remaining connections.
///
/// # Errors
///
/// Returns an error if the root is not a directory, the address cannot be
/// bound, or serving fails.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    if !config.root.is_dir() {
        return Err(ServerError::RootNotFound(config.root.clone()));
    }

    let live_reload = config.live_reload();
    let app = app::create_router(&config.root, live_reload.as_ref());

    let address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
    tracing::info!(
        address = %address,
        root = %config.root.display(),
        live_reload = live_reload.is_some(),
        "Starting server"
    );

    let shutdown = live_reload
        .as_ref()
        .map(|live_reload| live_reload.shutdown().clone())
        .unwrap_or_default();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.fire_after(shutdown_signal()))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from loaded configuration.
#[must_use]
pub fn server_config_from_config(config: &simplereload_config::Config) -> ServerConfig {
    let live_reload = &config.live_reload;

    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        root: config.serve_resolved.root.clone(),
        live_reload_enabled: live_reload.enabled,
        live_reload_route: live_reload.route.clone(),
        heartbeat_interval: live_reload.heartbeat_interval(),
        retry_policy: RetryPolicy::new(live_reload.retry_floor(), live_reload.retry_ceiling()),
    }
}
