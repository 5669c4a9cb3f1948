//! Live reload for development servers.
//!
//! A page served through the injection middleware carries a small script
//! that keeps a heartbeat stream open. When the backend restarts the stream
//! breaks, the script retries with backoff, and once the new process answers
//! the page reloads itself exactly once.
//!
//! ```ignore
//! use axum::Router;
//! use simplereload_server::LiveReload;
//!
//! let live_reload = LiveReload::default();
//! let app = live_reload.attach(Router::new().route("/", get(index)));
//!
//! axum::serve(listener, app)
//!     .with_graceful_shutdown(live_reload.shutdown().fire_after(ctrl_c()))
//!     .await?;
//! ```

mod heartbeat;
mod inject;
mod script;
mod shutdown;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use simplereload_config::{DEFAULT_ROUTE, LiveReloadConfig};

use crate::reconnect::RetryPolicy;

pub use heartbeat::HEARTBEAT_DATA;
pub use script::RELOAD_FLAG_KEY;
pub use shutdown::ShutdownBroadcast;

/// Default interval between heartbeat messages.
const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(1);

/// Live reload handle: heartbeat route, rendered script and shutdown
/// broadcast. Cheap to clone.
#[derive(Clone)]
pub struct LiveReload {
    inner: Arc<Inner>,
}

struct Inner {
    route: String,
    heartbeat_interval: Duration,
    retry_policy: RetryPolicy,
    script: String,
    shutdown: ShutdownBroadcast,
    sessions: Arc<AtomicUsize>,
}

impl LiveReload {
    /// Start building a handle with non-default settings.
    #[must_use]
    pub fn builder() -> LiveReloadBuilder {
        LiveReloadBuilder::default()
    }

    /// Build a handle from the `[live_reload]` configuration section.
    #[must_use]
    pub fn from_config(config: &LiveReloadConfig) -> Self {
        Self::builder()
            .route(config.route.clone())
            .heartbeat_interval(config.heartbeat_interval())
            .retry_policy(RetryPolicy::new(config.retry_floor(), config.retry_ceiling()))
            .build()
    }

    /// Add the heartbeat route and wrap every existing route and the
    /// fallback with the injection middleware.
    ///
    /// Call this after the application's routes are registered: routes added
    /// afterwards are not wrapped.
    ///
    /// # Panics
    ///
    /// Panics if `router` already has a route at the heartbeat path.
    pub fn attach<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            .layer(from_fn_with_state(self.clone(), inject::inject_reload_script))
            .route(
                self.route(),
                get(heartbeat::heartbeat_handler).with_state(self.clone()),
            )
    }

    /// Path of the heartbeat endpoint.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.inner.route
    }

    /// Interval between heartbeat messages.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        self.inner.heartbeat_interval
    }

    /// Retry policy rendered into the client script.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry_policy
    }

    /// Script markup injected into HTML pages.
    #[must_use]
    pub fn script(&self) -> &str {
        &self.inner.script
    }

    /// Broadcast that ends every heartbeat stream when fired.
    #[must_use]
    pub fn shutdown(&self) -> &ShutdownBroadcast {
        &self.inner.shutdown
    }

    /// Number of heartbeat streams currently open.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.load(Ordering::Acquire)
    }

    fn session_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.inner.sessions)
    }
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for LiveReload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveReload")
            .field("route", &self.inner.route)
            .field("heartbeat_interval", &self.inner.heartbeat_interval)
            .field("retry_policy", &self.inner.retry_policy)
            .field("shutdown_fired", &self.inner.shutdown.is_fired())
            .finish_non_exhaustive()
    }
}

/// Builder for [`LiveReload`].
#[derive(Debug)]
pub struct LiveReloadBuilder {
    route: String,
    heartbeat_interval: Duration,
    retry_policy: RetryPolicy,
    shutdown: Option<ShutdownBroadcast>,
}

impl Default for LiveReloadBuilder {
    fn default() -> Self {
        Self {
            route: DEFAULT_ROUTE.to_owned(),
            heartbeat_interval: DEFAULT_HEARTBEAT,
            retry_policy: RetryPolicy::default(),
            shutdown: None,
        }
    }
}

impl LiveReloadBuilder {
    /// Heartbeat endpoint path. Must start with `/`.
    #[must_use]
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    /// Interval between heartbeat messages.
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Client retry bounds.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Share an existing broadcast, e.g. one already tied to the host's
    /// shutdown sequence.
    #[must_use]
    pub fn shutdown(mut self, shutdown: ShutdownBroadcast) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Render the script and create the handle.
    #[must_use]
    pub fn build(self) -> LiveReload {
        let script = script::render(&self.route, self.retry_policy);
        LiveReload {
            inner: Arc::new(Inner {
                route: self.route,
                heartbeat_interval: self.heartbeat_interval,
                retry_policy: self.retry_policy,
                script,
                shutdown: self.shutdown.unwrap_or_default(),
                sessions: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }
}
