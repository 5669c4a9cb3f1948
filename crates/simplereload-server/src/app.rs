//! Router construction.
//!
//! Builds the axum router for the bundled static file server.

use std::path::Path;

use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::live_reload::LiveReload;

/// Create the application router.
///
/// # Arguments
///
/// * `root` - Directory served as static files
/// * `live_reload` - Live reload handle, `None` to serve files unmodified
pub(crate) fn create_router(root: &Path, live_reload: Option<&LiveReload>) -> Router {
    let mut router = Router::new().fallback_service(ServeDir::new(root));

    if let Some(live_reload) = live_reload {
        router = live_reload.attach(router);
    }

    router.layer(TraceLayer::new_for_http())
}
