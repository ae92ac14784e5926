//! HTTP management API for the extension framework.
//!
//! The host mounts [`router`] under its own path prefix (typically
//! `/api/extensions`) and calls
//! [`ExtensionRegistry::initialize_all`](webext_core::ExtensionRegistry::initialize_all)
//! once at startup. For a standalone deployment, [`serve`] binds a
//! listener and runs the router directly.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use webext_core::ExtensionRegistry;

pub mod handlers;

pub use handlers::{ApiState, InstallRequest, NameRequest, SettingsRequest};

/// Build the extension management router.
pub fn router(registry: Arc<ExtensionRegistry>) -> Router {
    Router::new()
        .route("/", get(handlers::list_handler))
        .route("/install", post(handlers::install_handler))
        .route("/uninstall", post(handlers::uninstall_handler))
        .route("/enable", post(handlers::enable_handler))
        .route("/disable", post(handlers::disable_handler))
        .route("/settings", post(handlers::settings_handler))
        .route("/discover", post(handlers::discover_handler))
        .route("/initialize", post(handlers::initialize_handler))
        .route("/ui/:mount_point", get(handlers::ui_handler))
        .route("/hooks/:name", post(handlers::hook_handler))
        .route("/:name", get(handlers::get_handler))
        .with_state(registry)
}

/// Serve the management API on `addr` until the task is cancelled.
pub async fn serve(registry: Arc<ExtensionRegistry>, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "extension API listening");
    axum::serve(listener, router(registry)).await
}
