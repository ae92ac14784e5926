//! Request handlers for the extension management API.
//!
//! Domain failures are reported as `success: false` payloads with HTTP
//! 200; transport-level errors are left to axum's extractors.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};
use webext_core::{DispatchOutcome, ExtensionRegistry};
use webext_sdk::SettingValue;

/// Shared handler state.
pub type ApiState = Arc<ExtensionRegistry>;

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct InstallRequest {
    /// URL, directory path, or zip file path.
    pub source: String,
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub name: String,
    pub settings: HashMap<String, SettingValue>,
}

/// List all known extensions.
pub async fn list_handler(State(registry): State<ApiState>) -> Json<Value> {
    let extensions = registry.list().await;
    Json(json!({ "success": true, "extensions": extensions }))
}

/// Fetch one extension descriptor.
pub async fn get_handler(
    State(registry): State<ApiState>,
    Path(name): Path<String>,
) -> Json<Value> {
    match registry.get(&name).await {
        Some(descriptor) => Json(json!({ "success": true, "extension": descriptor })),
        None => Json(json!({
            "success": false,
            "message": format!("extension {name} is not installed"),
        })),
    }
}

/// Install an extension from a URL, directory or zip file.
pub async fn install_handler(
    State(registry): State<ApiState>,
    Json(request): Json<InstallRequest>,
) -> Json<Value> {
    let result = registry.install(&request.source).await;
    Json(json!(result))
}

/// Remove an extension entirely.
pub async fn uninstall_handler(
    State(registry): State<ApiState>,
    Json(request): Json<NameRequest>,
) -> Json<Value> {
    let result = registry.uninstall(&request.name).await;
    Json(json!(result))
}

/// Enable an extension and its dependencies.
pub async fn enable_handler(
    State(registry): State<ApiState>,
    Json(request): Json<NameRequest>,
) -> Json<Value> {
    let result = registry.enable(&request.name).await;
    Json(json!(result))
}

/// Disable an extension.
pub async fn disable_handler(
    State(registry): State<ApiState>,
    Json(request): Json<NameRequest>,
) -> Json<Value> {
    let result = registry.disable(&request.name).await;
    Json(json!(result))
}

/// Update setting values for one extension.
pub async fn settings_handler(
    State(registry): State<ApiState>,
    Json(request): Json<SettingsRequest>,
) -> Json<Value> {
    let result = registry
        .update_settings(&request.name, &request.settings)
        .await;
    Json(json!(result))
}

/// Rescan the installed directory.
pub async fn discover_handler(State(registry): State<ApiState>) -> Json<Value> {
    let extensions = registry.discover().await;
    Json(json!({ "success": true, "extensions": extensions }))
}

/// Bring every persisted-active extension back up.
pub async fn initialize_handler(State(registry): State<ApiState>) -> Json<Value> {
    let results: HashMap<String, Value> = registry
        .initialize_all()
        .await
        .into_iter()
        .map(|(name, (success, message))| {
            (name, json!({ "success": success, "message": message }))
        })
        .collect();
    Json(json!({ "success": true, "results": results }))
}

/// Render the components mounted at a UI mount point.
pub async fn ui_handler(
    State(registry): State<ApiState>,
    Path(mount_point): Path<String>,
) -> Json<Value> {
    let html = registry.render_mount_point(&mount_point).await;
    Json(json!({ "success": true, "html": html }))
}

/// Fire a named hook and return its outcome.
pub async fn hook_handler(
    State(registry): State<ApiState>,
    Path(hook): Path<String>,
    payload: Option<Json<Value>>,
) -> Json<Value> {
    let payload = payload.map(|Json(value)| value).unwrap_or(Value::Null);
    match registry.dispatch_hook(&hook, payload).await {
        DispatchOutcome::Collected(results) => {
            Json(json!({ "success": true, "results": results }))
        }
        DispatchOutcome::Piped(value) => Json(json!({ "success": true, "result": value })),
    }
}
