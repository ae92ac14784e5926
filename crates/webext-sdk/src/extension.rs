//! The `Extension` capability contract.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ExtensionError, Result};
use crate::types::{
    ComponentRenderer, ExtensionKind, HookSubscription, MountPoints, RouteSpec, SettingSpec,
    SettingValue, ToolHandler,
};

/// Contract every extension implements.
///
/// Identity accessors and declared capabilities are synchronous and pure;
/// lifecycle methods are async and default to trivial success. Capability
/// accessors (`components`, `tools`, `routes`, `styles`, model ops) are
/// only meaningful when [`Extension::kind`] selects that capability and
/// default to empty.
#[async_trait::async_trait]
pub trait Extension: Send + Sync {
    /// Unique name. Sole identity key across the registry.
    fn name(&self) -> &str;

    /// Version string. Opaque to the host; no constraint resolution.
    fn version(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn author(&self) -> &str {
        ""
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Generic
    }

    /// Names of extensions that must be active before this one activates.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Settings declared by this extension. The host owns the current
    /// values; extensions receive updates via [`Extension::apply_setting`].
    fn settings(&self) -> Vec<SettingSpec> {
        Vec::new()
    }

    /// Hook subscriptions to register while this extension is active.
    fn hook_subscriptions(&self) -> Vec<HookSubscription> {
        Vec::new()
    }

    /// Called with an (currently empty) context before activation.
    async fn initialize(&self, _context: &Value) -> Result<()> {
        Ok(())
    }

    async fn activate(&self) -> Result<()> {
        Ok(())
    }

    async fn deactivate(&self) -> Result<()> {
        Ok(())
    }

    /// Cleanup callback invoked before the extension's files are removed.
    async fn uninstall(&self) -> Result<()> {
        Ok(())
    }

    /// Mirror an updated setting value onto the live instance so
    /// subsequent renders and callbacks observe it immediately.
    fn apply_setting(&self, _key: &str, _value: &SettingValue) {}

    // ------------------------------------------------------------------
    // Capability accessors
    // ------------------------------------------------------------------

    /// UI components: component id to render function.
    fn components(&self) -> HashMap<String, ComponentRenderer> {
        HashMap::new()
    }

    /// Mount point name to ordered component ids.
    fn mount_points(&self) -> MountPoints {
        MountPoints::new()
    }

    /// Tool id to callable.
    fn tools(&self) -> HashMap<String, ToolHandler> {
        HashMap::new()
    }

    /// API routes contributed by this extension.
    fn routes(&self) -> Vec<RouteSpec> {
        Vec::new()
    }

    /// Style sheets: style id to CSS text.
    fn styles(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    fn theme_name(&self) -> Option<String> {
        None
    }

    /// Load the backing model (model extensions only).
    async fn load_model(&self) -> Result<()> {
        Err(ExtensionError::NotSupported("load_model".into()))
    }

    /// Generate a completion (model extensions only).
    async fn generate(&self, _prompt: &str, _params: &Value) -> Result<String> {
        Err(ExtensionError::NotSupported("generate".into()))
    }
}

/// Shared handle to a live extension instance.
pub type DynExtension = Arc<dyn Extension>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Minimal;

    #[async_trait::async_trait]
    impl Extension for Minimal {
        fn name(&self) -> &str {
            "minimal"
        }
        fn version(&self) -> &str {
            "0.1.0"
        }
    }

    #[tokio::test]
    async fn test_defaults_are_trivial_success() {
        let ext = Minimal;
        assert_eq!(ext.kind(), ExtensionKind::Generic);
        assert!(ext.dependencies().is_empty());
        assert!(ext.settings().is_empty());
        assert!(ext.hook_subscriptions().is_empty());
        assert!(ext.initialize(&serde_json::json!({})).await.is_ok());
        assert!(ext.activate().await.is_ok());
        assert!(ext.deactivate().await.is_ok());
        assert!(ext.uninstall().await.is_ok());
        assert!(ext.generate("hi", &serde_json::json!({})).await.is_err());
    }
}
