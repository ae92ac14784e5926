//! webext Extension SDK
//!
//! Tools for authoring extensions for the webext framework: the
//! [`Extension`] capability contract, the manifest format, the settings
//! model, hook callback types, and the FFI export macro for native
//! (cdylib) extensions.
//!
//! # Quick start
//!
//! ```
//! use webext_sdk::prelude::*;
//!
//! #[derive(Default)]
//! struct Greeter;
//!
//! #[async_trait::async_trait]
//! impl Extension for Greeter {
//!     fn name(&self) -> &str { "greeter" }
//!     fn version(&self) -> &str { "0.1.0" }
//!     fn settings(&self) -> Vec<SettingSpec> {
//!         vec![SettingSpec::new("greeting", "hello").with_description("Shown in chat")]
//!     }
//! }
//! ```

pub mod error;
pub mod extension;
#[macro_use]
pub mod macros;
pub mod manifest;
pub mod types;

/// ABI version for native extension loading. The loader refuses a
/// library whose exported version differs.
pub const ABI_VERSION: u32 = 1;

/// Symbol names exported by native extensions (see [`export_extension!`]).
pub const ABI_VERSION_SYMBOL: &[u8] = b"webext_abi_version";
pub const CREATE_SYMBOL: &[u8] = b"webext_extension_create";
pub const DESTROY_SYMBOL: &[u8] = b"webext_extension_destroy";

pub use error::{ExtensionError, Result};
pub use extension::{DynExtension, Extension};
pub use manifest::{EntrySpec, ExtensionManifest, MANIFEST_FILE};
pub use types::{
    ComponentRenderer, DEFAULT_HOOK_PRIORITY, ExtensionKind, HookCallback, HookSubscription,
    MountPoints, RouteSpec, SettingSpec, SettingType, SettingValue, ToolHandler, hook_fn, tool_fn,
};

/// Prelude module with common imports.
pub mod prelude {
    pub use crate::error::{ExtensionError, Result};
    pub use crate::extension::{DynExtension, Extension};
    pub use crate::manifest::{EntrySpec, ExtensionManifest, MANIFEST_FILE};
    pub use crate::types::{
        ComponentRenderer, ExtensionKind, HookCallback, HookSubscription, MountPoints, RouteSpec,
        SettingSpec, SettingType, SettingValue, ToolHandler, hook_fn, tool_fn,
    };
    pub use serde_json::Value;
}
