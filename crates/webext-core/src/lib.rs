//! Core extension framework for the chat-UI server.
//!
//! The framework manages extensions through four collaborating pieces:
//! the [`loader`] turns installed directories into live instances, the
//! [`installer`] materializes new extensions from directories, archives
//! or URLs, the [`hooks`] registry dispatches host events to subscribed
//! callbacks, and the [`registry`] ties it all together with persisted
//! per-extension state.
//!
//! ```no_run
//! use webext_core::prelude::*;
//!
//! # async fn run() -> webext_core::Result<()> {
//! let registry = ExtensionRegistry::new(RegistryConfig::from_env())?;
//! registry.initialize_all().await;
//! let result = registry.enable("hello-world").await;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod hooks;
pub mod installer;
pub mod loader;
pub mod registry;

pub use config::RegistryConfig;
pub use descriptor::{ExtensionDescriptor, SettingEntry};
pub use error::{RegistryError, Result};
pub use hooks::{BUILTIN_HOOKS, DispatchMode, DispatchOutcome, HookRegistry};
pub use loader::{ExtensionLoader, FactoryRegistry, LoadedExtension};
pub use registry::{ExtensionRegistry, InstallResult, OperationResult};

/// Commonly used types in one import.
pub mod prelude {
    pub use crate::config::RegistryConfig;
    pub use crate::descriptor::ExtensionDescriptor;
    pub use crate::hooks::{DispatchMode, DispatchOutcome, HookRegistry};
    pub use crate::loader::FactoryRegistry;
    pub use crate::registry::{ExtensionRegistry, InstallResult, OperationResult};
    pub use webext_sdk::prelude::*;
}
