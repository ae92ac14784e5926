//! Extension manifest.
//!
//! Every installable extension directory carries a `manifest.json` naming
//! the extension and its entry point. The manifest replaces any kind of
//! "find the one concrete Extension type in a loaded module" scanning:
//! the entry is declared explicitly, either as a factory registered with
//! the host or as a native library exporting the SDK's FFI symbols.

use serde::{Deserialize, Serialize};

use crate::types::ExtensionKind;

/// Conventional manifest file name inside an extension directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// How the extension's runtime instance is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySpec {
    /// Name of a factory registered with the host's factory registry.
    Builtin(String),
    /// File name of a cdylib inside the extension directory exporting
    /// the `webext_extension_create` family of symbols.
    Native(String),
}

/// Static metadata and entry declaration for one extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionManifest {
    /// Extension name; must match the loaded instance's `name()`.
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub kind: ExtensionKind,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Entry point declaration.
    pub entry: EntrySpec,
}

impl ExtensionManifest {
    /// Parse a manifest from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
