//! Registry error taxonomy.
//!
//! Every failure class the registry deals with has a variant here. None
//! of these escape the registry's public operations: they are folded into
//! `OperationResult` / `InstallResult` messages at the boundary.

use std::path::PathBuf;

/// Errors produced by the extension core.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("extension {0} not found")]
    NotFound(String),

    #[error("failed to load extension from {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    #[error("no extension entry point found in {0}")]
    EntryNotFound(PathBuf),

    #[error("unknown extension factory: {0}")]
    UnknownFactory(String),

    #[error("ABI version mismatch in {path}: host {host}, extension {extension}")]
    AbiMismatch {
        path: PathBuf,
        host: u32,
        extension: u32,
    },

    #[error("missing dependency: {0}")]
    MissingDependency(String),

    #[error("failed to enable dependency {name}: {reason}")]
    DependencyFailed { name: String, reason: String },

    #[error("dependency cycle detected involving {0}")]
    CycleDetected(String),

    #[error("failed to {stage} extension {name}: {reason}")]
    LifecycleFailed {
        name: String,
        stage: &'static str,
        reason: String,
    },

    #[error("extension {dependent} depends on {name}")]
    Conflict { name: String, dependent: String },

    #[error("invalid extension source: {0}")]
    InvalidSource(String),

    #[error("install failed: {0}")]
    InstallFailed(String),

    #[error("extension name mismatch: manifest says {manifest}, instance says {instance}")]
    NameMismatch { manifest: String, instance: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("download error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error(transparent)]
    Extension(#[from] webext_sdk::ExtensionError),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_subject() {
        let err = RegistryError::NotFound("hello".into());
        assert!(err.to_string().contains("hello"));

        let err = RegistryError::MissingDependency("db-driver".into());
        assert!(err.to_string().contains("db-driver"));

        let err = RegistryError::Conflict {
            name: "base".into(),
            dependent: "ui-pack".into(),
        };
        assert!(err.to_string().contains("ui-pack"));
        assert!(err.to_string().contains("base"));
    }
}
