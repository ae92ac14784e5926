//! Error type shared between extensions and the host.

/// Errors raised by extension code or by the host while driving it.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    #[error("activation failed: {0}")]
    ActivationFailed(String),

    #[error("deactivation failed: {0}")]
    DeactivationFailed(String),

    #[error("hook callback failed: {0}")]
    CallbackFailed(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ExtensionError {
    /// Convenience constructor for ad-hoc failures inside extension code.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result type for extension operations.
pub type Result<T> = std::result::Result<T, ExtensionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExtensionError::InitializationFailed("bad config".into());
        assert!(err.to_string().contains("initialization failed"));

        let err = ExtensionError::NotSupported("generate".into());
        assert!(err.to_string().contains("not supported"));
    }
}
