//! Registry configuration.

use std::path::{Path, PathBuf};

/// Environment variable overriding the managed extensions root.
pub const EXTENSIONS_DIR_ENV: &str = "WEBEXT_EXTENSIONS_DIR";

/// File name of the persisted registry store inside the root.
pub const REGISTRY_FILE: &str = "registry.json";

/// Subdirectory holding one folder per installed extension.
pub const INSTALLED_DIR: &str = "installed";

/// Scratch space for in-flight install operations.
pub const TEMP_DIR: &str = "temp";

/// Configuration for an [`crate::registry::ExtensionRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// The managed extensions root directory.
    pub root: PathBuf,
}

impl RegistryConfig {
    /// Use an explicit root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the root directory from the environment.
    ///
    /// Order: `WEBEXT_EXTENSIONS_DIR`, then the first existing of
    /// `~/.webext/extensions`, `~/.config/webext/extensions`,
    /// `./extensions`, falling back to `~/.webext/extensions`.
    pub fn from_env() -> Self {
        if let Ok(dir) = std::env::var(EXTENSIONS_DIR_ENV) {
            if !dir.is_empty() {
                return Self::new(dir);
            }
        }

        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(home) = home_dir() {
            candidates.push(home.join(".webext").join("extensions"));
            candidates.push(home.join(".config").join("webext").join("extensions"));
        }
        candidates.push(PathBuf::from("./extensions"));

        for candidate in &candidates {
            if candidate.exists() {
                return Self::new(candidate.clone());
            }
        }

        let fallback = home_dir()
            .map(|home| home.join(".webext").join("extensions"))
            .unwrap_or_else(|| PathBuf::from("./extensions"));
        Self::new(fallback)
    }

    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    pub fn installed_dir(&self) -> PathBuf {
        self.root.join(INSTALLED_DIR)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    /// Create the root layout: `installed/`, `temp/` and an empty store.
    pub fn ensure_layout(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.installed_dir())?;
        std::fs::create_dir_all(self.temp_dir())?;

        let store = self.registry_file();
        if !store.exists() {
            std::fs::write(&store, "{\n  \"extensions\": {}\n}\n")?;
        }
        Ok(())
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Path of the directory holding one installed extension.
pub fn extension_dir(root: &Path, name: &str) -> PathBuf {
    root.join(INSTALLED_DIR).join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_creation() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RegistryConfig::new(tmp.path().join("ext"));
        config.ensure_layout().unwrap();

        assert!(config.installed_dir().is_dir());
        assert!(config.temp_dir().is_dir());
        assert!(config.registry_file().is_file());

        let text = std::fs::read_to_string(config.registry_file()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(value["extensions"].is_object());
    }

    #[test]
    fn test_ensure_layout_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RegistryConfig::new(tmp.path());
        config.ensure_layout().unwrap();

        // An existing store is left untouched.
        std::fs::write(config.registry_file(), r#"{"extensions":{"a":{}}}"#).unwrap();
        config.ensure_layout().unwrap();
        let text = std::fs::read_to_string(config.registry_file()).unwrap();
        assert!(text.contains("\"a\""));
    }
}
