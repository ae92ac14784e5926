//! Extension loading.
//!
//! The loader turns an installed extension directory into a live
//! [`DynExtension`]. The entry point is always declared in the directory's
//! manifest: either a factory the host registered up front, or a native
//! cdylib exporting the SDK's FFI symbols. Failures are reported through
//! return values so discovery and install stay tolerant across many
//! extensions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use webext_sdk::{
    ABI_VERSION, ABI_VERSION_SYMBOL, CREATE_SYMBOL, DynExtension, EntrySpec, Extension,
    ExtensionManifest, MANIFEST_FILE,
};

use crate::error::{RegistryError, Result};

/// Produces a fresh extension instance.
pub type ExtensionFactory = Arc<dyn Fn() -> DynExtension + Send + Sync>;

/// Explicit name-to-factory table for builtin extensions.
///
/// Hosts register factories at startup; manifests reference them by name.
/// This is the non-native loading path and the one tests use.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: RwLock<HashMap<String, ExtensionFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a name. Replaces any previous entry.
    pub fn register(&self, name: impl Into<String>, factory: ExtensionFactory) {
        let name = name.into();
        tracing::debug!(factory = %name, "registered extension factory");
        self.factories.write().insert(name, factory);
    }

    /// Convenience for `Default`-constructible extension types.
    pub fn register_type<E>(&self, name: impl Into<String>)
    where
        E: Extension + Default + 'static,
    {
        self.register(name, Arc::new(|| Arc::new(E::default()) as DynExtension));
    }

    pub fn create(&self, name: &str) -> Option<DynExtension> {
        self.factories.read().get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }
}

/// Loader for native (cdylib) extensions.
///
/// Loaded libraries are kept alive for the process lifetime so no
/// instance ever outlives its code.
struct NativeLoader {
    libraries: Mutex<Vec<libloading::Library>>,
}

impl NativeLoader {
    fn new() -> Self {
        Self {
            libraries: Mutex::new(Vec::new()),
        }
    }

    fn load(&self, path: &Path) -> Result<DynExtension> {
        if !path.exists() {
            return Err(RegistryError::EntryNotFound(path.to_path_buf()));
        }

        let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
            RegistryError::LoadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        let abi_version = unsafe {
            let symbol: libloading::Symbol<unsafe extern "C" fn() -> u32> = library
                .get(ABI_VERSION_SYMBOL)
                .map_err(|e| RegistryError::LoadFailed {
                    path: path.to_path_buf(),
                    reason: format!("missing ABI version symbol: {e}"),
                })?;
            symbol()
        };
        if abi_version != ABI_VERSION {
            return Err(RegistryError::AbiMismatch {
                path: path.to_path_buf(),
                host: ABI_VERSION,
                extension: abi_version,
            });
        }

        let instance: DynExtension = unsafe {
            let create: libloading::Symbol<
                unsafe extern "C" fn() -> *mut Box<dyn Extension>,
            > = library
                .get(CREATE_SYMBOL)
                .map_err(|e| RegistryError::LoadFailed {
                    path: path.to_path_buf(),
                    reason: format!("missing create symbol: {e}"),
                })?;
            let raw = create();
            if raw.is_null() {
                return Err(RegistryError::LoadFailed {
                    path: path.to_path_buf(),
                    reason: "extension create returned null".into(),
                });
            }
            Arc::from(*Box::from_raw(raw))
        };

        self.libraries.lock().push(library);
        Ok(instance)
    }
}

/// A successfully loaded extension: its manifest plus the live instance.
pub struct LoadedExtension {
    pub manifest: ExtensionManifest,
    pub instance: DynExtension,
    /// Directory the extension was loaded from.
    pub path: PathBuf,
}

impl std::fmt::Debug for LoadedExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedExtension")
            .field("name", &self.manifest.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Loads extensions from installed directories.
pub struct ExtensionLoader {
    factories: Arc<FactoryRegistry>,
    native: NativeLoader,
}

impl ExtensionLoader {
    pub fn new(factories: Arc<FactoryRegistry>) -> Self {
        Self {
            factories,
            native: NativeLoader::new(),
        }
    }

    pub fn factories(&self) -> &Arc<FactoryRegistry> {
        &self.factories
    }

    /// Read and parse the manifest of an extension directory.
    pub fn read_manifest(&self, dir: &Path) -> Result<ExtensionManifest> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(RegistryError::EntryNotFound(dir.to_path_buf()));
        }
        let text = std::fs::read_to_string(&manifest_path)?;
        ExtensionManifest::from_json(&text).map_err(|e| RegistryError::LoadFailed {
            path: manifest_path,
            reason: format!("invalid manifest: {e}"),
        })
    }

    /// Load the extension contained in `dir`.
    ///
    /// Never panics and never leaks an error past its return value: the
    /// directory must exist, carry a parsable manifest, and its declared
    /// entry must resolve to an instance whose `name()` matches the
    /// manifest.
    pub fn load_dir(&self, dir: &Path) -> Result<LoadedExtension> {
        if !dir.is_dir() {
            return Err(RegistryError::LoadFailed {
                path: dir.to_path_buf(),
                reason: "directory does not exist".into(),
            });
        }

        let manifest = self.read_manifest(dir)?;
        let instance = match &manifest.entry {
            EntrySpec::Builtin(factory) => self
                .factories
                .create(factory)
                .ok_or_else(|| RegistryError::UnknownFactory(factory.clone()))?,
            EntrySpec::Native(library) => self.native.load(&dir.join(library))?,
        };

        if instance.name() != manifest.name {
            return Err(RegistryError::NameMismatch {
                manifest: manifest.name.clone(),
                instance: instance.name().to_string(),
            });
        }

        tracing::debug!(extension = %manifest.name, path = %dir.display(), "loaded extension");
        Ok(LoadedExtension {
            manifest,
            instance,
            path: dir.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webext_sdk::ExtensionKind;

    #[derive(Default)]
    struct Probe;

    #[async_trait::async_trait]
    impl Extension for Probe {
        fn name(&self) -> &str {
            "probe"
        }
        fn version(&self) -> &str {
            "0.1.0"
        }
        fn kind(&self) -> ExtensionKind {
            ExtensionKind::Tool
        }
    }

    fn write_manifest(dir: &Path, name: &str, factory: &str) {
        let manifest = serde_json::json!({
            "name": name,
            "version": "0.1.0",
            "entry": { "builtin": factory },
        });
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest).unwrap(),
        )
        .unwrap();
    }

    fn loader_with_probe() -> ExtensionLoader {
        let factories = Arc::new(FactoryRegistry::new());
        factories.register_type::<Probe>("probe");
        ExtensionLoader::new(factories)
    }

    #[test]
    fn test_load_builtin() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("probe");
        write_manifest(&dir, "probe", "probe");

        let loaded = loader_with_probe().load_dir(&dir).unwrap();
        assert_eq!(loaded.instance.name(), "probe");
        assert_eq!(loaded.manifest.kind, ExtensionKind::Generic);
        assert_eq!(loaded.path, dir);
    }

    #[test]
    fn test_missing_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = loader_with_probe()
            .load_dir(&tmp.path().join("absent"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::LoadFailed { .. }));
    }

    #[test]
    fn test_missing_manifest_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("empty");
        std::fs::create_dir_all(&dir).unwrap();
        let err = loader_with_probe().load_dir(&dir).unwrap_err();
        assert!(matches!(err, RegistryError::EntryNotFound(_)));
    }

    #[test]
    fn test_unknown_factory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("mystery");
        write_manifest(&dir, "mystery", "nope");
        let err = loader_with_probe().load_dir(&dir).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownFactory(name) if name == "nope"));
    }

    #[test]
    fn test_name_mismatch_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("other");
        write_manifest(&dir, "other", "probe");
        let err = loader_with_probe().load_dir(&dir).unwrap_err();
        assert!(matches!(err, RegistryError::NameMismatch { .. }));
    }

    #[test]
    fn test_invalid_manifest_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("broken");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), "{ not json").unwrap();
        let err = loader_with_probe().load_dir(&dir).unwrap_err();
        assert!(matches!(err, RegistryError::LoadFailed { .. }));
    }
}
