//! Materializing extensions into the managed root.
//!
//! Three source forms are supported: a local directory, a local zip
//! archive, and a remote URL pointing at a zip. All three land the
//! extension at `<root>/installed/<name>`, replacing any previous copy of
//! the same name wholesale. Scratch space lives under `<root>/temp/` and
//! is removed on every exit path.

use std::path::{Path, PathBuf};

use webext_sdk::MANIFEST_FILE;

use crate::config::{TEMP_DIR, extension_dir};
use crate::error::{RegistryError, Result};
use crate::loader::ExtensionLoader;

/// Locate the manifest-bearing subtree inside an arbitrary source
/// directory. Handles archives whose content is nested one level down.
pub fn find_extension_dir(base: &Path) -> Option<PathBuf> {
    if base.join(MANIFEST_FILE).is_file() {
        return Some(base.to_path_buf());
    }

    let subdirs: Vec<PathBuf> = std::fs::read_dir(base)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && !path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'))
        })
        .collect();

    subdirs
        .into_iter()
        .find(|dir| dir.join(MANIFEST_FILE).is_file())
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Install an extension from a local directory.
///
/// Loads the source tree first to learn the extension's declared name,
/// then copies it to `<root>/installed/<name>`. An existing directory of
/// that name is removed first so no stale files survive a reinstall.
pub fn install_from_directory(
    source: &Path,
    root: &Path,
    loader: &ExtensionLoader,
) -> Result<PathBuf> {
    let ext_dir = find_extension_dir(source)
        .ok_or_else(|| RegistryError::EntryNotFound(source.to_path_buf()))?;

    let loaded = loader.load_dir(&ext_dir)?;
    let name = loaded.manifest.name.clone();

    let install_dir = extension_dir(root, &name);
    if install_dir.exists() {
        tracing::warn!(extension = %name, "replacing existing installed copy");
        std::fs::remove_dir_all(&install_dir)?;
    }
    copy_dir_recursive(&ext_dir, &install_dir)?;

    tracing::info!(extension = %name, path = %install_dir.display(), "installed from directory");
    Ok(install_dir)
}

/// Install an extension from a zip archive.
///
/// Extracts into a scratch directory under `<root>/temp/`, then delegates
/// to [`install_from_directory`]. The scratch directory is removed on all
/// exit paths.
pub fn install_from_zip(archive: &Path, root: &Path, loader: &ExtensionLoader) -> Result<PathBuf> {
    let stem = archive
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("archive");
    let scratch = root.join(TEMP_DIR).join(format!("extract_{stem}"));
    if scratch.exists() {
        std::fs::remove_dir_all(&scratch)?;
    }
    std::fs::create_dir_all(&scratch)?;

    let _cleanup = scopeguard::guard(scratch.clone(), |dir| {
        let _ = std::fs::remove_dir_all(dir);
    });

    extract_zip(archive, &scratch)?;
    install_from_directory(&scratch, root, loader)
}

fn extract_zip(archive: &Path, target: &Path) -> Result<()> {
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        // Reject entries escaping the target directory.
        let Some(relative) = entry.enclosed_name() else {
            return Err(RegistryError::InstallFailed(format!(
                "archive entry {:?} has an unsafe path",
                entry.name()
            )));
        };
        let out_path = target.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out)?;
        }
    }
    Ok(())
}

/// Install an extension from a remote URL (zip download).
///
/// Downloads to a scratch file under `<root>/temp/`, validates it is a
/// zip, then delegates to [`install_from_zip`]. The scratch file is
/// removed on all exit paths.
pub async fn install_from_url(
    url: &str,
    root: &Path,
    loader: &ExtensionLoader,
) -> Result<PathBuf> {
    let basename = url
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("download");
    let scratch = root.join(TEMP_DIR).join(format!("download_{basename}"));
    if let Some(parent) = scratch.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let response = reqwest::get(url).await?.error_for_status()?;
    let bytes = response.bytes().await?;
    std::fs::write(&scratch, &bytes)?;

    let _cleanup = scopeguard::guard(scratch.clone(), |file| {
        let _ = std::fs::remove_file(file);
    });

    // Zip magic: "PK".
    if !bytes.starts_with(b"PK") {
        return Err(RegistryError::InvalidSource(format!(
            "{url} is not a zip archive"
        )));
    }

    install_from_zip(&scratch, root, loader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::loader::FactoryRegistry;
    use std::sync::Arc;
    use webext_sdk::Extension;

    #[derive(Default)]
    struct Packaged;

    #[async_trait::async_trait]
    impl Extension for Packaged {
        fn name(&self) -> &str {
            "packaged"
        }
        fn version(&self) -> &str {
            "0.1.0"
        }
    }

    fn loader() -> ExtensionLoader {
        let factories = Arc::new(FactoryRegistry::new());
        factories.register_type::<Packaged>("packaged");
        ExtensionLoader::new(factories)
    }

    fn write_source(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        let manifest = serde_json::json!({
            "name": "packaged",
            "version": "0.1.0",
            "entry": { "builtin": "packaged" },
        });
        std::fs::write(dir.join(MANIFEST_FILE), manifest.to_string()).unwrap();
        std::fs::write(dir.join("asset.css"), "body {}").unwrap();
    }

    #[test]
    fn test_find_extension_dir_nested() {
        let tmp = tempfile::tempdir().unwrap();
        write_source(&tmp.path().join("inner"));
        let found = find_extension_dir(tmp.path()).unwrap();
        assert!(found.ends_with("inner"));
    }

    #[test]
    fn test_install_from_directory_replaces_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RegistryConfig::new(tmp.path().join("root"));
        config.ensure_layout().unwrap();
        let loader = loader();

        let source = tmp.path().join("src");
        write_source(&source);

        let installed = install_from_directory(&source, &config.root, &loader).unwrap();
        assert!(installed.join(MANIFEST_FILE).is_file());
        assert!(installed.join("asset.css").is_file());

        // Leave a stale file behind, reinstall, and confirm it is gone.
        std::fs::write(installed.join("stale.txt"), "old").unwrap();
        let reinstalled = install_from_directory(&source, &config.root, &loader).unwrap();
        assert_eq!(reinstalled, installed);
        assert!(!reinstalled.join("stale.txt").exists());
        assert!(reinstalled.join("asset.css").is_file());
    }

    #[test]
    fn test_install_from_zip_cleans_scratch() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RegistryConfig::new(tmp.path().join("root"));
        config.ensure_layout().unwrap();
        let loader = loader();

        // Build a zip with the extension nested one level down.
        let archive_path = tmp.path().join("packaged.zip");
        let file = std::fs::File::create(&archive_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        let manifest = serde_json::json!({
            "name": "packaged",
            "version": "0.1.0",
            "entry": { "builtin": "packaged" },
        });
        zip.add_directory("packaged/", options).unwrap();
        zip.start_file("packaged/manifest.json", options).unwrap();
        use std::io::Write;
        zip.write_all(manifest.to_string().as_bytes()).unwrap();
        zip.finish().unwrap();

        let installed = install_from_zip(&archive_path, &config.root, &loader).unwrap();
        assert!(installed.join(MANIFEST_FILE).is_file());

        // Scratch space is gone.
        let leftovers: Vec<_> = std::fs::read_dir(config.temp_dir())
            .unwrap()
            .flatten()
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_install_from_missing_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RegistryConfig::new(tmp.path().join("root"));
        config.ensure_layout().unwrap();
        let err =
            install_from_directory(&tmp.path().join("absent"), &config.root, &loader()).unwrap_err();
        assert!(matches!(err, RegistryError::EntryNotFound(_)));
    }

    #[test]
    fn test_corrupt_zip_fails_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RegistryConfig::new(tmp.path().join("root"));
        config.ensure_layout().unwrap();

        let archive_path = tmp.path().join("bad.zip");
        std::fs::write(&archive_path, b"not a zip").unwrap();

        let err = install_from_zip(&archive_path, &config.root, &loader()).unwrap_err();
        assert!(matches!(err, RegistryError::Archive(_)));

        let leftovers: Vec<_> = std::fs::read_dir(config.temp_dir())
            .unwrap()
            .flatten()
            .collect();
        assert!(leftovers.is_empty());
    }
}
