//! Discovery of installed extensions.

use std::path::Path;

use webext_sdk::MANIFEST_FILE;

use crate::config::INSTALLED_DIR;
use crate::loader::{ExtensionLoader, LoadedExtension};

/// Scan the managed root for installable extensions and load each one.
///
/// Candidates are the directories under `<root>/installed/` that carry a
/// manifest. A candidate that fails to load is logged and skipped; it
/// never aborts discovery of the others. Order is deterministic (sorted
/// by directory name).
pub fn discover(root: &Path, loader: &ExtensionLoader) -> Vec<LoadedExtension> {
    let installed = root.join(INSTALLED_DIR);
    let mut candidates: Vec<_> = match std::fs::read_dir(&installed) {
        Ok(entries) => entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir() && path.join(MANIFEST_FILE).is_file())
            .collect(),
        Err(e) => {
            tracing::warn!(dir = %installed.display(), error = %e, "cannot read installed directory");
            return Vec::new();
        }
    };
    candidates.sort();

    let mut discovered = Vec::new();
    for dir in candidates {
        match loader.load_dir(&dir) {
            Ok(loaded) => discovered.push(loaded),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping extension that failed to load");
            }
        }
    }

    tracing::info!(count = discovered.len(), "discovered extensions");
    discovered
}
