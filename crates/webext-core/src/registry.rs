//! The extension registry.
//!
//! `ExtensionRegistry` owns everything the host needs to manage
//! extensions: the managed root directory, the hook registry, the loader,
//! and the descriptor/instance tables. All public operations fold the
//! error taxonomy into plain result types at the boundary; callers never
//! see internal error variants.
//!
//! State is guarded by a single `tokio::sync::Mutex` held for the full
//! duration of each operation, so every read-modify-persist sequence is
//! atomic with respect to concurrent API calls. The persisted store is
//! rewritten wholesale after each mutation; a store-write failure is
//! logged and the in-memory state stays authoritative.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use webext_sdk::{DynExtension, ExtensionKind, RouteSpec, SettingValue};

use crate::config::{RegistryConfig, extension_dir};
use crate::descriptor::ExtensionDescriptor;
use crate::discovery;
use crate::error::{RegistryError, Result};
use crate::hooks::{DispatchOutcome, HookRegistry};
use crate::installer;
use crate::loader::{ExtensionLoader, FactoryRegistry};

/// Outcome of a registry operation, ready for the API boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Outcome of an install operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallResult {
    pub success: bool,
    /// Declared name of the installed extension, when known.
    pub name: Option<String>,
    pub message: String,
}

/// On-disk shape of `registry.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    extensions: HashMap<String, ExtensionDescriptor>,
}

#[derive(Default)]
struct RegistryState {
    descriptors: HashMap<String, ExtensionDescriptor>,
    instances: HashMap<String, DynExtension>,
}

/// Central manager for discovery, install, lifecycle and settings.
pub struct ExtensionRegistry {
    config: RegistryConfig,
    hooks: Arc<HookRegistry>,
    loader: ExtensionLoader,
    state: Mutex<RegistryState>,
}

impl ExtensionRegistry {
    /// Create a registry over `config.root` with an empty factory table.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        Self::with_factories(config, Arc::new(FactoryRegistry::new()))
    }

    /// Create a registry with a pre-populated builtin factory table.
    ///
    /// The root layout is created if missing and the persisted store is
    /// read eagerly; an unreadable store is treated as empty.
    pub fn with_factories(config: RegistryConfig, factories: Arc<FactoryRegistry>) -> Result<Self> {
        config.ensure_layout()?;

        let descriptors = match read_store(&config.registry_file()) {
            Ok(extensions) => extensions,
            Err(err) => {
                tracing::warn!(
                    path = %config.registry_file().display(),
                    error = %err,
                    "could not read persisted store, starting empty"
                );
                HashMap::new()
            }
        };
        tracing::info!(
            root = %config.root.display(),
            known = descriptors.len(),
            "extension registry ready"
        );

        Ok(Self {
            config,
            hooks: Arc::new(HookRegistry::with_builtin_hooks()),
            loader: ExtensionLoader::new(factories),
            state: Mutex::new(RegistryState {
                descriptors,
                instances: HashMap::new(),
            }),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The shared hook registry.
    pub fn hooks(&self) -> Arc<HookRegistry> {
        self.hooks.clone()
    }

    /// The builtin factory table of the loader.
    pub fn factories(&self) -> Arc<FactoryRegistry> {
        self.loader.factories().clone()
    }

    /// Fire a hook through the shared hook registry.
    pub async fn dispatch_hook(&self, hook: &str, payload: Value) -> DispatchOutcome {
        self.hooks.dispatch(hook, payload).await
    }

    // ------------------------------------------------------------------
    // Discovery and queries

    /// Scan `installed/` and reconcile the descriptor table with what is
    /// on disk. Fresh metadata wins; persisted `active`, `settings` and
    /// `install_date` survive. Returns the resulting table.
    pub async fn discover(&self) -> HashMap<String, ExtensionDescriptor> {
        let mut state = self.state.lock().await;
        self.discover_locked(&mut state);
        self.persist(&state);
        state.descriptors.clone()
    }

    /// All known descriptors, discovering first if the table is empty.
    pub async fn list(&self) -> Vec<ExtensionDescriptor> {
        let mut state = self.state.lock().await;
        if state.descriptors.is_empty() {
            self.discover_locked(&mut state);
            self.persist(&state);
        }
        let mut all: Vec<ExtensionDescriptor> = state.descriptors.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// One descriptor by name, discovering first if the table is empty.
    pub async fn get(&self, name: &str) -> Option<ExtensionDescriptor> {
        let mut state = self.state.lock().await;
        if state.descriptors.is_empty() {
            self.discover_locked(&mut state);
            self.persist(&state);
        }
        state.descriptors.get(name).cloned()
    }

    fn discover_locked(&self, state: &mut RegistryState) {
        for loaded in discovery::discover(&self.config.root, &self.loader) {
            let name = loaded.manifest.name.clone();
            let mut descriptor =
                ExtensionDescriptor::from_instance(loaded.instance.as_ref(), Some(loaded.path));
            if let Some(previous) = state.descriptors.get(&name) {
                descriptor.merge_persisted(previous);
            }
            // Keep an already-live instance over the freshly loaded one.
            state.instances.entry(name.clone()).or_insert(loaded.instance);
            state.descriptors.insert(name, descriptor);
        }
    }

    // ------------------------------------------------------------------
    // Install / uninstall

    /// Install an extension from a URL, a directory, or a zip file.
    ///
    /// A same-name extension is replaced wholesale; the new copy starts
    /// inactive regardless of the previous state.
    pub async fn install(&self, source: &str) -> InstallResult {
        let mut state = self.state.lock().await;

        let installed = self.materialize(source).await;
        let install_dir = match installed {
            Ok(dir) => dir,
            Err(err) => {
                tracing::error!(source, error = %err, "install failed");
                return InstallResult {
                    success: false,
                    name: None,
                    message: err.to_string(),
                };
            }
        };

        let loaded = match self.loader.load_dir(&install_dir) {
            Ok(loaded) => loaded,
            Err(err) => {
                return InstallResult {
                    success: false,
                    name: None,
                    message: format!("installed copy failed to load: {err}"),
                };
            }
        };

        let name = loaded.manifest.name.clone();
        let mut descriptor =
            ExtensionDescriptor::from_instance(loaded.instance.as_ref(), Some(loaded.path));
        if let Some(previous) = state.descriptors.get(&name) {
            descriptor.merge_persisted(previous);
            descriptor.mark_updated();
        }
        descriptor.active = false;
        descriptor.last_error = None;

        // Replacing an active extension drops its running incarnation.
        if state.instances.contains_key(&name) {
            self.hooks.unregister_owner(&name);
        }
        state.instances.insert(name.clone(), loaded.instance);
        state.descriptors.insert(name.clone(), descriptor);
        self.persist(&state);

        tracing::info!(extension = %name, "installed");
        InstallResult {
            success: true,
            name: Some(name.clone()),
            message: format!("extension {name} installed"),
        }
    }

    async fn materialize(&self, source: &str) -> Result<PathBuf> {
        let root = &self.config.root;
        if source.starts_with("http://") || source.starts_with("https://") {
            return installer::install_from_url(source, root, &self.loader).await;
        }

        let path = Path::new(source);
        if path.is_dir() {
            installer::install_from_directory(path, root, &self.loader)
        } else if path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
        {
            installer::install_from_zip(path, root, &self.loader)
        } else {
            Err(RegistryError::InvalidSource(source.to_string()))
        }
    }

    /// Remove an extension entirely: disable if active, run its
    /// `uninstall` callback best-effort, delete its directory, and drop
    /// its descriptor. Unknown names fail without side effects.
    pub async fn uninstall(&self, name: &str) -> OperationResult {
        let mut state = self.state.lock().await;
        if !state.descriptors.contains_key(name) {
            return OperationResult::fail(format!("extension {name} is not installed"));
        }

        // Hold the instance now; disabling drops it from the table.
        let instance = state.instances.get(name).cloned();

        if state
            .descriptors
            .get(name)
            .is_some_and(|descriptor| descriptor.active)
        {
            if let Err(err) = self.disable_locked(&mut state, name).await {
                self.persist(&state);
                return OperationResult::fail(format!("cannot uninstall {name}: {err}"));
            }
        }

        let install_dir = state
            .descriptors
            .get(name)
            .and_then(|descriptor| descriptor.install_path.clone())
            .unwrap_or_else(|| extension_dir(&self.config.root, name));

        // Best-effort cleanup callback before the files go. An extension
        // never loaded in this process is loaded just for the callback.
        let instance = match instance {
            Some(instance) => Some(instance),
            None => self.loader.load_dir(&install_dir).ok().map(|loaded| loaded.instance),
        };
        if let Some(instance) = instance {
            if let Err(err) = instance.uninstall().await {
                tracing::warn!(extension = %name, error = %err, "uninstall callback failed");
            }
        }

        if install_dir.exists() {
            if let Err(err) = std::fs::remove_dir_all(&install_dir) {
                return OperationResult::fail(format!(
                    "failed to remove {}: {err}",
                    install_dir.display()
                ));
            }
        }

        state.instances.remove(name);
        state.descriptors.remove(name);
        self.persist(&state);

        tracing::info!(extension = %name, "uninstalled");
        OperationResult::ok(format!("extension {name} uninstalled"))
    }

    // ------------------------------------------------------------------
    // Enable / disable

    /// Enable an extension, enabling its inactive dependencies first.
    ///
    /// A failure anywhere in the chain is recorded on the requested
    /// extension's `last_error` and leaves it inactive.
    pub async fn enable(&self, name: &str) -> OperationResult {
        let mut state = self.state.lock().await;
        if !state.descriptors.contains_key(name) {
            return OperationResult::fail(format!("extension {name} is not installed"));
        }
        if state
            .descriptors
            .get(name)
            .is_some_and(|descriptor| descriptor.active)
        {
            return OperationResult::ok(format!("extension {name} is already enabled"));
        }

        match self.enable_locked(&mut state, name).await {
            Ok(()) => {
                self.persist(&state);
                OperationResult::ok(format!("extension {name} enabled"))
            }
            Err(err) => {
                let message = err.to_string();
                if let Some(descriptor) = state.descriptors.get_mut(name) {
                    descriptor.last_error = Some(message.clone());
                }
                self.persist(&state);
                tracing::error!(extension = %name, error = %message, "enable failed");
                OperationResult::fail(message)
            }
        }
    }

    async fn enable_locked(&self, state: &mut RegistryState, name: &str) -> Result<()> {
        for target in resolve_enable_order(state, name)? {
            let result = self.activate_one(state, &target).await;
            if let Err(err) = result {
                // Attribute dependency failures to the dependency by name.
                if target != name {
                    return Err(RegistryError::DependencyFailed {
                        name: target,
                        reason: err.to_string(),
                    });
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Bring a single extension up. Dependencies are assumed active.
    async fn activate_one(&self, state: &mut RegistryState, name: &str) -> Result<()> {
        if state
            .descriptors
            .get(name)
            .is_some_and(|descriptor| descriptor.active)
        {
            return Ok(());
        }

        let instance = match state.instances.get(name) {
            Some(instance) => instance.clone(),
            None => {
                let dir = state
                    .descriptors
                    .get(name)
                    .and_then(|descriptor| descriptor.install_path.clone())
                    .unwrap_or_else(|| extension_dir(&self.config.root, name));
                let loaded = self.loader.load_dir(&dir)?;
                state
                    .instances
                    .insert(name.to_string(), loaded.instance.clone());
                loaded.instance
            }
        };

        instance
            .initialize(&json!({}))
            .await
            .map_err(|err| RegistryError::LifecycleFailed {
                name: name.to_string(),
                stage: "initialize",
                reason: err.to_string(),
            })?;

        for subscription in instance.hook_subscriptions() {
            self.hooks.register_callback(
                &subscription.hook,
                subscription.callback,
                name,
                subscription.priority,
            );
        }

        if let Err(err) = instance.activate().await {
            // Roll back the hook registrations of the failed activation.
            self.hooks.unregister_owner(name);
            return Err(RegistryError::LifecycleFailed {
                name: name.to_string(),
                stage: "activate",
                reason: err.to_string(),
            });
        }

        if let Some(descriptor) = state.descriptors.get_mut(name) {
            descriptor.active = true;
            descriptor.last_error = None;
            descriptor.mark_updated();
        }

        self.hooks
            .dispatch("extension_loaded", json!({ "name": name }))
            .await;
        tracing::info!(extension = %name, "enabled");
        Ok(())
    }

    /// Disable an extension.
    ///
    /// Refused while another active extension depends on it. The
    /// `deactivate` callback is best-effort: its failure is logged and
    /// recorded but never blocks the transition.
    pub async fn disable(&self, name: &str) -> OperationResult {
        let mut state = self.state.lock().await;
        if !state.descriptors.contains_key(name) {
            return OperationResult::fail(format!("extension {name} is not installed"));
        }
        if !state
            .descriptors
            .get(name)
            .is_some_and(|descriptor| descriptor.active)
        {
            return OperationResult::ok(format!("extension {name} is already disabled"));
        }

        match self.disable_locked(&mut state, name).await {
            Ok(()) => {
                self.persist(&state);
                OperationResult::ok(format!("extension {name} disabled"))
            }
            Err(err) => OperationResult::fail(err.to_string()),
        }
    }

    async fn disable_locked(&self, state: &mut RegistryState, name: &str) -> Result<()> {
        let dependent = state
            .descriptors
            .values()
            .filter(|descriptor| descriptor.active && descriptor.name != name)
            .find(|descriptor| descriptor.dependencies.iter().any(|dep| dep == name));
        if let Some(dependent) = dependent {
            return Err(RegistryError::Conflict {
                name: name.to_string(),
                dependent: dependent.name.clone(),
            });
        }

        if let Some(instance) = state.instances.get(name).cloned() {
            if let Err(err) = instance.deactivate().await {
                tracing::warn!(extension = %name, error = %err, "deactivate callback failed");
                if let Some(descriptor) = state.descriptors.get_mut(name) {
                    descriptor.last_error = Some(format!("deactivate failed: {err}"));
                }
            }
        }

        self.hooks.unregister_owner(name);
        self.hooks
            .dispatch("extension_unloaded", json!({ "name": name }))
            .await;
        state.instances.remove(name);

        if let Some(descriptor) = state.descriptors.get_mut(name) {
            descriptor.active = false;
            descriptor.mark_updated();
        }
        tracing::info!(extension = %name, "disabled");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Settings

    /// Set current values for the named extension's settings.
    ///
    /// Unknown keys are ignored with a warning. Values are mirrored onto
    /// the live instance when one exists.
    pub async fn update_settings(
        &self,
        name: &str,
        values: &HashMap<String, SettingValue>,
    ) -> OperationResult {
        let mut state = self.state.lock().await;
        let Some(descriptor) = state.descriptors.get_mut(name) else {
            return OperationResult::fail(format!("extension {name} is not installed"));
        };

        let mut applied: Vec<String> = Vec::new();
        for (key, value) in values {
            match descriptor.settings.get_mut(key) {
                Some(entry) => {
                    entry.value = value.clone();
                    applied.push(key.clone());
                }
                None => {
                    tracing::warn!(extension = %name, setting = %key, "unknown setting ignored");
                }
            }
        }
        descriptor.mark_updated();

        if let Some(instance) = state.instances.get(name) {
            for key in &applied {
                if let Some(value) = values.get(key) {
                    instance.apply_setting(key, value);
                }
            }
        }

        let count = applied.len();
        self.persist(&state);
        OperationResult::ok(format!("updated {count} settings for {name}"))
    }

    // ------------------------------------------------------------------
    // Startup restore

    /// Discover if needed, then bring every persisted-active extension
    /// back up. Returns per-extension outcomes.
    pub async fn initialize_all(&self) -> HashMap<String, (bool, String)> {
        let mut state = self.state.lock().await;
        if state.descriptors.is_empty() {
            self.discover_locked(&mut state);
        }

        let mut targets: Vec<String> = state
            .descriptors
            .values()
            .filter(|descriptor| descriptor.active)
            .map(|descriptor| descriptor.name.clone())
            .collect();
        targets.sort();
        // Persisted `active` records intent; nothing is running yet.
        for name in &targets {
            if let Some(descriptor) = state.descriptors.get_mut(name) {
                descriptor.active = false;
            }
        }

        let mut results = HashMap::new();
        for name in targets {
            match self.enable_locked(&mut state, &name).await {
                Ok(()) => {
                    results.insert(name, (true, "enabled".to_string()));
                }
                Err(err) => {
                    let message = err.to_string();
                    if let Some(descriptor) = state.descriptors.get_mut(&name) {
                        descriptor.last_error = Some(message.clone());
                    }
                    tracing::error!(extension = %name, error = %message, "startup enable failed");
                    results.insert(name, (false, message));
                }
            }
        }

        self.persist(&state);
        tracing::info!(restored = results.values().filter(|(ok, _)| *ok).count(), "startup restore complete");
        results
    }

    // ------------------------------------------------------------------
    // Rendering and capability queries

    /// Render every component the active UI and theme extensions mount at
    /// `mount_point`, concatenated. Extensions render in name order;
    /// within one extension, declaration order.
    pub async fn render_mount_point(&self, mount_point: &str) -> String {
        let state = self.state.lock().await;
        let mut owners: Vec<&String> = state
            .descriptors
            .values()
            .filter(|descriptor| {
                descriptor.active
                    && matches!(descriptor.kind, ExtensionKind::Ui | ExtensionKind::Theme)
            })
            .map(|descriptor| &descriptor.name)
            .collect();
        owners.sort();

        let mut output = String::new();
        for owner in owners {
            let Some(instance) = state.instances.get(owner) else {
                continue;
            };
            let components = instance.components();
            let mounts = instance.mount_points();
            let Some(names) = mounts.get(mount_point) else {
                continue;
            };
            for component_name in names {
                match components.get(component_name) {
                    Some(renderer) => output.push_str(&renderer()),
                    None => {
                        tracing::warn!(
                            extension = %owner,
                            component = %component_name,
                            "mounted component has no renderer"
                        );
                    }
                }
            }
        }
        output
    }

    /// Component names per active extension.
    pub async fn component_table(&self) -> HashMap<String, Vec<String>> {
        self.capability_names(|instance| instance.components().into_keys().collect())
            .await
    }

    /// Tool names per active extension.
    pub async fn tool_table(&self) -> HashMap<String, Vec<String>> {
        self.capability_names(|instance| instance.tools().into_keys().collect())
            .await
    }

    async fn capability_names(
        &self,
        extract: impl Fn(&DynExtension) -> Vec<String>,
    ) -> HashMap<String, Vec<String>> {
        let state = self.state.lock().await;
        let mut table = HashMap::new();
        for descriptor in state.descriptors.values().filter(|d| d.active) {
            if let Some(instance) = state.instances.get(&descriptor.name) {
                let mut names = extract(instance);
                if !names.is_empty() {
                    names.sort();
                    table.insert(descriptor.name.clone(), names);
                }
            }
        }
        table
    }

    /// Invoke a named tool of an active extension.
    pub async fn call_tool(&self, name: &str, tool: &str, arguments: Value) -> Result<Value> {
        let handler = {
            let state = self.state.lock().await;
            if !state
                .descriptors
                .get(name)
                .is_some_and(|descriptor| descriptor.active)
            {
                return Err(RegistryError::NotFound(name.to_string()));
            }
            let instance = state
                .instances
                .get(name)
                .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
            instance
                .tools()
                .remove(tool)
                .ok_or_else(|| RegistryError::NotFound(format!("{name}/{tool}")))?
        };
        Ok(handler(arguments).await?)
    }

    /// Routes declared by active extensions, keyed by owner.
    pub async fn route_table(&self) -> Vec<(String, RouteSpec)> {
        let state = self.state.lock().await;
        let mut routes = Vec::new();
        for descriptor in state.descriptors.values().filter(|d| d.active) {
            if let Some(instance) = state.instances.get(&descriptor.name) {
                for route in instance.routes() {
                    routes.push((descriptor.name.clone(), route));
                }
            }
        }
        routes.sort_by(|a, b| (&a.0, &a.1.path).cmp(&(&b.0, &b.1.path)));
        routes
    }

    /// CSS provided by active extensions, keyed by `<owner>/<sheet>`.
    pub async fn style_sheets(&self) -> HashMap<String, String> {
        let state = self.state.lock().await;
        let mut sheets = HashMap::new();
        for descriptor in state.descriptors.values().filter(|d| d.active) {
            if let Some(instance) = state.instances.get(&descriptor.name) {
                for (sheet, css) in instance.styles() {
                    sheets.insert(format!("{}/{sheet}", descriptor.name), css);
                }
            }
        }
        sheets
    }

    // ------------------------------------------------------------------
    // Persistence

    fn persist(&self, state: &RegistryState) {
        let store = StoreFile {
            extensions: state.descriptors.clone(),
        };
        let path = self.config.registry_file();
        let result = serde_json::to_string_pretty(&store)
            .map_err(std::io::Error::other)
            .and_then(|text| std::fs::write(&path, text));
        if let Err(err) = result {
            tracing::error!(path = %path.display(), error = %err, "failed to persist registry store");
        }
    }
}

fn read_store(path: &Path) -> Result<HashMap<String, ExtensionDescriptor>> {
    let text = std::fs::read_to_string(path)?;
    let store: StoreFile = serde_json::from_str(&text)?;
    Ok(store.extensions)
}

/// Resolve the order in which `root` and its inactive dependencies must
/// be enabled, dependencies first. Iterative post-order DFS; a back edge
/// is a dependency cycle.
fn resolve_enable_order(state: &RegistryState, root: &str) -> Result<Vec<String>> {
    let mut order: Vec<String> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut visiting: HashSet<String> = HashSet::new();
    // (name, children already expanded)
    let mut stack: Vec<(String, bool)> = vec![(root.to_string(), false)];

    while let Some((name, expanded)) = stack.pop() {
        if expanded {
            visiting.remove(&name);
            visited.insert(name.clone());
            order.push(name);
            continue;
        }
        if visited.contains(&name) {
            continue;
        }
        if !visiting.insert(name.clone()) {
            return Err(RegistryError::CycleDetected(name));
        }

        let descriptor = state
            .descriptors
            .get(&name)
            .ok_or_else(|| RegistryError::MissingDependency(name.clone()))?;
        stack.push((name, true));

        for dep in descriptor.dependencies.iter().rev() {
            if visited.contains(dep) {
                continue;
            }
            if state
                .descriptors
                .get(dep)
                .is_some_and(|descriptor| descriptor.active)
            {
                continue;
            }
            if visiting.contains(dep) {
                return Err(RegistryError::CycleDetected(dep.clone()));
            }
            stack.push((dep.clone(), false));
        }
    }

    Ok(order)
}
