//! Named extension points and callback dispatch.
//!
//! The hook registry maps hook names to ordered callback lists. It is an
//! explicitly owned object: the host constructs one and hands it to the
//! extension registry, nothing lives in global state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use webext_sdk::{DEFAULT_HOOK_PRIORITY, HookCallback};

/// How a hook combines its callbacks' results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Every callback receives the same payload; `Ok` results are
    /// gathered into a list.
    #[default]
    Collect,
    /// Each callback's output feeds the next; a failing callback is
    /// skipped and the value passes through unchanged.
    Pipeline,
}

/// Result of dispatching a hook.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// Per-callback results from a collect-mode hook.
    Collected(Vec<Value>),
    /// Final threaded value from a pipeline-mode hook.
    Piped(Value),
}

impl DispatchOutcome {
    /// The threaded value of a pipeline dispatch, if this was one.
    pub fn into_piped(self) -> Option<Value> {
        match self {
            DispatchOutcome::Piped(value) => Some(value),
            DispatchOutcome::Collected(_) => None,
        }
    }

    /// Collapse to a single JSON value for callers that do not care
    /// about the mode (e.g. the HTTP fire-a-hook endpoint).
    pub fn into_value(self) -> Value {
        match self {
            DispatchOutcome::Collected(results) => Value::Array(results),
            DispatchOutcome::Piped(value) => value,
        }
    }
}

struct HookEntry {
    callback: HookCallback,
    owner: String,
    priority: i32,
    seq: u64,
}

struct HookSlot {
    mode: DispatchMode,
    entries: Vec<HookEntry>,
    next_seq: u64,
}

impl HookSlot {
    fn new(mode: DispatchMode) -> Self {
        Self {
            mode,
            entries: Vec::new(),
            next_seq: 0,
        }
    }
}

/// Hooks pre-registered at startup. Configuration, not behavior: the two
/// chat payload hooks thread their value, everything else collects.
pub const BUILTIN_HOOKS: &[(&str, DispatchMode)] = &[
    ("ui_init", DispatchMode::Collect),
    ("api_init", DispatchMode::Collect),
    ("system_init", DispatchMode::Collect),
    ("model_before_generate", DispatchMode::Collect),
    ("model_after_generate", DispatchMode::Collect),
    ("chat_pre_process", DispatchMode::Pipeline),
    ("chat_post_process", DispatchMode::Pipeline),
    ("extension_loaded", DispatchMode::Collect),
    ("extension_unloaded", DispatchMode::Collect),
];

/// Registry of named hooks and their ordered callback lists.
pub struct HookRegistry {
    hooks: RwLock<HashMap<String, HookSlot>>,
}

impl HookRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry with the fixed initial hook set registered.
    pub fn with_builtin_hooks() -> Self {
        let registry = Self::new();
        for (name, mode) in BUILTIN_HOOKS {
            registry.register_hook(name, *mode);
        }
        registry
    }

    /// Register a hook. Idempotent; an existing hook keeps its mode.
    pub fn register_hook(&self, name: &str, mode: DispatchMode) {
        let mut hooks = self.hooks.write();
        if hooks.contains_key(name) {
            tracing::warn!(hook = name, "hook already registered");
            return;
        }
        hooks.insert(name.to_string(), HookSlot::new(mode));
        tracing::debug!(hook = name, ?mode, "registered hook");
    }

    /// Register a callback for a hook.
    ///
    /// Unknown hooks are auto-registered in collect mode. A duplicate of
    /// the identical callback on the same hook is skipped. Returns whether
    /// the callback was added.
    pub fn register_callback(
        &self,
        hook: &str,
        callback: HookCallback,
        owner: impl Into<String>,
        priority: i32,
    ) -> bool {
        let owner = owner.into();
        let mut hooks = self.hooks.write();
        let slot = hooks
            .entry(hook.to_string())
            .or_insert_with(|| HookSlot::new(DispatchMode::Collect));

        if slot
            .entries
            .iter()
            .any(|entry| Arc::ptr_eq(&entry.callback, &callback))
        {
            tracing::warn!(hook, owner, "identical callback already registered");
            return false;
        }

        let seq = slot.next_seq;
        slot.next_seq += 1;
        slot.entries.push(HookEntry {
            callback,
            owner: owner.clone(),
            priority,
            seq,
        });
        // Ascending priority; equal priorities keep registration order.
        slot.entries.sort_by_key(|entry| (entry.priority, entry.seq));

        tracing::debug!(hook, owner, priority, "registered callback");
        true
    }

    /// Register with the default priority.
    pub fn register_callback_default(
        &self,
        hook: &str,
        callback: HookCallback,
        owner: impl Into<String>,
    ) -> bool {
        self.register_callback(hook, callback, owner, DEFAULT_HOOK_PRIORITY)
    }

    /// Remove every callback of `owner` from one hook. Returns whether
    /// any entry was removed.
    pub fn unregister_callback(&self, hook: &str, owner: &str) -> bool {
        let mut hooks = self.hooks.write();
        match hooks.get_mut(hook) {
            Some(slot) => {
                let before = slot.entries.len();
                slot.entries.retain(|entry| entry.owner != owner);
                before != slot.entries.len()
            }
            None => false,
        }
    }

    /// Remove every callback of `owner` across all hooks. Returns the
    /// number of entries removed.
    pub fn unregister_owner(&self, owner: &str) -> usize {
        let mut hooks = self.hooks.write();
        let mut removed = 0;
        for slot in hooks.values_mut() {
            let before = slot.entries.len();
            slot.entries.retain(|entry| entry.owner != owner);
            removed += before - slot.entries.len();
        }
        if removed > 0 {
            tracing::debug!(owner, removed, "unregistered callbacks");
        }
        removed
    }

    /// Dispatch a hook, invoking callbacks in ascending priority order.
    ///
    /// The callback list is snapshotted before dispatch, so concurrent
    /// (un)registration never affects an in-flight dispatch. Callbacks
    /// run one at a time on the caller's task. A callback error is logged
    /// and skipped; it neither aborts the remaining callbacks nor
    /// unregisters the callback.
    pub async fn dispatch(&self, hook: &str, payload: Value) -> DispatchOutcome {
        let (mode, callbacks) = {
            let hooks = self.hooks.read();
            match hooks.get(hook) {
                Some(slot) => (
                    slot.mode,
                    slot.entries
                        .iter()
                        .map(|entry| (entry.callback.clone(), entry.owner.clone()))
                        .collect::<Vec<_>>(),
                ),
                None => {
                    tracing::debug!(hook, "dispatch on unknown hook");
                    return DispatchOutcome::Collected(Vec::new());
                }
            }
        };

        match mode {
            DispatchMode::Collect => {
                let mut results = Vec::with_capacity(callbacks.len());
                for (callback, owner) in callbacks {
                    match callback(payload.clone()).await {
                        Ok(result) => results.push(result),
                        Err(err) => {
                            tracing::error!(hook, owner, error = %err, "hook callback failed");
                        }
                    }
                }
                DispatchOutcome::Collected(results)
            }
            DispatchMode::Pipeline => {
                let mut value = payload;
                for (callback, owner) in callbacks {
                    match callback(value.clone()).await {
                        Ok(result) => value = result,
                        Err(err) => {
                            tracing::error!(hook, owner, error = %err, "hook callback failed");
                        }
                    }
                }
                DispatchOutcome::Piped(value)
            }
        }
    }

    /// Names of all registered hooks.
    pub fn hook_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.hooks.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Dispatch mode of a hook, if registered.
    pub fn mode(&self, hook: &str) -> Option<DispatchMode> {
        self.hooks.read().get(hook).map(|slot| slot.mode)
    }

    /// Number of callbacks registered for a hook.
    pub fn callback_count(&self, hook: &str) -> usize {
        self.hooks
            .read()
            .get(hook)
            .map(|slot| slot.entries.len())
            .unwrap_or(0)
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::with_builtin_hooks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use webext_sdk::hook_fn;

    #[test]
    fn test_builtin_hooks_present() {
        let registry = HookRegistry::with_builtin_hooks();
        let names = registry.hook_names();
        assert!(names.iter().any(|n| n == "ui_init"));
        assert_eq!(registry.mode("chat_pre_process"), Some(DispatchMode::Pipeline));
        assert_eq!(registry.mode("ui_init"), Some(DispatchMode::Collect));
    }

    #[test]
    fn test_register_hook_idempotent_keeps_mode() {
        let registry = HookRegistry::new();
        registry.register_hook("custom", DispatchMode::Pipeline);
        registry.register_hook("custom", DispatchMode::Collect);
        assert_eq!(registry.mode("custom"), Some(DispatchMode::Pipeline));
    }

    #[test]
    fn test_duplicate_callback_skipped() {
        let registry = HookRegistry::new();
        let cb = hook_fn(|v| async move { Ok(v) });
        assert!(registry.register_callback("h", cb.clone(), "a", 10));
        assert!(!registry.register_callback("h", cb, "a", 10));
        assert_eq!(registry.callback_count("h"), 1);
    }

    #[tokio::test]
    async fn test_priority_order_with_stable_ties() {
        let order = Arc::new(Mutex::new(Vec::new()));

        let registry = HookRegistry::new();
        for (label, priority) in [("late", 20), ("first", 5), ("second", 5), ("mid", 10)] {
            let order = order.clone();
            registry.register_callback(
                "a",
                hook_fn(move |v| {
                    let order = order.clone();
                    async move {
                        order.lock().unwrap().push(label);
                        Ok(v)
                    }
                }),
                label,
                priority,
            );
        }

        registry.dispatch("a", json!(null)).await;
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "mid", "late"]);
    }

    #[tokio::test]
    async fn test_lower_priority_runs_first_regardless_of_registration() {
        let order = Arc::new(Mutex::new(Vec::new()));

        let registry = HookRegistry::new();
        for (label, priority) in [("five", 5), ("one", 1)] {
            let order = order.clone();
            registry.register_callback(
                "h",
                hook_fn(move |v| {
                    let order = order.clone();
                    async move {
                        order.lock().unwrap().push(label);
                        Ok(v)
                    }
                }),
                label,
                priority,
            );
        }

        registry.dispatch("h", json!(null)).await;
        assert_eq!(*order.lock().unwrap(), vec!["one", "five"]);
    }

    #[tokio::test]
    async fn test_failing_callback_does_not_stop_dispatch() {
        let registry = HookRegistry::new();
        registry.register_callback(
            "h",
            hook_fn(|_| async { Err(webext_sdk::ExtensionError::other("boom")) }),
            "bad",
            1,
        );
        registry.register_callback("h", hook_fn(|_| async { Ok(json!("ok")) }), "good", 2);

        let outcome = registry.dispatch("h", json!(null)).await;
        match outcome {
            DispatchOutcome::Collected(results) => assert_eq!(results, vec![json!("ok")]),
            _ => panic!("expected collect outcome"),
        }

        // The failing callback stays registered and is retried next dispatch.
        assert_eq!(registry.callback_count("h"), 2);
    }

    #[tokio::test]
    async fn test_pipeline_threads_values_and_skips_failures() {
        let registry = HookRegistry::new();
        registry.register_hook("pipe", DispatchMode::Pipeline);
        registry.register_callback(
            "pipe",
            hook_fn(|v| async move { Ok(json!(format!("{}+a", v.as_str().unwrap()))) }),
            "a",
            1,
        );
        registry.register_callback(
            "pipe",
            hook_fn(|_| async { Err(webext_sdk::ExtensionError::other("skip me")) }),
            "b",
            2,
        );
        registry.register_callback(
            "pipe",
            hook_fn(|v| async move { Ok(json!(format!("{}+c", v.as_str().unwrap()))) }),
            "c",
            3,
        );

        let outcome = registry.dispatch("pipe", json!("x")).await;
        assert_eq!(outcome.into_piped(), Some(json!("x+a+c")));
    }

    #[tokio::test]
    async fn test_unregister_owner() {
        let registry = HookRegistry::new();
        registry.register_callback("h1", hook_fn(|v| async move { Ok(v) }), "ext", 10);
        registry.register_callback("h2", hook_fn(|v| async move { Ok(v) }), "ext", 10);
        registry.register_callback("h2", hook_fn(|v| async move { Ok(v) }), "other", 10);

        assert_eq!(registry.unregister_owner("ext"), 2);
        assert_eq!(registry.callback_count("h1"), 0);
        assert_eq!(registry.callback_count("h2"), 1);
        assert!(!registry.unregister_callback("h1", "ext"));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_hook_is_empty() {
        let registry = HookRegistry::new();
        match registry.dispatch("nope", json!(1)).await {
            DispatchOutcome::Collected(results) => assert!(results.is_empty()),
            _ => panic!("expected empty collect outcome"),
        }
    }
}
