//! Core types shared between the host and extensions.
//!
//! Everything here is plain structured data: the host asks an extension
//! for its settings, hook subscriptions, components and tools through
//! ordinary method calls returning these types. There is no attribute or
//! reflection machinery anywhere.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExtensionError;

/// Capability kind of an extension.
///
/// The kind determines which capability accessors on [`crate::Extension`]
/// are meaningful (components for `Ui`, tools for `Tool`, and so on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    #[default]
    Generic,
    Ui,
    Api,
    Model,
    Tool,
    Theme,
}

impl ExtensionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionKind::Generic => "generic",
            ExtensionKind::Ui => "ui",
            ExtensionKind::Api => "api",
            ExtensionKind::Model => "model",
            ExtensionKind::Tool => "tool",
            ExtensionKind::Theme => "theme",
        }
    }
}

impl std::fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primitive type of a setting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    Bool,
    Integer,
    Float,
    String,
}

/// A setting value.
///
/// Untagged so values round-trip through JSON as plain scalars
/// (`true`, `42`, `4.2`, `"text"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl SettingValue {
    /// Infer the primitive type from the value itself.
    pub fn inferred_type(&self) -> SettingType {
        match self {
            SettingValue::Bool(_) => SettingType::Bool,
            SettingValue::Integer(_) => SettingType::Integer,
            SettingValue::Float(_) => SettingType::Float,
            SettingValue::String(_) => SettingType::String,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// A setting declared by an extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingSpec {
    /// Setting key, unique within the extension.
    pub name: String,
    /// Default value; also the initial current value.
    pub default: SettingValue,
    /// Declared type. Inferred from `default` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<SettingType>,
    /// Optional enumerated choices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<SettingValue>>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl SettingSpec {
    pub fn new(name: impl Into<String>, default: impl Into<SettingValue>) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
            value_type: None,
            choices: None,
            description: String::new(),
            category: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_choices(mut self, choices: Vec<SettingValue>) -> Self {
        self.choices = Some(choices);
        self
    }

    /// Declared type, falling back to the type of the default value.
    pub fn effective_type(&self) -> SettingType {
        self.value_type.unwrap_or_else(|| self.default.inferred_type())
    }
}

/// Renders a UI fragment for a mount point. Zero-argument by contract:
/// any state the fragment needs lives on the extension instance.
pub type ComponentRenderer = Arc<dyn Fn() -> String + Send + Sync>;

/// Async JSON-in/JSON-out callable exposed by a tool extension.
pub type ToolHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ExtensionError>> + Send + Sync>;

/// Async hook callback. Receives the dispatch payload and returns a value;
/// for pipeline hooks the returned value feeds the next callback.
pub type HookCallback =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ExtensionError>> + Send + Sync>;

/// Default callback priority. Lower priorities run earlier.
pub const DEFAULT_HOOK_PRIORITY: i32 = 10;

/// A hook subscription declared by an extension instance.
#[derive(Clone)]
pub struct HookSubscription {
    /// Name of the hook to attach to.
    pub hook: String,
    /// Dispatch priority, ascending. Equal priorities keep registration order.
    pub priority: i32,
    /// The callback itself.
    pub callback: HookCallback,
}

impl HookSubscription {
    pub fn new(hook: impl Into<String>, callback: HookCallback) -> Self {
        Self {
            hook: hook.into(),
            priority: DEFAULT_HOOK_PRIORITY,
            callback,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl std::fmt::Debug for HookSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookSubscription")
            .field("hook", &self.hook)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Lift an async closure into a [`HookCallback`].
pub fn hook_fn<F, Fut>(f: F) -> HookCallback
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Value, ExtensionError>> + Send + 'static,
{
    Arc::new(move |payload| Box::pin(f(payload)))
}

/// Lift an async closure into a [`ToolHandler`].
pub fn tool_fn<F, Fut>(f: F) -> ToolHandler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Value, ExtensionError>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

/// An HTTP route contributed by an API extension.
///
/// The handler is framework-neutral: the host adapts it onto its own
/// router, passing the request body as JSON and returning the handler's
/// JSON output as the response body.
#[derive(Clone)]
pub struct RouteSpec {
    /// Route path relative to the extension's namespace, e.g. `/weather`.
    pub path: String,
    /// HTTP method, upper-case.
    pub method: String,
    /// Request handler.
    pub handler: ToolHandler,
}

impl RouteSpec {
    pub fn new(method: impl Into<String>, path: impl Into<String>, handler: ToolHandler) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            handler,
        }
    }
}

impl std::fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSpec")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Mount point table: mount point name to ordered component ids.
pub type MountPoints = HashMap<String, Vec<String>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_value_round_trip() {
        let v = SettingValue::Bool(true);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "true");
        assert_eq!(serde_json::from_str::<SettingValue>(&json).unwrap(), v);

        let v = SettingValue::Integer(42);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "42");
        assert_eq!(serde_json::from_str::<SettingValue>(&json).unwrap(), v);

        let v = SettingValue::Float(2.5);
        assert_eq!(serde_json::to_string(&v).unwrap(), "2.5");

        let v = SettingValue::String("hello".into());
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"hello\"");
    }

    #[test]
    fn test_setting_type_inference() {
        assert_eq!(SettingValue::Bool(false).inferred_type(), SettingType::Bool);
        assert_eq!(SettingValue::Integer(7).inferred_type(), SettingType::Integer);
        assert_eq!(SettingValue::Float(0.5).inferred_type(), SettingType::Float);
        assert_eq!(
            SettingValue::String("x".into()).inferred_type(),
            SettingType::String
        );
    }

    #[test]
    fn test_spec_effective_type_prefers_declared() {
        let spec = SettingSpec {
            value_type: Some(SettingType::String),
            ..SettingSpec::new("port", 8080_i64)
        };
        assert_eq!(spec.effective_type(), SettingType::String);

        let spec = SettingSpec::new("port", 8080_i64);
        assert_eq!(spec.effective_type(), SettingType::Integer);
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(serde_json::to_string(&ExtensionKind::Ui).unwrap(), "\"ui\"");
        let kind: ExtensionKind = serde_json::from_str("\"theme\"").unwrap();
        assert_eq!(kind, ExtensionKind::Theme);
        assert_eq!(ExtensionKind::default(), ExtensionKind::Generic);
    }
}
