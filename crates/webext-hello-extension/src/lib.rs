//! Hello-world extension.
//!
//! Demonstrates the full capability surface: a configurable greeting
//! setting, a sidebar banner component, a `greet` tool, and a
//! post-processing chat hook that signs assistant replies.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Value, json};
use webext_sdk::prelude::*;

const DEFAULT_GREETING: &str = "Hello from webext!";

struct HelloState {
    greeting: String,
    show_banner: bool,
}

pub struct HelloExtension {
    state: Arc<RwLock<HelloState>>,
}

impl Default for HelloExtension {
    fn default() -> Self {
        Self {
            state: Arc::new(RwLock::new(HelloState {
                greeting: DEFAULT_GREETING.to_string(),
                show_banner: true,
            })),
        }
    }
}

#[async_trait::async_trait]
impl Extension for HelloExtension {
    fn name(&self) -> &str {
        "hello-world"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "A friendly example extension"
    }

    fn author(&self) -> &str {
        "webext Contributors"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Ui
    }

    fn settings(&self) -> Vec<SettingSpec> {
        vec![
            SettingSpec::new("greeting", DEFAULT_GREETING)
                .with_description("Text shown in the banner and appended to replies"),
            SettingSpec::new("show_banner", true)
                .with_description("Render the sidebar banner"),
        ]
    }

    fn apply_setting(&self, key: &str, value: &SettingValue) {
        let mut state = self.state.write();
        match key {
            "greeting" => {
                if let Some(text) = value.as_str() {
                    state.greeting = text.to_string();
                }
            }
            "show_banner" => {
                if let Some(flag) = value.as_bool() {
                    state.show_banner = flag;
                }
            }
            _ => {}
        }
    }

    fn hook_subscriptions(&self) -> Vec<HookSubscription> {
        let state = self.state.clone();
        vec![HookSubscription::new(
            "chat_post_process",
            hook_fn(move |mut payload| {
                let state = state.clone();
                async move {
                    let greeting = state.read().greeting.clone();
                    if let Some(content) = payload
                        .get("content")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                    {
                        payload["content"] = json!(format!("{content}\n\n{greeting}"));
                    }
                    Ok(payload)
                }
            }),
        )]
    }

    fn components(&self) -> HashMap<String, ComponentRenderer> {
        let state = self.state.clone();
        let mut components: HashMap<String, ComponentRenderer> = HashMap::new();
        components.insert(
            "banner".to_string(),
            Arc::new(move || {
                let state = state.read();
                if state.show_banner {
                    format!("<div class=\"hello-banner\">{}</div>", state.greeting)
                } else {
                    String::new()
                }
            }),
        );
        components
    }

    fn mount_points(&self) -> MountPoints {
        let mut mounts = MountPoints::new();
        mounts.insert("sidebar".to_string(), vec!["banner".to_string()]);
        mounts
    }

    fn tools(&self) -> HashMap<String, ToolHandler> {
        let state = self.state.clone();
        let mut tools: HashMap<String, ToolHandler> = HashMap::new();
        tools.insert(
            "greet".to_string(),
            tool_fn(move |args| {
                let state = state.clone();
                async move {
                    let who = args
                        .get("who")
                        .and_then(Value::as_str)
                        .unwrap_or("world");
                    let greeting = state.read().greeting.clone();
                    Ok(json!({ "message": format!("{greeting} ({who})") }))
                }
            }),
        );
        tools
    }

    async fn activate(&self) -> Result<()> {
        tracing::info!("hello-world activated");
        Ok(())
    }
}

webext_sdk::export_extension!(HelloExtension);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chat_hook_signs_replies() {
        let ext = HelloExtension::default();
        let subs = ext.hook_subscriptions();
        assert_eq!(subs[0].hook, "chat_post_process");

        let out = (subs[0].callback)(json!({ "content": "Sure." })).await.unwrap();
        assert_eq!(out["content"], format!("Sure.\n\n{DEFAULT_GREETING}"));

        // Non-object payloads pass through untouched.
        let out = (subs[0].callback)(json!("plain")).await.unwrap();
        assert_eq!(out, json!("plain"));
    }

    #[tokio::test]
    async fn test_settings_drive_banner_and_tool() {
        let ext = HelloExtension::default();
        ext.apply_setting("greeting", &SettingValue::from("Hi there"));

        let components = ext.components();
        let banner = &components["banner"];
        assert_eq!(banner(), "<div class=\"hello-banner\">Hi there</div>");

        ext.apply_setting("show_banner", &SettingValue::from(false));
        assert_eq!(banner(), "");

        let tools = ext.tools();
        let out = tools["greet"](json!({ "who": "tests" })).await.unwrap();
        assert_eq!(out["message"], "Hi there (tests)");
    }
}
