//! Persisted extension descriptor and settings model.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use webext_sdk::{Extension, ExtensionKind, SettingSpec, SettingType, SettingValue};

/// One declared setting together with its current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingEntry {
    pub name: String,
    pub default: SettingValue,
    /// Current value; the only extension state the host mutates externally.
    pub value: SettingValue,
    #[serde(rename = "type")]
    pub value_type: SettingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<SettingValue>>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl From<SettingSpec> for SettingEntry {
    fn from(spec: SettingSpec) -> Self {
        let value_type = spec.effective_type();
        Self {
            name: spec.name,
            value: spec.default.clone(),
            default: spec.default,
            value_type,
            choices: spec.choices,
            description: spec.description,
            category: spec.category,
        }
    }
}

/// Identity, state and settings for one known extension.
///
/// Serializes to the persisted store format and round-trips through JSON
/// without loss. `name` is the sole identity key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub kind: ExtensionKind,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub settings: BTreeMap<String, SettingEntry>,
    /// Filesystem location of the extension's code unit, if materialized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<PathBuf>,
    #[serde(default)]
    pub active: bool,
    pub install_date: String,
    pub update_date: String,
    /// Last lifecycle failure; cleared on the next successful transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ExtensionDescriptor {
    /// Build a descriptor from a loaded runtime instance.
    ///
    /// Settings take their current value from the declared default; state
    /// fields start inactive with fresh timestamps.
    pub fn from_instance(instance: &dyn Extension, install_path: Option<PathBuf>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let settings = instance
            .settings()
            .into_iter()
            .map(|spec| (spec.name.clone(), SettingEntry::from(spec)))
            .collect();

        Self {
            name: instance.name().to_string(),
            version: instance.version().to_string(),
            description: instance.description().to_string(),
            author: instance.author().to_string(),
            kind: instance.kind(),
            dependencies: instance.dependencies(),
            settings,
            install_path,
            active: false,
            install_date: now.clone(),
            update_date: now,
            last_error: None,
        }
    }

    /// Reconcile a freshly discovered descriptor with a previously
    /// persisted one: metadata wins, user-visible state survives.
    pub fn merge_persisted(&mut self, previous: &ExtensionDescriptor) {
        self.active = previous.active;
        self.install_date = previous.install_date.clone();
        if !previous.settings.is_empty() {
            self.settings = previous.settings.clone();
        }
        self.last_error = previous.last_error.clone();
    }

    /// Touch the update timestamp.
    pub fn mark_updated(&mut self) {
        self.update_date = chrono::Utc::now().to_rfc3339();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webext_sdk::SettingSpec;

    struct Sample;

    #[async_trait::async_trait]
    impl Extension for Sample {
        fn name(&self) -> &str {
            "sample"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        fn description(&self) -> &str {
            "A sample extension"
        }
        fn author(&self) -> &str {
            "tests"
        }
        fn kind(&self) -> ExtensionKind {
            ExtensionKind::Tool
        }
        fn dependencies(&self) -> Vec<String> {
            vec!["base".into()]
        }
        fn settings(&self) -> Vec<SettingSpec> {
            vec![
                SettingSpec::new("enabled", true).with_description("Toggle"),
                SettingSpec::new("limit", 10_i64).with_category("tuning"),
            ]
        }
    }

    #[test]
    fn test_from_instance() {
        let desc = ExtensionDescriptor::from_instance(&Sample, Some(PathBuf::from("/x")));
        assert_eq!(desc.name, "sample");
        assert_eq!(desc.kind, ExtensionKind::Tool);
        assert_eq!(desc.dependencies, vec!["base"]);
        assert!(!desc.active);
        assert!(desc.last_error.is_none());

        let limit = &desc.settings["limit"];
        assert_eq!(limit.value, SettingValue::Integer(10));
        assert_eq!(limit.value_type, SettingType::Integer);
        assert_eq!(limit.category.as_deref(), Some("tuning"));
    }

    #[test]
    fn test_round_trip_preserves_identity_and_state() {
        let mut desc = ExtensionDescriptor::from_instance(&Sample, None);
        desc.active = true;
        desc.settings.get_mut("limit").unwrap().value = SettingValue::Integer(50);

        let json = serde_json::to_string(&desc).unwrap();
        let back: ExtensionDescriptor = serde_json::from_str(&json).unwrap();

        assert_eq!(back.name, desc.name);
        assert_eq!(back.version, desc.version);
        assert_eq!(back.active, desc.active);
        assert_eq!(back.settings, desc.settings);
        assert_eq!(back.install_date, desc.install_date);
    }

    #[test]
    fn test_merge_preserves_state_fields() {
        let mut previous = ExtensionDescriptor::from_instance(&Sample, None);
        previous.active = true;
        previous.install_date = "2024-01-01T00:00:00+00:00".into();
        previous.settings.get_mut("enabled").unwrap().value = SettingValue::Bool(false);

        let mut fresh = ExtensionDescriptor::from_instance(&Sample, Some(PathBuf::from("/y")));
        fresh.version = "1.1.0".into();
        fresh.merge_persisted(&previous);

        // Metadata wins, state survives.
        assert_eq!(fresh.version, "1.1.0");
        assert_eq!(fresh.install_path, Some(PathBuf::from("/y")));
        assert!(fresh.active);
        assert_eq!(fresh.install_date, "2024-01-01T00:00:00+00:00");
        assert_eq!(
            fresh.settings["enabled"].value,
            SettingValue::Bool(false)
        );
    }
}
