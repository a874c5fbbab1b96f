//! Registry configuration
//!
//! Names of the element attributes the runtime reads and writes. They can be
//! loaded from TOML:
//!
//! ```toml
//! configAttr = "data-ui"
//! instanceAttr = "data-ui-id"
//! uiClassPrefix = "vn"
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, WidgetError};

// =============================================================================
// Registry configuration
// =============================================================================

/// Global configuration held by a [`Registry`](crate::Registry)
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Element attribute holding declarative widget configuration
    #[serde(default = "default_config_attr")]
    pub config_attr: String,
    /// Element attribute stamped on a rendered widget's main element
    #[serde(default = "default_instance_attr")]
    pub instance_attr: String,
    /// Prefix of the class names widgets put on their elements
    #[serde(default = "default_ui_class_prefix")]
    pub ui_class_prefix: String,
}

fn default_config_attr() -> String {
    "s-ui".to_string()
}

fn default_instance_attr() -> String {
    "s-id".to_string()
}

fn default_ui_class_prefix() -> String {
    "ui".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            config_attr: default_config_attr(),
            instance_attr: default_instance_attr(),
            ui_class_prefix: default_ui_class_prefix(),
        }
    }
}

impl RegistryConfig {
    /// Parse from TOML text; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| WidgetError::Config(e.to_string()))
    }

    /// Look up a value by its configuration key
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "configAttr" => Some(&self.config_attr),
            "instanceAttr" => Some(&self.instance_attr),
            "uiClassPrefix" => Some(&self.ui_class_prefix),
            _ => None,
        }
    }

    /// Build a prefixed class name, e.g. `ui-masker`
    pub fn ui_class(&self, name: &str) -> String {
        format!("{}-{}", self.ui_class_prefix, name)
    }

    /// Overlay every field present in `patch`
    pub fn apply(&mut self, patch: RegistryConfigPatch) {
        if let Some(config_attr) = patch.config_attr {
            self.config_attr = config_attr;
        }
        if let Some(instance_attr) = patch.instance_attr {
            self.instance_attr = instance_attr;
        }
        if let Some(ui_class_prefix) = patch.ui_class_prefix {
            self.ui_class_prefix = ui_class_prefix;
        }
    }
}

/// Partial configuration update
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfigPatch {
    #[serde(default)]
    pub config_attr: Option<String>,
    #[serde(default)]
    pub instance_attr: Option<String>,
    #[serde(default)]
    pub ui_class_prefix: Option<String>,
}

impl RegistryConfigPatch {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| WidgetError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.get("configAttr"), Some("s-ui"));
        assert_eq!(config.get("instanceAttr"), Some("s-id"));
        assert_eq!(config.get("uiClassPrefix"), Some("ui"));
        assert_eq!(config.get("nope"), None);
        assert_eq!(config.ui_class("masker"), "ui-masker");
    }

    #[test]
    fn test_from_toml_keeps_missing_defaults() {
        let config = RegistryConfig::from_toml_str("instanceAttr = \"data-id\"\n").unwrap();
        assert_eq!(config.instance_attr, "data-id");
        assert_eq!(config.config_attr, "s-ui");
    }

    #[test]
    fn test_invalid_toml() {
        let err = RegistryConfig::from_toml_str("instanceAttr = [").unwrap_err();
        assert!(matches!(err, WidgetError::Config(_)));
    }

    #[test]
    fn test_patch() {
        let mut config = RegistryConfig::default();
        config.apply(RegistryConfigPatch::from_toml_str("uiClassPrefix = \"vn\"").unwrap());
        assert_eq!(config.ui_class("slider"), "vn-slider");
        assert_eq!(config.instance_attr, "s-id");
    }
}
