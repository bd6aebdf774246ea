//! Theme System - Visual Style Descriptors

use serde::{Deserialize, Serialize};

use crate::registry::{Asset, AssetKind, AssetRegistry, Category};
use crate::templates::{any_list, ANY};

pub type ThemeId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorPalette {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<String>,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            primary: "#111827".to_string(),
            secondary: "#4b5563".to_string(),
            accent: "#2563eb".to_string(),
            background: "#ffffff".to_string(),
            text: "#111827".to_string(),
            muted: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typography {
    pub heading_font: String,
    pub body_font: String,
    #[serde(default = "default_base_size")]
    pub base_size_px: u32,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_base_size() -> u32 { 16 }
fn default_scale() -> f64 { 1.25 }

impl Default for Typography {
    fn default() -> Self {
        Self {
            heading_font: "Inter".to_string(),
            body_font: "Inter".to_string(),
            base_size_px: default_base_size(),
            scale: default_scale(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: ThemeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub premium: bool,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub colors: ColorPalette,
    #[serde(default)]
    pub typography: Typography,
    #[serde(default = "any_list")]
    pub compatible_templates: Vec<String>,
    /// Capability tags this theme satisfies.
    #[serde(default, alias = "requiredFeatures")]
    pub features: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_version() -> String { "1.0.0".to_string() }

impl Theme {
    pub fn excludes_template(&self, template_id: &str) -> bool {
        !self
            .compatible_templates
            .iter()
            .any(|t| t == ANY || t == template_id)
    }

    pub fn supports(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

impl Asset for Theme {
    const KIND: AssetKind = AssetKind::Theme;

    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn category(&self) -> Category {
        self.category
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Theme registry - indexed by id and category
pub type ThemeRegistry = AssetRegistry<Theme>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_features_alias() {
        let theme: Theme = serde_json::from_value(json!({
            "id": "mono",
            "name": "Mono",
            "category": "minimal",
            "requiredFeatures": ["gallery"]
        }))
        .unwrap();

        assert!(theme.supports("gallery"));
        assert!(!theme.supports("video"));
        assert!(!theme.excludes_template("anything"));
        assert_eq!(theme.typography.base_size_px, 16);
    }
}
