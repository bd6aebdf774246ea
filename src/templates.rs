//! Template System - Page Layout Descriptors

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::nodes::{Document, Props};
use crate::registry::{Asset, AssetKind, AssetRegistry, Category};

pub type TemplateId = String;

/// Wildcard accepted in compatibility lists and rules.
pub const ANY: &str = "any";

pub(crate) fn any_list() -> Vec<String> {
    vec![ANY.to_string()]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    #[default]
    Single,
    Multi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatePage {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "page_data")]
    pub data: Document,
}

/// Page data is stored either as a node map or as that map encoded in a string.
fn page_data<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Document, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(encoded) => Document::from_json_str(&encoded).map_err(de::Error::custom),
        other => Document::from_json(&other).map_err(de::Error::custom),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub premium: bool,
    pub version: String,
    #[serde(default = "any_list")]
    pub compatible_themes: Vec<String>,
    #[serde(default)]
    pub required_theme_features: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_page_count")]
    pub page_count: usize,
    #[serde(default)]
    pub kind: TemplateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<TemplatePage>,
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub custom: Props,
}

fn default_page_count() -> usize {
    1
}

impl Template {
    /// True when the theme list has no wildcard and leaves `theme_id` out.
    pub fn excludes_theme(&self, theme_id: &str) -> bool {
        !self
            .compatible_themes
            .iter()
            .any(|t| t == ANY || t == theme_id)
    }

    pub fn is_multi_page(&self) -> bool {
        self.kind == TemplateKind::Multi
    }
}

impl Asset for Template {
    const KIND: AssetKind = AssetKind::Template;

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

/// Template registry - indexed by id and category
pub type TemplateRegistry = AssetRegistry<Template>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_defaults() {
        let template: Template = serde_json::from_value(json!({
            "id": "poster-basic",
            "name": "Poster",
            "description": "One page poster",
            "category": "modern",
            "version": "1.0.0",
            "document": { "ROOT": { "type": "Container", "isCanvas": true } }
        }))
        .unwrap();

        assert_eq!(template.compatible_themes, vec!["any".to_string()]);
        assert_eq!(template.kind, TemplateKind::Single);
        assert_eq!(template.page_count, 1);
        assert!(!template.excludes_theme("mono"));
    }

    #[test]
    fn test_finite_theme_list_excludes_others() {
        let template: Template = serde_json::from_value(json!({
            "id": "t",
            "name": "T",
            "description": "",
            "category": "bold",
            "version": "1.0.0",
            "compatibleThemes": ["mono", "noir"]
        }))
        .unwrap();

        assert!(!template.excludes_theme("noir"));
        assert!(template.excludes_theme("pastel"));
    }

    #[test]
    fn test_page_data_accepts_encoded_string() {
        let template: Template = serde_json::from_value(json!({
            "id": "lookbook",
            "name": "Lookbook",
            "description": "Three spreads",
            "category": "elegant",
            "version": "2.1.0",
            "kind": "multi",
            "pages": [
                { "id": "cover", "name": "Cover", "data": { "ROOT": { "type": "Container", "isCanvas": true } } },
                { "id": "back", "name": "Back", "data": "{\"ROOT\":{\"type\":\"Container\",\"isCanvas\":true}}" }
            ]
        }))
        .unwrap();

        assert!(template.is_multi_page());
        assert_eq!(template.pages.len(), 2);
        assert!(template.pages[1].data.root().is_some());
    }
}
