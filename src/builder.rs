//! Template Builder - Fluent Assembly of Template Descriptors
//!
//! The builder checks identity fields and document presence only. The node
//! graph invariants are not checked here; call
//! [`Document::check_graph`](crate::nodes::Document::check_graph) before
//! persisting a hand-authored document.

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::nodes::{Document, Node, NodeId, Props, ROOT_NODE_ID};
use crate::registry::Category;
use crate::templates::{any_list, Template, TemplateKind, TemplatePage};

/// Custom prop that marks a template as multi-page.
pub const MULTI_PAGE_PROP: &str = "multiPage";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Template is missing required field: {0}")]
    MissingField(&'static str),

    #[error("Single-page template has no document data")]
    EmptyDocument,

    #[error("Multi-page template has no pages")]
    NoPages,

    #[error("Invalid template version '{0}': {1}")]
    InvalidVersion(String, String),
}

#[derive(Debug, Clone, Default)]
pub struct TemplateBuilder {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    category: Option<Category>,
    version: Option<String>,
    premium: bool,
    tags: Vec<String>,
    compatible_themes: Vec<String>,
    required_theme_features: Vec<String>,
    nodes: BTreeMap<NodeId, Node>,
    pages: Vec<TemplatePage>,
    custom: Props,
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn premium(mut self, premium: bool) -> Self {
        self.premium = premium;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn compatible_with(mut self, theme_id: impl Into<String>) -> Self {
        self.compatible_themes.push(theme_id.into());
        self
    }

    pub fn requires_feature(mut self, feature: impl Into<String>) -> Self {
        self.required_theme_features.push(feature.into());
        self
    }

    /// Assign `node` to `id`, replacing any earlier assignment.
    pub fn node(mut self, id: impl Into<NodeId>, mut node: Node) -> Self {
        let id = id.into();
        node.id = id.clone();
        self.nodes.insert(id, node);
        self
    }

    pub fn root(self, node: Node) -> Self {
        self.node(ROOT_NODE_ID, node)
    }

    pub fn custom_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }

    pub fn multi_page(self, multi: bool) -> Self {
        self.custom_prop(MULTI_PAGE_PROP, Value::Bool(multi))
    }

    pub fn page(mut self, id: impl Into<String>, name: impl Into<String>, data: Document) -> Self {
        self.pages.push(TemplatePage {
            id: id.into(),
            name: name.into(),
            data,
        });
        self
    }

    fn is_multi_page(&self) -> bool {
        self.custom
            .get(MULTI_PAGE_PROP)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn build(self) -> Result<Template, BuildError> {
        let multi = self.is_multi_page();
        let id = require(self.id, "id")?;
        let name = require(self.name, "name")?;
        let description = require(self.description, "description")?;
        let category = self.category.ok_or(BuildError::MissingField("category"))?;

        let version = self.version.unwrap_or_else(|| "1.0.0".to_string());
        semver::Version::parse(&version)
            .map_err(|e| BuildError::InvalidVersion(version.clone(), e.to_string()))?;

        let (kind, document, pages, page_count) = if multi {
            if self.pages.is_empty() {
                return Err(BuildError::NoPages);
            }
            let count = self.pages.len();
            (TemplateKind::Multi, None, self.pages, count)
        } else {
            if self.nodes.is_empty() {
                return Err(BuildError::EmptyDocument);
            }
            (
                TemplateKind::Single,
                Some(Document::from_nodes(self.nodes)),
                Vec::new(),
                1,
            )
        };

        let compatible_themes = if self.compatible_themes.is_empty() {
            any_list()
        } else {
            self.compatible_themes
        };

        Ok(Template {
            id,
            name,
            description,
            category,
            premium: self.premium,
            version,
            compatible_themes,
            required_theme_features: self.required_theme_features,
            tags: self.tags,
            page_count,
            kind,
            document,
            pages,
            custom: self.custom,
        })
    }
}

fn require(value: Option<String>, field: &'static str) -> Result<String, BuildError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(BuildError::MissingField(field))
}
