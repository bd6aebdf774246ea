//! Selection & Loading - Per-Catalogue Choices and Editor Payloads
//!
//! A catalogue has at most one selected template/theme pair; a new
//! selection replaces the old one. Templates load into an editor either by
//! their declared kind (`Orchestrator::load_template`) or, for untagged
//! payloads, by the shape of the raw JSON (`load_into_editor`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::binding::DataBinder;
use crate::content::ContentInstance;
use crate::library::AssetLibrary;
use crate::nodes::{Document, Props, ROOT_NODE_ID};
use crate::registry::AssetError;
use crate::templates::{TemplateKind, TemplatePage};

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("Template {template_id} cannot be used with theme {theme_id}: {reason}")]
    IncompatiblePair {
        template_id: String,
        theme_id: String,
        reason: String,
    },

    #[error("Malformed template: {0}")]
    MalformedTemplate(String),

    #[error("No selection for catalogue {0}")]
    NoSelection(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub catalogue_id: String,
    pub template_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_id: Option<String>,
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub customizations: Props,
    pub selected_at: DateTime<Utc>,
}

/// Storage for selections. Persistence medium is up to the host.
pub trait SelectionStore {
    fn get(&self, catalogue_id: &str) -> Option<Selection>;
    fn set(&mut self, selection: Selection);
    fn delete(&mut self, catalogue_id: &str) -> bool;
    fn list(&self) -> Vec<Selection>;
}

#[derive(Debug, Clone, Default)]
pub struct MemorySelectionStore {
    selections: BTreeMap<String, Selection>,
}

impl SelectionStore for MemorySelectionStore {
    fn get(&self, catalogue_id: &str) -> Option<Selection> {
        self.selections.get(catalogue_id).cloned()
    }

    fn set(&mut self, selection: Selection) {
        self.selections.insert(selection.catalogue_id.clone(), selection);
    }

    fn delete(&mut self, catalogue_id: &str) -> bool {
        self.selections.remove(catalogue_id).is_some()
    }

    fn list(&self) -> Vec<Selection> {
        self.selections.values().cloned().collect()
    }
}

/// A template's pages, ready for an editing surface.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedTemplate {
    Single(Document),
    Multi(Vec<TemplatePage>),
}

impl LoadedTemplate {
    pub fn documents(&self) -> Vec<&Document> {
        match self {
            LoadedTemplate::Single(doc) => vec![doc],
            LoadedTemplate::Multi(pages) => pages.iter().map(|p| &p.data).collect(),
        }
    }

    pub fn page_count(&self) -> usize {
        match self {
            LoadedTemplate::Single(_) => 1,
            LoadedTemplate::Multi(pages) => pages.len(),
        }
    }

    fn map_documents<F: Fn(&Document) -> Document>(&self, f: F) -> LoadedTemplate {
        match self {
            LoadedTemplate::Single(doc) => LoadedTemplate::Single(f(doc)),
            LoadedTemplate::Multi(pages) => LoadedTemplate::Multi(
                pages
                    .iter()
                    .map(|page| TemplatePage {
                        id: page.id.clone(),
                        name: page.name.clone(),
                        data: f(&page.data),
                    })
                    .collect(),
            ),
        }
    }
}

/// Dispatch an untagged payload by shape: a list of `{id, data}` records is
/// multi-page, an object holding a `ROOT` node is single-page, anything
/// else is malformed.
pub fn load_into_editor(raw: &Value) -> Result<LoadedTemplate, SelectionError> {
    match raw {
        Value::Array(items) => load_multi_page(items).map(LoadedTemplate::Multi),
        Value::Object(map) if map.contains_key(ROOT_NODE_ID) => {
            load_single_page(raw).map(LoadedTemplate::Single)
        }
        _ => Err(SelectionError::MalformedTemplate(
            "expected a list of pages or a node map with a ROOT node".to_string(),
        )),
    }
}

fn load_single_page(raw: &Value) -> Result<Document, SelectionError> {
    if !raw.get(ROOT_NODE_ID).is_some_and(Value::is_object) {
        return Err(SelectionError::MalformedTemplate("ROOT is not a node".to_string()));
    }
    let document = Document::from_json(raw).map_err(|e| SelectionError::MalformedTemplate(e.to_string()))?;
    checked(document, "document")
}

fn load_multi_page(items: &[Value]) -> Result<Vec<TemplatePage>, SelectionError> {
    if items.is_empty() {
        return Err(SelectionError::MalformedTemplate("page list is empty".to_string()));
    }
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let id = item
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| SelectionError::MalformedTemplate(format!("page {} has no id", index)))?;
            let name = item.get("name").and_then(Value::as_str).unwrap_or(id);
            let data = match item.get("data") {
                Some(Value::String(encoded)) => Document::from_json_str(encoded),
                Some(value @ Value::Object(_)) => Document::from_json(value),
                _ => {
                    return Err(SelectionError::MalformedTemplate(format!(
                        "page {} has no document data",
                        id
                    )))
                }
            }
            .map_err(|e| SelectionError::MalformedTemplate(format!("page {}: {}", id, e)))?;

            Ok(TemplatePage {
                id: id.to_string(),
                name: name.to_string(),
                data: checked(data, id)?,
            })
        })
        .collect()
}

fn checked(document: Document, label: &str) -> Result<Document, SelectionError> {
    document
        .check_graph()
        .map_err(|e| SelectionError::MalformedTemplate(format!("{}: {}", label, e)))?;
    Ok(document)
}

/// Ties the asset library, the selection store and the binder together.
pub struct Orchestrator<S: SelectionStore = MemorySelectionStore> {
    library: AssetLibrary,
    store: S,
}

impl Orchestrator<MemorySelectionStore> {
    pub fn in_memory(library: AssetLibrary) -> Self {
        Self::new(library, MemorySelectionStore::default())
    }
}

impl<S: SelectionStore> Orchestrator<S> {
    pub fn new(library: AssetLibrary, store: S) -> Self {
        Self { library, store }
    }

    pub fn library(&self) -> &AssetLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut AssetLibrary {
        &mut self.library
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record the pair for a catalogue, replacing any earlier choice.
    ///
    /// Explicitly excluded pairs are refused; a merely low score is logged
    /// and accepted.
    pub fn select_for_catalogue(
        &mut self,
        catalogue_id: &str,
        template_id: &str,
        theme_id: Option<&str>,
    ) -> Result<Selection, SelectionError> {
        self.library.templates().require(template_id)?;
        if let Some(theme_id) = theme_id {
            self.library.themes().require(theme_id)?;
            let result = self.library.test(template_id, theme_id);
            if result.excluded {
                return Err(SelectionError::IncompatiblePair {
                    template_id: template_id.to_string(),
                    theme_id: theme_id.to_string(),
                    reason: result.issues.join("; "),
                });
            }
            if !result.compatible {
                warn!(
                    catalogue_id = %catalogue_id,
                    template_id = %template_id,
                    theme_id = %theme_id,
                    score = result.score,
                    "Selected pair scores below the compatibility threshold"
                );
            }
        }

        let customizations = self
            .store
            .get(catalogue_id)
            .filter(|previous| previous.template_id == template_id)
            .map(|previous| previous.customizations)
            .unwrap_or_default();

        let selection = Selection {
            catalogue_id: catalogue_id.to_string(),
            template_id: template_id.to_string(),
            theme_id: theme_id.map(str::to_string),
            customizations,
            selected_at: Utc::now(),
        };
        self.store.set(selection.clone());
        info!(catalogue_id = %catalogue_id, template_id = %template_id, "Selection saved");
        Ok(selection)
    }

    /// Replace the customizations bag on an existing selection.
    pub fn customize(&mut self, catalogue_id: &str, customizations: Props) -> Result<Selection, SelectionError> {
        let mut selection = self
            .store
            .get(catalogue_id)
            .ok_or_else(|| SelectionError::NoSelection(catalogue_id.to_string()))?;
        selection.customizations = customizations;
        self.store.set(selection.clone());
        Ok(selection)
    }

    pub fn selection(&self, catalogue_id: &str) -> Option<Selection> {
        self.store.get(catalogue_id)
    }

    pub fn clear_selection(&mut self, catalogue_id: &str) -> bool {
        self.store.delete(catalogue_id)
    }

    /// Load a registered template by its declared kind.
    pub fn load_template(&self, template_id: &str) -> Result<LoadedTemplate, SelectionError> {
        let template = self.library.templates().require(template_id)?;
        match template.kind {
            TemplateKind::Single => {
                let document = template.document.clone().ok_or_else(|| {
                    SelectionError::MalformedTemplate(format!("{} has no document", template_id))
                })?;
                checked(document, template_id).map(LoadedTemplate::Single)
            }
            TemplateKind::Multi => {
                if template.pages.is_empty() {
                    return Err(SelectionError::MalformedTemplate(format!("{} has no pages", template_id)));
                }
                let pages = template
                    .pages
                    .iter()
                    .map(|page| {
                        checked(page.data.clone(), &page.id).map(|data| TemplatePage {
                            id: page.id.clone(),
                            name: page.name.clone(),
                            data,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(LoadedTemplate::Multi(pages))
            }
        }
    }

    /// Load the catalogue's selected template and bind `content` into
    /// every page.
    pub fn populate_for_catalogue(
        &self,
        catalogue_id: &str,
        content: &ContentInstance,
    ) -> Result<LoadedTemplate, SelectionError> {
        let selection = self
            .store
            .get(catalogue_id)
            .ok_or_else(|| SelectionError::NoSelection(catalogue_id.to_string()))?;
        let loaded = self.load_template(&selection.template_id)?;
        let binder = DataBinder::nodes();
        Ok(loaded.map_documents(|doc| binder.populate(doc, content)))
    }
}
