//! Folio Core - Catalogue Design Engine
//!
//! # Ground Rules
//! 1. Documents Are Graphs (one root, links both ways)
//! 2. Content Paths Are a Closed Set
//! 3. Populate Never Destroys
//! 4. Scoring Is Deterministic
//! 5. Registries Never Show Empty Categories

pub mod nodes;
pub mod builder;
pub mod content;
pub mod schema;
pub mod mapper;
pub mod markup;
pub mod binding;
pub mod registry;
pub mod templates;
pub mod themes;
pub mod compatibility;
pub mod library;
pub mod selection;
pub mod watcher;
pub mod hashing;

pub use nodes::{Document, DocumentError, Node, NodeId, NodeType, Props, ROOT_NODE_ID};
pub use builder::{BuildError, TemplateBuilder};
pub use content::{BoundValue, ContentInstance, ContentPath, Price, Product, ProductCategory, Profile};
pub use schema::{is_valid, validate, SchemaViolation, ValidationError};
pub use mapper::{map_to_standardized, PersistedCatalogue, PersistedProfile};
pub use binding::{BindingError, BindingSurface, DataBinder, MarkupSurface, NodeSurface};
pub use registry::{Asset, AssetError, AssetKind, AssetRegistry, Category};
pub use templates::{Template, TemplateId, TemplateKind, TemplatePage, TemplateRegistry};
pub use themes::{Theme, ThemeId, ThemeRegistry};
pub use compatibility::{
    CompatibilityEngine, CompatibilityMatrix, CompatibilityResult, CompatibilityRule, RuleSet,
    ScoringPolicy,
};
pub use library::AssetLibrary;
pub use selection::{load_into_editor, LoadedTemplate, Orchestrator, Selection, SelectionError, SelectionStore};
pub use watcher::{apply_change, AssetChange, AssetWatcher, WatchConfig};
pub use hashing::{canonical_json, compute_state_hash, fingerprint};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
