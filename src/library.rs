//! Asset Library - Registries, Rules and the Cached Matrix
//!
//! Owns both registries and the compatibility engine. Every mutation drops
//! the cached matrix; the next `matrix()` call rescores every pair.
//!
//! On-disk layout:
//!
//! ```text
//! <root>/templates/*.json
//! <root>/themes/*.json
//! <root>/rules.json        (optional)
//! ```

use std::path::Path;
use tracing::{debug, info};

use crate::compatibility::{
    CompatibilityEngine, CompatibilityMatrix, CompatibilityResult, CompatibilityRule, RuleSet,
    ScoringPolicy,
};
use crate::registry::AssetError;
use crate::templates::{Template, TemplateRegistry};
use crate::themes::{Theme, ThemeRegistry};

pub const TEMPLATES_DIR: &str = "templates";
pub const THEMES_DIR: &str = "themes";
pub const RULES_FILE: &str = "rules.json";

#[derive(Debug, Clone, Default)]
pub struct AssetLibrary {
    templates: TemplateRegistry,
    themes: ThemeRegistry,
    engine: CompatibilityEngine,
    matrix: Option<CompatibilityMatrix>,
}

impl AssetLibrary {
    pub fn new(templates: TemplateRegistry, themes: ThemeRegistry, engine: CompatibilityEngine) -> Self {
        Self {
            templates,
            themes,
            engine,
            matrix: None,
        }
    }

    /// Load templates, themes and rules from an asset root.
    pub fn load_from_dir(root: &Path) -> Result<Self, AssetError> {
        let templates = TemplateRegistry::load_from_dir(&root.join(TEMPLATES_DIR))?;
        let themes = ThemeRegistry::load_from_dir(&root.join(THEMES_DIR))?;
        let rules = RuleSet::load_from_file(&root.join(RULES_FILE))?;

        info!(
            root = %root.display(),
            templates = templates.len(),
            themes = themes.len(),
            rules = rules.len(),
            "Loaded asset library"
        );
        Ok(Self::new(
            templates,
            themes,
            CompatibilityEngine::new(rules, ScoringPolicy::default()),
        ))
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn themes(&self) -> &ThemeRegistry {
        &self.themes
    }

    pub fn engine(&self) -> &CompatibilityEngine {
        &self.engine
    }

    fn invalidate(&mut self) {
        if self.matrix.take().is_some() {
            debug!("Compatibility matrix invalidated");
        }
    }

    // --- Mutation ---

    pub fn register_template(&mut self, template: Template) -> Option<Template> {
        self.invalidate();
        self.templates.register(template)
    }

    pub fn unregister_template(&mut self, id: &str) -> bool {
        let removed = self.templates.unregister(id);
        if removed {
            self.invalidate();
        }
        removed
    }

    pub fn register_theme(&mut self, theme: Theme) -> Option<Theme> {
        self.invalidate();
        self.themes.register(theme)
    }

    pub fn unregister_theme(&mut self, id: &str) -> bool {
        let removed = self.themes.unregister(id);
        if removed {
            self.invalidate();
        }
        removed
    }

    pub fn add_rule(&mut self, rule: CompatibilityRule) -> Option<CompatibilityRule> {
        self.invalidate();
        self.engine.rules_mut().insert(rule)
    }

    pub fn remove_rule(&mut self, template_id: &str, theme_id: &str) -> Option<CompatibilityRule> {
        let removed = self.engine.rules_mut().remove(template_id, theme_id);
        if removed.is_some() {
            self.invalidate();
        }
        removed
    }

    pub fn replace_rules(&mut self, rules: RuleSet) {
        self.invalidate();
        *self.engine.rules_mut() = rules;
    }

    pub fn set_policy(&mut self, policy: ScoringPolicy) {
        self.invalidate();
        self.engine.set_policy(policy);
    }

    // --- Queries ---

    pub fn test(&self, template_id: &str, theme_id: &str) -> CompatibilityResult {
        self.engine.test(&self.templates, &self.themes, template_id, theme_id)
    }

    pub fn compatible_themes(&self, template_id: &str) -> Result<Vec<&Theme>, AssetError> {
        self.engine
            .compatible_themes(&self.templates, &self.themes, template_id)
    }

    pub fn compatible_templates(&self, theme_id: &str) -> Result<Vec<&Template>, AssetError> {
        self.engine
            .compatible_templates(&self.templates, &self.themes, theme_id)
    }

    pub fn best_themes(&self, template_id: &str, limit: usize) -> Result<Vec<CompatibilityResult>, AssetError> {
        self.engine
            .best_themes(&self.templates, &self.themes, template_id, limit)
    }

    pub fn best_templates(&self, theme_id: &str, limit: usize) -> Result<Vec<CompatibilityResult>, AssetError> {
        self.engine
            .best_templates(&self.templates, &self.themes, theme_id, limit)
    }

    /// The cached matrix, computed first if a mutation dropped it.
    pub fn matrix(&mut self) -> Result<&CompatibilityMatrix, AssetError> {
        let matrix = match self.matrix.take() {
            Some(matrix) => matrix,
            None => self.engine.matrix(&self.templates, &self.themes)?,
        };
        Ok(self.matrix.insert(matrix))
    }

    pub fn cached_matrix(&self) -> Option<&CompatibilityMatrix> {
        self.matrix.as_ref()
    }

    /// Rescore every pair unconditionally. Safe to repeat.
    pub fn recompute_matrix(&mut self) -> Result<&CompatibilityMatrix, AssetError> {
        let matrix = self.engine.matrix(&self.templates, &self.themes)?;
        info!(pairs = matrix.len(), fingerprint = %matrix.fingerprint, "Recomputed compatibility matrix");
        Ok(self.matrix.insert(matrix))
    }
}
