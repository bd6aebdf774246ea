//! Compatibility Engine - Template/Theme Pair Scoring
//!
//! A result is a pure function of the two registries, the rule set and the
//! scoring policy. Scoring never fails for a known pair; every outcome is a
//! score plus advisory lists.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::hashing::compute_state_hash;
use crate::registry::{AssetError, AssetKind};
use crate::templates::{Template, TemplateRegistry, ANY};
use crate::themes::{Theme, ThemeRegistry};

/// Rule key for a pair, `"<templateId>:<themeId>"`.
pub fn rule_key(template_id: &str, theme_id: &str) -> String {
    format!("{}:{}", template_id, theme_id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityRule {
    pub template_id: String,
    pub theme_id: String,
    pub compatible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub limitations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

impl CompatibilityRule {
    pub fn allow(template_id: &str, theme_id: &str) -> Self {
        Self {
            template_id: template_id.to_string(),
            theme_id: theme_id.to_string(),
            compatible: true,
            reason: None,
            required_features: vec![],
            limitations: vec![],
            recommendations: vec![],
        }
    }

    pub fn deny(template_id: &str, theme_id: &str, reason: &str) -> Self {
        Self {
            compatible: false,
            reason: Some(reason.to_string()),
            ..Self::allow(template_id, theme_id)
        }
    }

    pub fn key(&self) -> String {
        rule_key(&self.template_id, &self.theme_id)
    }
}

/// Rules keyed by pair. Serialized as a plain list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CompatibilityRule>", into = "Vec<CompatibilityRule>")]
pub struct RuleSet {
    rules: BTreeMap<String, CompatibilityRule>,
}

impl From<Vec<CompatibilityRule>> for RuleSet {
    fn from(rules: Vec<CompatibilityRule>) -> Self {
        let mut set = RuleSet::default();
        for rule in rules {
            set.insert(rule);
        }
        set
    }
}

impl From<RuleSet> for Vec<CompatibilityRule> {
    fn from(set: RuleSet) -> Self {
        set.rules.into_values().collect()
    }
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON list of rules. A missing file is an empty rule set.
    pub fn load_from_file(path: &Path) -> Result<Self, AssetError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = fs::read_to_string(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| AssetError::Parse {
            path: PathBuf::from(path),
            source,
        })
    }

    /// Insert or replace the rule for its pair.
    pub fn insert(&mut self, rule: CompatibilityRule) -> Option<CompatibilityRule> {
        self.rules.insert(rule.key(), rule)
    }

    pub fn remove(&mut self, template_id: &str, theme_id: &str) -> Option<CompatibilityRule> {
        self.rules.remove(&rule_key(template_id, theme_id))
    }

    pub fn get(&self, template_id: &str, theme_id: &str) -> Option<&CompatibilityRule> {
        self.rules.get(&rule_key(template_id, theme_id))
    }

    /// Most specific rule for a pair: exact, then `t:any`, `any:h`, `any:any`.
    pub fn lookup(&self, template_id: &str, theme_id: &str) -> Option<&CompatibilityRule> {
        [
            (template_id, theme_id),
            (template_id, ANY),
            (ANY, theme_id),
            (ANY, ANY),
        ]
        .into_iter()
        .find_map(|(t, h)| self.get(t, h))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompatibilityRule> {
        self.rules.values()
    }
}

/// Named scoring constants. Defaults reproduce the published scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringPolicy {
    pub base_score: i32,
    pub missing_feature_penalty: i32,
    pub category_match_bonus: i32,
    pub category_mismatch_penalty: i32,
    pub premium_mismatch_penalty: i32,
    pub compatible_threshold: i32,
    pub max_score: i32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            base_score: 100,
            missing_feature_penalty: 20,
            category_match_bonus: 10,
            category_mismatch_penalty: 5,
            premium_mismatch_penalty: 10,
            compatible_threshold: 50,
            max_score: 100,
        }
    }
}

impl ScoringPolicy {
    pub fn load_from_file(path: &Path) -> Result<Self, AssetError> {
        let raw = fs::read_to_string(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| AssetError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityResult {
    pub template_id: String,
    pub theme_id: String,
    pub compatible: bool,
    pub score: u32,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub missing_features: Vec<String>,
    /// Set when a deny rule or an allow list rejected the pair outright.
    #[serde(default)]
    pub excluded: bool,
}

impl CompatibilityResult {
    fn new(template_id: &str, theme_id: &str) -> Self {
        Self {
            template_id: template_id.to_string(),
            theme_id: theme_id.to_string(),
            compatible: false,
            score: 0,
            issues: vec![],
            warnings: vec![],
            recommendations: vec![],
            missing_features: vec![],
            excluded: false,
        }
    }

    fn rejected(mut self, issue: String, excluded: bool) -> Self {
        self.issues.push(issue);
        self.compatible = false;
        self.score = 0;
        self.excluded = excluded;
        self
    }
}

/// Scores every template × theme pair against one rule set and policy.
#[derive(Debug, Clone, Default)]
pub struct CompatibilityEngine {
    rules: RuleSet,
    policy: ScoringPolicy,
}

impl CompatibilityEngine {
    pub fn new(rules: RuleSet, policy: ScoringPolicy) -> Self {
        Self { rules, policy }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RuleSet {
        &mut self.rules
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: ScoringPolicy) {
        self.policy = policy;
    }

    pub fn test(
        &self,
        templates: &TemplateRegistry,
        themes: &ThemeRegistry,
        template_id: &str,
        theme_id: &str,
    ) -> CompatibilityResult {
        let result = CompatibilityResult::new(template_id, theme_id);
        match (templates.get(template_id), themes.get(theme_id)) {
            (Some(template), Some(theme)) => self.score(result, template, theme),
            (None, _) => result.rejected(
                AssetError::not_found(AssetKind::Template, template_id).to_string(),
                false,
            ),
            (_, None) => result.rejected(
                AssetError::not_found(AssetKind::Theme, theme_id).to_string(),
                false,
            ),
        }
    }

    fn score(&self, mut result: CompatibilityResult, template: &Template, theme: &Theme) -> CompatibilityResult {
        let policy = &self.policy;
        let rule = self.rules.lookup(&template.id, &theme.id);

        if let Some(rule) = rule.filter(|r| !r.compatible) {
            let reason = rule
                .reason
                .clone()
                .unwrap_or_else(|| format!("Rule {} marks this pair incompatible", rule.key()));
            return result.rejected(reason, true);
        }
        if template.excludes_theme(&theme.id) {
            let issue = format!("Template {} does not list theme {} as compatible", template.id, theme.id);
            return result.rejected(issue, true);
        }
        if theme.excludes_template(&template.id) {
            let issue = format!("Theme {} does not list template {} as compatible", theme.id, template.id);
            return result.rejected(issue, true);
        }

        let mut feature_penalty = 0;
        for feature in &template.required_theme_features {
            if !theme.supports(feature) {
                feature_penalty += policy.missing_feature_penalty;
                result.missing_features.push(feature.clone());
                result.warnings.push(format!("Theme does not provide required feature: {}", feature));
            }
        }

        let affinity = if template.category == theme.category {
            result
                .recommendations
                .push(format!("Template and theme share the {} category", theme.category));
            policy.category_match_bonus
        } else {
            result.warnings.push(format!(
                "Category mismatch: template is {}, theme is {}",
                template.category, theme.category
            ));
            -policy.category_mismatch_penalty
        };

        let premium_penalty = if template.premium && !theme.premium {
            result
                .warnings
                .push("Premium template with a standard theme; some features may be limited".to_string());
            policy.premium_mismatch_penalty
        } else {
            0
        };

        if let Some(rule) = rule {
            result.warnings.extend(rule.limitations.iter().cloned());
        }

        // The affinity bonus restores headroom up to the ceiling; it never
        // lifts a pair above it, so a premium mismatch always costs its full
        // penalty.
        let score = ((policy.base_score + affinity).min(policy.max_score) - premium_penalty - feature_penalty)
            .clamp(0, policy.max_score.max(0));
        result.score = score as u32;
        result.compatible = score >= policy.compatible_threshold;

        if let Some(rule) = rule.filter(|_| result.compatible) {
            result.recommendations.extend(rule.recommendations.iter().cloned());
        }
        result
    }

    /// Themes scored compatible with `template_id`, in registry order.
    pub fn compatible_themes<'a>(
        &self,
        templates: &TemplateRegistry,
        themes: &'a ThemeRegistry,
        template_id: &str,
    ) -> Result<Vec<&'a Theme>, AssetError> {
        templates.require(template_id)?;
        Ok(themes
            .all()
            .into_iter()
            .filter(|theme| self.test(templates, themes, template_id, &theme.id).compatible)
            .collect())
    }

    /// Templates scored compatible with `theme_id`, in registry order.
    pub fn compatible_templates<'a>(
        &self,
        templates: &'a TemplateRegistry,
        themes: &ThemeRegistry,
        theme_id: &str,
    ) -> Result<Vec<&'a Template>, AssetError> {
        themes.require(theme_id)?;
        Ok(templates
            .all()
            .into_iter()
            .filter(|template| self.test(templates, themes, &template.id, theme_id).compatible)
            .collect())
    }

    /// Highest-scoring themes for a template. Ties keep registry order.
    pub fn best_themes(
        &self,
        templates: &TemplateRegistry,
        themes: &ThemeRegistry,
        template_id: &str,
        limit: usize,
    ) -> Result<Vec<CompatibilityResult>, AssetError> {
        templates.require(template_id)?;
        let results = themes
            .all()
            .into_iter()
            .map(|theme| self.test(templates, themes, template_id, &theme.id))
            .collect();
        Ok(rank(results, limit))
    }

    /// Highest-scoring templates for a theme. Ties keep registry order.
    pub fn best_templates(
        &self,
        templates: &TemplateRegistry,
        themes: &ThemeRegistry,
        theme_id: &str,
        limit: usize,
    ) -> Result<Vec<CompatibilityResult>, AssetError> {
        themes.require(theme_id)?;
        let results = templates
            .all()
            .into_iter()
            .map(|template| self.test(templates, themes, &template.id, theme_id))
            .collect();
        Ok(rank(results, limit))
    }

    /// Score every pair, stamped with a fingerprint of the inputs.
    pub fn matrix(
        &self,
        templates: &TemplateRegistry,
        themes: &ThemeRegistry,
    ) -> Result<CompatibilityMatrix, serde_json::Error> {
        let all_templates = templates.all();
        let all_themes = themes.all();

        let state = MatrixState {
            templates: &all_templates,
            themes: &all_themes,
            rules: &self.rules,
            policy: &self.policy,
        };
        let fingerprint = compute_state_hash(&state, crate::ENGINE_VERSION)?;

        let entries: Vec<CompatibilityResult> = all_templates
            .iter()
            .flat_map(|template| {
                all_themes
                    .iter()
                    .map(move |theme| self.test(templates, themes, &template.id, &theme.id))
            })
            .collect();

        debug!(pairs = entries.len(), fingerprint = %fingerprint, "Computed compatibility matrix");
        Ok(CompatibilityMatrix { fingerprint, entries })
    }
}

#[derive(Serialize)]
struct MatrixState<'a> {
    templates: &'a [&'a Template],
    themes: &'a [&'a Theme],
    rules: &'a RuleSet,
    policy: &'a ScoringPolicy,
}

fn rank(mut results: Vec<CompatibilityResult>, limit: usize) -> Vec<CompatibilityResult> {
    results.retain(|r| r.score > 0);
    results.sort_by(|a, b| b.score.cmp(&a.score));
    results.truncate(limit);
    results
}

/// Every pair's result, in template-major registry order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityMatrix {
    pub fingerprint: String,
    pub entries: Vec<CompatibilityResult>,
}

impl CompatibilityMatrix {
    pub fn get(&self, template_id: &str, theme_id: &str) -> Option<&CompatibilityResult> {
        self.entries
            .iter()
            .find(|e| e.template_id == template_id && e.theme_id == theme_id)
    }

    pub fn compatible_pairs(&self) -> impl Iterator<Item = &CompatibilityResult> {
        self.entries.iter().filter(|e| e.compatible)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
