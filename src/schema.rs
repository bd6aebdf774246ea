//! Content Schema - Structural Validation of Raw Content
//!
//! Every field is checked and every mismatch recorded; validation never
//! stops at the first violation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::content::{
    CatalogueInfo, ContentInstance, Price, Product, ProductCategory, Profile, SocialLinks,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// Dotted location, e.g. `products[2].price`.
    pub path: String,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Content failed schema validation with {} violation(s): {}", .violations.len(), summarize(.violations))]
pub struct ValidationError {
    pub violations: Vec<SchemaViolation>,
}

fn summarize(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.path, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate raw content and build the typed instance.
pub fn validate(raw: &Value) -> Result<ContentInstance, ValidationError> {
    let mut checker = SchemaChecker::default();
    let content = checker.content(raw);
    if checker.violations.is_empty() {
        Ok(content)
    } else {
        Err(ValidationError {
            violations: checker.violations,
        })
    }
}

pub fn is_valid(raw: &Value) -> bool {
    validate(raw).is_ok()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Default)]
struct SchemaChecker {
    violations: Vec<SchemaViolation>,
}

impl SchemaChecker {
    fn mismatch(&mut self, path: &str, expected: &str, actual: &Value) {
        self.violations.push(SchemaViolation {
            path: path.to_string(),
            message: format!("expected {}", expected),
            expected: Some(expected.to_string()),
            actual: Some(type_name(actual).to_string()),
        });
    }

    fn missing(&mut self, path: &str, expected: &str) {
        self.violations.push(SchemaViolation {
            path: path.to_string(),
            message: "required field is missing".to_string(),
            expected: Some(expected.to_string()),
            actual: None,
        });
    }

    fn object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.mismatch(path, "object", other);
                None
            }
        }
    }

    fn required_string(&mut self, obj: &Map<String, Value>, parent: &str, key: &str) -> String {
        let path = join(parent, key);
        match obj.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::String(_)) => {
                self.violations.push(SchemaViolation {
                    path,
                    message: "must not be empty".to_string(),
                    expected: Some("non-empty string".to_string()),
                    actual: Some("empty string".to_string()),
                });
                String::new()
            }
            Some(other) => {
                self.mismatch(&path, "string", other);
                String::new()
            }
            None => {
                self.missing(&path, "string");
                String::new()
            }
        }
    }

    fn optional_string(&mut self, obj: &Map<String, Value>, parent: &str, key: &str) -> Option<String> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.mismatch(&join(parent, key), "string", other);
                None
            }
        }
    }

    fn bool_or(&mut self, obj: &Map<String, Value>, parent: &str, key: &str, default: bool) -> bool {
        match obj.get(key) {
            None | Some(Value::Null) => default,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                self.mismatch(&join(parent, key), "boolean", other);
                default
            }
        }
    }

    fn integer(&mut self, obj: &Map<String, Value>, parent: &str, key: &str) -> Option<i32> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => match value.as_i64().and_then(|n| i32::try_from(n).ok()) {
                Some(n) => Some(n),
                None => {
                    self.mismatch(&join(parent, key), "integer", value);
                    None
                }
            },
        }
    }

    fn string_list(&mut self, obj: &Map<String, Value>, parent: &str, key: &str) -> Vec<String> {
        let path = join(parent, key);
        match obj.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| match item {
                    Value::String(s) => Some(s.clone()),
                    other => {
                        self.mismatch(&format!("{}[{}]", path, i), "string", other);
                        None
                    }
                })
                .collect(),
            Some(other) => {
                self.mismatch(&path, "array", other);
                Vec::new()
            }
        }
    }

    fn list<'v>(&mut self, obj: &'v Map<String, Value>, key: &str) -> &'v [Value] {
        match obj.get(key) {
            None | Some(Value::Null) => &[],
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.mismatch(key, "array", other);
                &[]
            }
        }
    }

    fn price(&mut self, obj: &Map<String, Value>, parent: &str) -> Option<Price> {
        let value = obj.get("price")?;
        match value {
            Value::Null => None,
            Value::Number(_) => Price::from_value(value),
            Value::String(s) if s.trim().parse::<f64>().is_ok() => Price::from_value(value),
            other => {
                self.mismatch(&join(parent, "price"), "number or numeric string", other);
                None
            }
        }
    }

    fn content(&mut self, raw: &Value) -> ContentInstance {
        let Some(root) = self.object(raw, "$") else {
            return ContentInstance::default();
        };

        let catalogue = match root.get("catalogue") {
            Some(value) => self.catalogue(value),
            None => {
                self.missing("catalogue", "object");
                CatalogueInfo::default()
            }
        };

        let profile = match root.get("profile") {
            None | Some(Value::Null) => Profile::default(),
            Some(value) => self.profile(value),
        };

        let products = self
            .list(root, "products")
            .iter()
            .enumerate()
            .map(|(i, value)| self.product(value, &format!("products[{}]", i)))
            .collect();

        let categories = self
            .list(root, "categories")
            .iter()
            .enumerate()
            .map(|(i, value)| self.category(value, &format!("categories[{}]", i)))
            .collect();

        ContentInstance {
            catalogue,
            profile,
            products,
            categories,
        }
    }

    fn catalogue(&mut self, value: &Value) -> CatalogueInfo {
        let path = "catalogue";
        let Some(obj) = self.object(value, path) else {
            return CatalogueInfo::default();
        };
        let settings = match obj.get("settings") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                self.mismatch("catalogue.settings", "object", other);
                Map::new()
            }
        };
        CatalogueInfo {
            id: self.required_string(obj, path, "id"),
            name: self.required_string(obj, path, "name"),
            description: self.optional_string(obj, path, "description"),
            tagline: self.optional_string(obj, path, "tagline"),
            year: self.integer(obj, path, "year"),
            is_public: self.bool_or(obj, path, "isPublic", false),
            settings,
        }
    }

    fn profile(&mut self, value: &Value) -> Profile {
        let path = "profile";
        let Some(obj) = self.object(value, path) else {
            return Profile::default();
        };
        let social_links = match obj.get("socialLinks") {
            None | Some(Value::Null) => SocialLinks::default(),
            Some(links) => {
                let links_path = "profile.socialLinks";
                match self.object(links, links_path) {
                    Some(links) => SocialLinks {
                        facebook: self.optional_string(links, links_path, "facebook"),
                        instagram: self.optional_string(links, links_path, "instagram"),
                        twitter: self.optional_string(links, links_path, "twitter"),
                        linkedin: self.optional_string(links, links_path, "linkedin"),
                    },
                    None => SocialLinks::default(),
                }
            }
        };
        Profile {
            company_name: self.optional_string(obj, path, "companyName"),
            contact_name: self.optional_string(obj, path, "contactName"),
            email: self.optional_string(obj, path, "email"),
            phone: self.optional_string(obj, path, "phone"),
            website: self.optional_string(obj, path, "website"),
            address: self.optional_string(obj, path, "address"),
            description: self.optional_string(obj, path, "description"),
            logo_url: self.optional_string(obj, path, "logoUrl"),
            social_links,
        }
    }

    fn product(&mut self, value: &Value, path: &str) -> Product {
        let Some(obj) = self.object(value, path) else {
            return Product::default();
        };
        Product {
            id: self.required_string(obj, path, "id"),
            name: self.required_string(obj, path, "name"),
            description: self.optional_string(obj, path, "description"),
            price: self.price(obj, path),
            currency: self.optional_string(obj, path, "currency"),
            sku: self.optional_string(obj, path, "sku"),
            tags: self.string_list(obj, path, "tags"),
            images: self.string_list(obj, path, "images"),
            sort_order: self.integer(obj, path, "sortOrder").unwrap_or(0),
            is_active: self.bool_or(obj, path, "isActive", true),
            category_id: self.optional_string(obj, path, "categoryId"),
        }
    }

    fn category(&mut self, value: &Value, path: &str) -> ProductCategory {
        let Some(obj) = self.object(value, path) else {
            return ProductCategory::default();
        };
        ProductCategory {
            id: self.required_string(obj, path, "id"),
            name: self.required_string(obj, path, "name"),
            description: self.optional_string(obj, path, "description"),
            color: self.optional_string(obj, path, "color"),
            sort_order: self.integer(obj, path, "sortOrder").unwrap_or(0),
        }
    }
}

fn join(parent: &str, key: &str) -> String {
    format!("{}.{}", parent, key)
}
