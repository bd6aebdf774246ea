//! Content Model - Catalogue, Profile, Products and Categories
//!
//! Content paths are a closed set. A path string that is not listed in
//! [`ContentPath::all`] is rejected by [`ContentPath::parse`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentInstance {
    pub catalogue: CatalogueInfo,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub categories: Vec<ProductCategory>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub social_links: SocialLinks,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default)]
    pub facebook: Option<String>,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
}

/// Price exactly as stored: a JSON number or a decimal string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Number(Number),
    Decimal(String),
}

impl Price {
    /// Pass a stored value through; `null` means no price.
    pub fn from_value(value: &Value) -> Option<Price> {
        match value {
            Value::Null => None,
            Value::Number(n) => Some(Price::Number(n.clone())),
            Value::String(s) => Some(Price::Decimal(s.clone())),
            other => Some(Price::Decimal(other.to_string())),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Price::Number(n) => Value::Number(n.clone()),
            Price::Decimal(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Number(n) => write!(f, "{}", n),
            Price::Decimal(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl ContentInstance {
    /// Products whose `category_id` names no category in this instance.
    pub fn dangling_category_refs(&self) -> Vec<&Product> {
        self.products
            .iter()
            .filter(|p| {
                p.category_id
                    .as_deref()
                    .is_some_and(|cid| !self.categories.iter().any(|c| c.id == cid))
            })
            .collect()
    }

    /// Copy with only active products, for callers that filter before binding.
    pub fn with_active_products(&self) -> ContentInstance {
        let mut copy = self.clone();
        copy.products.retain(|p| p.is_active);
        copy
    }

    /// Look up a scalar path. Empty strings and empty lists are unresolved.
    pub fn resolve(&self, path: &ContentPath) -> Option<BoundValue> {
        let text = |v: &Option<String>| v.as_deref().and_then(BoundValue::text);
        match path {
            ContentPath::Catalogue(field) => match field {
                CatalogueField::Name => BoundValue::text(&self.catalogue.name),
                CatalogueField::Description => text(&self.catalogue.description),
                CatalogueField::Tagline => text(&self.catalogue.tagline),
                CatalogueField::Year => self.catalogue.year.map(|y| BoundValue::Text(y.to_string())),
            },
            ContentPath::Setting(key) => {
                let mut current = self.catalogue.settings.get(key.segments()[0])?;
                for segment in &key.segments()[1..] {
                    current = current.get(segment)?;
                }
                BoundValue::from_json(current)
            }
            ContentPath::Profile(field) => text(self.profile.field(*field)),
            ContentPath::Social(network) => text(self.profile.social_links.field(*network)),
            ContentPath::Products => None,
        }
    }

    /// Write a scalar path in place. Values that do not fit the field
    /// (e.g. a non-numeric year) leave the field as it was.
    pub fn apply(&mut self, path: &ContentPath, value: BoundValue) {
        match path {
            ContentPath::Catalogue(field) => match field {
                CatalogueField::Name => self.catalogue.name = value.into_text(),
                CatalogueField::Description => self.catalogue.description = Some(value.into_text()),
                CatalogueField::Tagline => self.catalogue.tagline = Some(value.into_text()),
                CatalogueField::Year => {
                    if let Ok(year) = value.into_text().trim().parse() {
                        self.catalogue.year = Some(year);
                    }
                }
            },
            ContentPath::Setting(key) => {
                let segments = key.segments();
                let Some((last, parents)) = segments.split_last() else {
                    return;
                };
                let mut map = &mut self.catalogue.settings;
                for segment in parents {
                    let entry = map
                        .entry(segment.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if !entry.is_object() {
                        *entry = Value::Object(Map::new());
                    }
                    let Value::Object(inner) = entry else {
                        return;
                    };
                    map = inner;
                }
                map.insert(last.to_string(), value.into_json());
            }
            ContentPath::Profile(field) => *self.profile.field_mut(*field) = Some(value.into_text()),
            ContentPath::Social(network) => {
                *self.profile.social_links.field_mut(*network) = Some(value.into_text())
            }
            ContentPath::Products => {}
        }
    }
}

impl Profile {
    fn field(&self, field: ProfileField) -> &Option<String> {
        match field {
            ProfileField::CompanyName => &self.company_name,
            ProfileField::ContactName => &self.contact_name,
            ProfileField::Email => &self.email,
            ProfileField::Phone => &self.phone,
            ProfileField::Website => &self.website,
            ProfileField::Address => &self.address,
            ProfileField::Description => &self.description,
            ProfileField::LogoUrl => &self.logo_url,
        }
    }

    fn field_mut(&mut self, field: ProfileField) -> &mut Option<String> {
        match field {
            ProfileField::CompanyName => &mut self.company_name,
            ProfileField::ContactName => &mut self.contact_name,
            ProfileField::Email => &mut self.email,
            ProfileField::Phone => &mut self.phone,
            ProfileField::Website => &mut self.website,
            ProfileField::Address => &mut self.address,
            ProfileField::Description => &mut self.description,
            ProfileField::LogoUrl => &mut self.logo_url,
        }
    }
}

impl SocialLinks {
    fn field(&self, network: SocialField) -> &Option<String> {
        match network {
            SocialField::Facebook => &self.facebook,
            SocialField::Instagram => &self.instagram,
            SocialField::Twitter => &self.twitter,
            SocialField::Linkedin => &self.linkedin,
        }
    }

    fn field_mut(&mut self, network: SocialField) -> &mut Option<String> {
        match network {
            SocialField::Facebook => &mut self.facebook,
            SocialField::Instagram => &mut self.instagram,
            SocialField::Twitter => &mut self.twitter,
            SocialField::Linkedin => &mut self.linkedin,
        }
    }
}

/// A value resolved from content, ready to be written into a document.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Text(String),
    List(Vec<String>),
}

impl BoundValue {
    fn text(s: &str) -> Option<BoundValue> {
        (!s.is_empty()).then(|| BoundValue::Text(s.to_string()))
    }

    fn from_json(value: &Value) -> Option<BoundValue> {
        match value {
            Value::String(s) => BoundValue::text(s),
            Value::Number(n) => Some(BoundValue::Text(n.to_string())),
            Value::Bool(b) => Some(BoundValue::Text(b.to_string())),
            Value::Array(items) => {
                let list: Vec<String> = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect();
                (!list.is_empty()).then_some(BoundValue::List(list))
            }
            Value::Null | Value::Object(_) => None,
        }
    }

    /// First entry of a list, or the text itself.
    pub fn first(&self) -> &str {
        match self {
            BoundValue::Text(s) => s,
            BoundValue::List(items) => items.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// Display form: lists are joined with ", ".
    pub fn display(&self) -> String {
        match self {
            BoundValue::Text(s) => s.clone(),
            BoundValue::List(items) => items.join(", "),
        }
    }

    fn into_text(self) -> String {
        match self {
            BoundValue::Text(s) => s,
            BoundValue::List(items) => items.join(", "),
        }
    }

    fn into_json(self) -> Value {
        match self {
            BoundValue::Text(s) => Value::String(s),
            BoundValue::List(items) => Value::Array(items.into_iter().map(Value::String).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown content path: {0}")]
pub struct UnknownPath(pub String);

macro_rules! path_fields {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            fn from_segment(s: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|f| f.as_str() == s)
            }
        }
    };
}

path_fields!(CatalogueField {
    Name => "name",
    Description => "description",
    Tagline => "tagline",
    Year => "year",
});

path_fields!(SettingKey {
    ContactEmail => "contactDetails.email",
    ContactPhone => "contactDetails.phone",
    ContactWebsite => "contactDetails.website",
    ContactAddress => "contactDetails.address",
    CoverImage => "coverImage",
    Gallery => "gallery",
    FooterText => "footerText",
    Currency => "currency",
});

path_fields!(ProfileField {
    CompanyName => "companyName",
    ContactName => "contactName",
    Email => "email",
    Phone => "phone",
    Website => "website",
    Address => "address",
    Description => "description",
    LogoUrl => "logoUrl",
});

path_fields!(SocialField {
    Facebook => "facebook",
    Instagram => "instagram",
    Twitter => "twitter",
    Linkedin => "linkedin",
});

impl SettingKey {
    fn segments(self) -> Vec<&'static str> {
        self.as_str().split('.').collect()
    }
}

/// Dotted address of a bindable piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentPath {
    Catalogue(CatalogueField),
    Setting(SettingKey),
    Profile(ProfileField),
    Social(SocialField),
    /// The products collection; expanded rather than written.
    Products,
}

impl ContentPath {
    pub fn parse(path: &str) -> Result<ContentPath, UnknownPath> {
        let unknown = || UnknownPath(path.to_string());
        if path == "products" {
            return Ok(ContentPath::Products);
        }
        let (head, rest) = path.split_once('.').ok_or_else(unknown)?;
        let parsed = match head {
            "catalogue" => match rest.strip_prefix("settings.") {
                Some(key) => SettingKey::from_segment(key).map(ContentPath::Setting),
                None => CatalogueField::from_segment(rest).map(ContentPath::Catalogue),
            },
            "profile" => match rest.strip_prefix("socialLinks.") {
                Some(network) => SocialField::from_segment(network).map(ContentPath::Social),
                None => ProfileField::from_segment(rest).map(ContentPath::Profile),
            },
            _ => None,
        };
        parsed.ok_or_else(unknown)
    }

    /// Every bindable path.
    pub fn all() -> Vec<ContentPath> {
        let mut paths = Vec::new();
        paths.extend(CatalogueField::ALL.iter().copied().map(ContentPath::Catalogue));
        paths.extend(SettingKey::ALL.iter().copied().map(ContentPath::Setting));
        paths.extend(ProfileField::ALL.iter().copied().map(ContentPath::Profile));
        paths.extend(SocialField::ALL.iter().copied().map(ContentPath::Social));
        paths.push(ContentPath::Products);
        paths
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentPath::Catalogue(field) => write!(f, "catalogue.{}", field.as_str()),
            ContentPath::Setting(key) => write!(f, "catalogue.settings.{}", key.as_str()),
            ContentPath::Profile(field) => write!(f, "profile.{}", field.as_str()),
            ContentPath::Social(network) => write!(f, "profile.socialLinks.{}", network.as_str()),
            ContentPath::Products => f.write_str("products"),
        }
    }
}

impl std::str::FromStr for ContentPath {
    type Err = UnknownPath;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentPath::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ContentInstance {
        let mut content = ContentInstance::default();
        content.catalogue.name = "Spring Range".into();
        content.catalogue.year = Some(2025);
        content.catalogue.settings = json!({
            "contactDetails": { "email": "sales@acme.test" },
            "gallery": ["a.jpg", "b.jpg"],
        })
        .as_object()
        .cloned()
        .unwrap();
        content.profile.company_name = Some("Acme".into());
        content.profile.social_links.instagram = Some("@acme".into());
        content
    }

    #[test]
    fn test_every_path_round_trips_through_display() {
        for path in ContentPath::all() {
            assert_eq!(ContentPath::parse(&path.to_string()), Ok(path));
        }
    }

    #[test]
    fn test_unknown_paths_rejected() {
        for bad in ["profile.companyname", "catalogue", "catalogue.settings.nope", "orders.total", ""] {
            assert_eq!(ContentPath::parse(bad), Err(UnknownPath(bad.to_string())));
        }
    }

    #[test]
    fn test_resolve_nested_setting_and_list() {
        let content = sample();
        let email = ContentPath::parse("catalogue.settings.contactDetails.email").unwrap();
        assert_eq!(
            content.resolve(&email),
            Some(BoundValue::Text("sales@acme.test".into()))
        );
        let gallery = ContentPath::parse("catalogue.settings.gallery").unwrap();
        assert_eq!(content.resolve(&gallery).unwrap().first(), "a.jpg");
        assert_eq!(
            content.resolve(&ContentPath::Catalogue(CatalogueField::Year)),
            Some(BoundValue::Text("2025".into()))
        );
    }

    #[test]
    fn test_empty_values_are_unresolved() {
        let content = ContentInstance::default();
        for path in ContentPath::all() {
            assert_eq!(content.resolve(&path), None, "{}", path);
        }
    }

    #[test]
    fn test_apply_creates_nested_settings() {
        let mut content = ContentInstance::default();
        let phone = ContentPath::parse("catalogue.settings.contactDetails.phone").unwrap();
        content.apply(&phone, BoundValue::Text("555-0100".into()));
        assert_eq!(
            content.catalogue.settings["contactDetails"]["phone"],
            json!("555-0100")
        );
        assert_eq!(content.resolve(&phone), Some(BoundValue::Text("555-0100".into())));
    }

    #[test]
    fn test_apply_ignores_non_numeric_year() {
        let mut content = sample();
        content.apply(
            &ContentPath::Catalogue(CatalogueField::Year),
            BoundValue::Text("soon".into()),
        );
        assert_eq!(content.catalogue.year, Some(2025));
    }

    #[test]
    fn test_dangling_category_refs() {
        let mut content = sample();
        content.categories.push(ProductCategory {
            id: "c1".into(),
            name: "Chairs".into(),
            ..Default::default()
        });
        content.products.push(Product {
            id: "p1".into(),
            category_id: Some("c1".into()),
            ..Default::default()
        });
        content.products.push(Product {
            id: "p2".into(),
            category_id: Some("c9".into()),
            ..Default::default()
        });
        let dangling: Vec<_> = content.dangling_category_refs().into_iter().map(|p| p.id.as_str()).collect();
        assert_eq!(dangling, vec!["p2"]);
    }
}
