//! Content Mapper - Persisted Records to Content Instances
//!
//! Reshapes only. Prices pass through as stored, absent collections become
//! empty lists, and nothing is validated here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::{
    CatalogueInfo, ContentInstance, Price, Product, ProductCategory, Profile, SocialLinks,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedCatalogue {
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
    pub settings: Option<Value>,
    #[serde(default)]
    pub products: Option<Vec<PersistedProduct>>,
    #[serde(default)]
    pub categories: Option<Vec<PersistedCategory>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedProduct {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Decimal column as delivered by the storage layer.
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedProfile {
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
    pub facebook_url: Option<String>,
    #[serde(default)]
    pub instagram_url: Option<String>,
    #[serde(default)]
    pub twitter_url: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
}

pub fn map_to_standardized(
    catalogue: &PersistedCatalogue,
    profile: Option<&PersistedProfile>,
) -> ContentInstance {
    let settings = match &catalogue.settings {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    ContentInstance {
        catalogue: CatalogueInfo {
            id: catalogue.id.clone(),
            name: catalogue.name.clone(),
            description: catalogue.description.clone(),
            tagline: catalogue.tagline.clone(),
            year: catalogue.year,
            is_public: catalogue.is_public,
            settings,
        },
        profile: profile.map(map_profile).unwrap_or_default(),
        products: catalogue
            .products
            .iter()
            .flatten()
            .map(map_product)
            .collect(),
        categories: catalogue
            .categories
            .iter()
            .flatten()
            .map(map_category)
            .collect(),
    }
}

fn map_profile(profile: &PersistedProfile) -> Profile {
    Profile {
        company_name: profile.company_name.clone(),
        contact_name: profile.contact_name.clone(),
        email: profile.email.clone(),
        phone: profile.phone.clone(),
        website: profile.website.clone(),
        address: profile.address.clone(),
        description: profile.description.clone(),
        logo_url: profile.logo_url.clone(),
        social_links: SocialLinks {
            facebook: profile.facebook_url.clone(),
            instagram: profile.instagram_url.clone(),
            twitter: profile.twitter_url.clone(),
            linkedin: profile.linkedin_url.clone(),
        },
    }
}

fn map_product(product: &PersistedProduct) -> Product {
    Product {
        id: product.id.clone(),
        name: product.name.clone(),
        description: product.description.clone(),
        price: product.price.as_ref().and_then(Price::from_value),
        currency: product.currency.clone(),
        sku: product.sku.clone(),
        tags: product.tags.clone().unwrap_or_default(),
        images: product.images.clone().unwrap_or_default(),
        sort_order: product.sort_order.unwrap_or(0),
        is_active: product.is_active.unwrap_or(true),
        category_id: product.category_id.clone(),
    }
}

fn map_category(category: &PersistedCategory) -> ProductCategory {
    ProductCategory {
        id: category.id.clone(),
        name: category.name.clone(),
        description: category.description.clone(),
        color: category.color.clone(),
        sort_order: category.sort_order.unwrap_or(0),
    }
}
