//! Data Binding Engine - Content In, Content Out
//!
//! One engine, two document surfaces. A surface only knows how to find
//! path-tagged slots and how to read or write them; path resolution and
//! merging live here.
//!
//! `populate` never fails: a document that cannot be read is returned
//! unchanged and the failure is logged.
//!
//! Everything `extract` needs travels with the document. List-valued slots
//! keep their full list next to the value they show, and generated product
//! blocks carry every product field.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::content::{BoundValue, ContentInstance, ContentPath, Price, Product};
use crate::markup::{is_void_element, Element, Fragment, Visit};
use crate::nodes::{create_node, Document, DocumentError, NodeId, NodeType, Props};

/// Markup attribute holding a content path.
pub const CONTENT_ATTR: &str = "data-content";
/// Markup attribute holding the JSON list behind a list-valued slot.
pub const CONTENT_LIST_ATTR: &str = "data-content-list";
pub const PRODUCT_ID_ATTR: &str = "data-product-id";
pub const PRODUCT_PRICE_ATTR: &str = "data-product-price";
pub const PRODUCT_CURRENCY_ATTR: &str = "data-product-currency";
pub const PRODUCT_SKU_ATTR: &str = "data-product-sku";
pub const PRODUCT_ACTIVE_ATTR: &str = "data-product-active";
pub const PRODUCT_SORT_ORDER_ATTR: &str = "data-product-sort-order";
pub const PRODUCT_CATEGORY_ATTR: &str = "data-product-category";
pub const PRODUCT_TAGS_ATTR: &str = "data-product-tags";
pub const PRODUCT_IMAGES_ATTR: &str = "data-product-images";
pub const PRODUCT_FIELD_ATTR: &str = "data-product-field";

/// Node prop linking a generated product card to its collection node.
pub const GENERATED_BY_PROP: &str = "generatedBy";
/// Node prop holding the list behind a list-valued slot.
pub const CONTENT_LIST_PROP: &str = "contentList";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    #[error("Malformed document: {0}")]
    Malformed(#[from] DocumentError),

    #[error("Unknown content path(s): {}", .0.join(", "))]
    UnknownPaths(Vec<String>),

    #[error("Products collection node {0} is not a canvas")]
    CollectionNotCanvas(NodeId),
}

/// One value read back from a document.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Field(ContentPath, BoundValue),
    Products(Vec<Product>),
}

/// A document representation the binder can fill and read.
pub trait BindingSurface {
    type Document: Clone;

    /// Raw path strings of every tagged slot, in document order.
    fn paths(&self, document: &Self::Document) -> Result<Vec<String>, BindingError>;

    /// Write resolvable slots in place; returns how many were written.
    fn write(&self, document: &mut Self::Document, content: &ContentInstance) -> Result<usize, BindingError>;

    /// Read every tagged slot that currently shows a value.
    fn read(&self, document: &Self::Document) -> Result<Vec<SlotValue>, BindingError>;
}

#[derive(Debug, Clone, Default)]
pub struct DataBinder<S: BindingSurface> {
    surface: S,
}

impl DataBinder<MarkupSurface> {
    pub fn markup() -> Self {
        Self::new(MarkupSurface)
    }
}

impl DataBinder<NodeSurface> {
    pub fn nodes() -> Self {
        Self::new(NodeSurface)
    }
}

impl<S: BindingSurface> DataBinder<S> {
    pub fn new(surface: S) -> Self {
        Self { surface }
    }

    /// Fill `document` from `content`. Never mutates the input; slots whose
    /// path does not resolve keep their placeholder.
    pub fn populate(&self, document: &S::Document, content: &ContentInstance) -> S::Document {
        let mut populated = document.clone();
        match self.surface.write(&mut populated, content) {
            Ok(0) => document.clone(),
            Ok(written) => {
                debug!(slots = written, "Populated document");
                populated
            }
            Err(e) => {
                warn!(error = %e, "Document population failed, returning input unchanged");
                document.clone()
            }
        }
    }

    /// Read displayed values back over `baseline`. Fields with no slot in
    /// the document keep the baseline value; a products collection that
    /// shows blocks replaces the baseline products.
    pub fn extract(
        &self,
        document: &S::Document,
        baseline: &ContentInstance,
    ) -> Result<ContentInstance, BindingError> {
        let mut content = baseline.clone();
        for slot in self.surface.read(document)? {
            match slot {
                SlotValue::Field(path, value) => content.apply(&path, value),
                SlotValue::Products(products) => content.products = products,
            }
        }
        Ok(content)
    }

    /// Fail on any slot tagged with a path outside the known set.
    pub fn check_paths(&self, document: &S::Document) -> Result<(), BindingError> {
        let unknown: Vec<String> = self
            .surface
            .paths(document)?
            .into_iter()
            .filter(|raw| ContentPath::parse(raw).is_err())
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(BindingError::UnknownPaths(unknown))
        }
    }
}

fn parse_slot(raw: &str) -> Option<ContentPath> {
    match ContentPath::parse(raw) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(path = raw, error = %e, "Skipping slot with unknown content path");
            None
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn json_list(items: &[String]) -> Value {
    Value::from(items.to_vec())
}

fn list_from_json(value: &Value) -> Option<Vec<String>> {
    serde_json::from_value(value.clone()).ok()
}

fn replace_first(items: &mut Vec<String>, first: String) {
    match items.first_mut() {
        Some(existing) => *existing = first,
        None => items.push(first),
    }
}

/// Rebuild a slot value from what the document shows. List slots start
/// from their stored entries: image slots show the first entry, text slots
/// show the entries joined with ", ".
fn shown_value(stored: Option<Vec<String>>, shown: String, image: bool) -> BoundValue {
    let Some(mut items) = stored else {
        return BoundValue::Text(shown);
    };
    if image {
        replace_first(&mut items, shown);
    } else if shown != items.join(", ") {
        items = shown.split(", ").map(str::to_string).collect();
    }
    BoundValue::List(items)
}

fn price_label(product: &Product) -> Option<String> {
    let price = product.price.as_ref()?;
    Some(match &product.currency {
        Some(currency) => format!("{} {}", price, currency),
        None => price.to_string(),
    })
}

// --- Markup surface ---

/// Markup source with `data-content` attributes marking slots.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupSurface;

impl BindingSurface for MarkupSurface {
    type Document = String;

    fn paths(&self, document: &String) -> Result<Vec<String>, BindingError> {
        let fragment = Fragment::parse(document)?;
        let mut paths = Vec::new();
        fragment.visit(&mut |element| {
            if let Some(raw) = element.attr(CONTENT_ATTR) {
                paths.push(raw.to_string());
            }
            Visit::Descend
        });
        Ok(paths)
    }

    fn write(&self, document: &mut String, content: &ContentInstance) -> Result<usize, BindingError> {
        let mut fragment = Fragment::parse(document)?;
        let mut written = 0;

        fragment.visit_mut(&mut |element| {
            let Some(path) = element.attr(CONTENT_ATTR).and_then(parse_slot) else {
                return Visit::Descend;
            };
            match path {
                ContentPath::Products => {
                    if !content.products.is_empty() {
                        element.set_children(content.products.iter().map(render_product_block).collect());
                        written += 1;
                    }
                    Visit::Skip
                }
                path => match content.resolve(&path) {
                    Some(value) => {
                        if write_element(element, &value) {
                            written += 1;
                        }
                        Visit::Skip
                    }
                    None => Visit::Descend,
                },
            }
        });

        if written > 0 {
            *document = fragment.to_markup()?;
        }
        Ok(written)
    }

    fn read(&self, document: &String) -> Result<Vec<SlotValue>, BindingError> {
        let fragment = Fragment::parse(document)?;
        let mut slots = Vec::new();

        fragment.visit(&mut |element| {
            let Some(path) = element.attr(CONTENT_ATTR).and_then(parse_slot) else {
                return Visit::Descend;
            };
            match path {
                ContentPath::Products => {
                    let products: Vec<Product> = element
                        .child_elements()
                        .filter(|child| child.attr(PRODUCT_ID_ATTR).is_some())
                        .map(read_product_block)
                        .collect();
                    if !products.is_empty() {
                        slots.push(SlotValue::Products(products));
                    }
                }
                path => {
                    if let Some(value) = read_element(element) {
                        slots.push(SlotValue::Field(path, value));
                    }
                }
            }
            Visit::Skip
        });

        Ok(slots)
    }
}

/// How an element shows a bound value. Image-like elements take a URL
/// attribute, `input` takes `value`, `select` marks the matching option.
/// Other void elements show nothing; everything else, `textarea` included,
/// shows text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    Attr { name: &'static str, image: bool },
    Select,
    Text,
    Void,
}

fn slot_kind(element: &Element) -> SlotKind {
    match element.name.to_ascii_lowercase().as_str() {
        "img" | "source" => SlotKind::Attr { name: "src", image: true },
        "video" => SlotKind::Attr { name: "poster", image: true },
        "input" => SlotKind::Attr { name: "value", image: false },
        "select" => SlotKind::Select,
        name if is_void_element(name) => SlotKind::Void,
        _ => SlotKind::Text,
    }
}

/// Show `value` in `element`. False when the element cannot show it.
fn write_element(element: &mut Element, value: &BoundValue) -> bool {
    let shown = match slot_kind(element) {
        SlotKind::Attr { name, image: true } => {
            element.set_attr(name, value.first());
            true
        }
        SlotKind::Attr { name, image: false } => {
            element.set_attr(name, &value.display());
            true
        }
        SlotKind::Select => select_option(element, &value.display()),
        SlotKind::Text => {
            element.set_text(&value.display());
            true
        }
        SlotKind::Void => false,
    };
    if shown {
        match value {
            BoundValue::List(items) => element.set_attr(CONTENT_LIST_ATTR, &json_list(items).to_string()),
            BoundValue::Text(_) => element.remove_attr(CONTENT_LIST_ATTR),
        }
    }
    shown
}

fn read_element(element: &Element) -> Option<BoundValue> {
    let (shown, image) = match slot_kind(element) {
        SlotKind::Attr { name, image } => (element.attr(name).and_then(non_empty), image),
        SlotKind::Select => (selected_option(element).filter(|s| !s.is_empty()), false),
        SlotKind::Text => (non_empty(&element.text_content()), false),
        SlotKind::Void => (None, false),
    };
    let stored = element
        .attr(CONTENT_LIST_ATTR)
        .and_then(|raw| serde_json::from_str(raw).ok());
    shown.map(|shown| shown_value(stored, shown, image))
}

fn is_option(element: &Element) -> bool {
    element.name.eq_ignore_ascii_case("option")
}

fn option_value(option: &Element) -> String {
    option
        .attr("value")
        .map(str::to_string)
        .unwrap_or_else(|| option.text_content())
}

fn selected_option(select: &Element) -> Option<String> {
    let mut selected = None;
    select.visit_children(&mut |child| {
        if !is_option(child) {
            return Visit::Descend;
        }
        if selected.is_none() && child.attr("selected").is_some() {
            selected = Some(option_value(child));
        }
        Visit::Skip
    });
    selected
}

/// Mark the option showing `value` as selected. A select without such an
/// option is left alone.
fn select_option(select: &mut Element, value: &str) -> bool {
    let mut found = false;
    select.visit_children(&mut |child| {
        if !is_option(child) {
            return Visit::Descend;
        }
        found |= option_value(child) == value;
        Visit::Skip
    });
    if !found {
        return false;
    }

    let mut marked = false;
    select.visit_children_mut(&mut |child| {
        if !is_option(child) {
            return Visit::Descend;
        }
        if !marked && option_value(child) == value {
            child.set_attr("selected", "selected");
            marked = true;
        } else {
            child.remove_attr("selected");
        }
        Visit::Skip
    });
    true
}

fn render_product_block(product: &Product) -> Element {
    let mut card = Element::new("article")
        .with_attr("class", "product-card")
        .with_attr(PRODUCT_ID_ATTR, &product.id)
        .with_attr(PRODUCT_ACTIVE_ATTR, &product.is_active.to_string())
        .with_attr(PRODUCT_SORT_ORDER_ATTR, &product.sort_order.to_string());
    if let Some(price) = &product.price {
        card.set_attr(PRODUCT_PRICE_ATTR, &price.to_value().to_string());
    }
    if let Some(currency) = &product.currency {
        card.set_attr(PRODUCT_CURRENCY_ATTR, currency);
    }
    if let Some(sku) = &product.sku {
        card.set_attr(PRODUCT_SKU_ATTR, sku);
    }
    if let Some(category) = &product.category_id {
        card.set_attr(PRODUCT_CATEGORY_ATTR, category);
    }
    if !product.tags.is_empty() {
        card.set_attr(PRODUCT_TAGS_ATTR, &json_list(&product.tags).to_string());
    }
    if !product.images.is_empty() {
        card.set_attr(PRODUCT_IMAGES_ATTR, &json_list(&product.images).to_string());
    }

    if let Some(image) = product.images.first() {
        let mut img = Element::new("img")
            .with_attr("src", image)
            .with_attr("alt", &product.name)
            .with_attr(PRODUCT_FIELD_ATTR, "image");
        img.self_closing = true;
        card = card.with_child(img);
    }
    card = card.with_child(
        Element::new("h3")
            .with_attr(PRODUCT_FIELD_ATTR, "name")
            .with_text(&product.name),
    );
    if let Some(description) = product.description.as_deref().filter(|d| !d.is_empty()) {
        card = card.with_child(
            Element::new("p")
                .with_attr(PRODUCT_FIELD_ATTR, "description")
                .with_text(description),
        );
    }
    if let Some(label) = price_label(product) {
        card = card.with_child(
            Element::new("span")
                .with_attr(PRODUCT_FIELD_ATTR, "price")
                .with_text(&label),
        );
    }
    card
}

fn read_product_block(card: &Element) -> Product {
    let field_text = |field: &str| {
        card.find_by_attr(PRODUCT_FIELD_ATTR, field)
            .map(Element::text_content)
    };
    let list = |attr: &str| {
        card.attr(attr)
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .unwrap_or_default()
    };

    let mut images = list(PRODUCT_IMAGES_ATTR);
    if let Some(shown) = card
        .find_by_attr(PRODUCT_FIELD_ATTR, "image")
        .and_then(|img| img.attr("src"))
        .and_then(non_empty)
    {
        replace_first(&mut images, shown);
    }

    Product {
        id: card.attr(PRODUCT_ID_ATTR).unwrap_or_default().to_string(),
        name: field_text("name").unwrap_or_default(),
        description: field_text("description").filter(|d| !d.is_empty()),
        price: card
            .attr(PRODUCT_PRICE_ATTR)
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
            .as_ref()
            .and_then(Price::from_value),
        currency: card.attr(PRODUCT_CURRENCY_ATTR).map(str::to_string),
        sku: card.attr(PRODUCT_SKU_ATTR).map(str::to_string),
        tags: list(PRODUCT_TAGS_ATTR),
        images,
        sort_order: card
            .attr(PRODUCT_SORT_ORDER_ATTR)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or_default(),
        is_active: card.attr(PRODUCT_ACTIVE_ATTR) != Some("false"),
        category_id: card.attr(PRODUCT_CATEGORY_ATTR).map(str::to_string),
    }
}

// --- Node graph surface ---

/// Node graph with `contentPath` props marking slots.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeSurface;

impl BindingSurface for NodeSurface {
    type Document = Document;

    fn paths(&self, document: &Document) -> Result<Vec<String>, BindingError> {
        Ok(document
            .nodes()
            .filter_map(|node| node.content_path().map(str::to_string))
            .collect())
    }

    fn write(&self, document: &mut Document, content: &ContentInstance) -> Result<usize, BindingError> {
        document.check_graph()?;
        let bound: Vec<(NodeId, String)> = document
            .nodes()
            .filter_map(|node| node.content_path().map(|p| (node.id.clone(), p.to_string())))
            .collect();

        let mut written = 0;
        for (id, raw) in bound {
            let Some(path) = parse_slot(&raw) else {
                continue;
            };
            match path {
                ContentPath::Products => {
                    if !content.products.is_empty() {
                        expand_product_nodes(document, &id, &content.products)?;
                        written += 1;
                    }
                }
                path => {
                    let (Some(value), Some(node)) = (content.resolve(&path), document.get_mut(&id)) else {
                        continue;
                    };
                    let shown = match node.node_type {
                        NodeType::Image => value.first().to_string(),
                        _ => value.display(),
                    };
                    node.props
                        .insert(node.node_type.value_prop().to_string(), Value::String(shown));
                    match &value {
                        BoundValue::List(items) => {
                            node.props.insert(CONTENT_LIST_PROP.to_string(), json_list(items));
                        }
                        BoundValue::Text(_) => {
                            node.props.remove(CONTENT_LIST_PROP);
                        }
                    }
                    written += 1;
                }
            }
        }
        Ok(written)
    }

    fn read(&self, document: &Document) -> Result<Vec<SlotValue>, BindingError> {
        document.check_graph()?;
        let mut slots = Vec::new();
        for node in document.nodes() {
            let Some(path) = node.content_path().and_then(parse_slot) else {
                continue;
            };
            match path {
                ContentPath::Products => {
                    let products: Vec<Product> = node
                        .children
                        .iter()
                        .filter_map(|child| document.get(child))
                        .filter(|child| child.prop_str(GENERATED_BY_PROP) == Some(node.id.as_str()))
                        .map(|card| read_product_props(&card.props))
                        .collect();
                    if !products.is_empty() {
                        slots.push(SlotValue::Products(products));
                    }
                }
                path => {
                    if let Some(shown) = node.prop_str(node.node_type.value_prop()).and_then(non_empty) {
                        let stored = node.props.get(CONTENT_LIST_PROP).and_then(list_from_json);
                        let value = shown_value(stored, shown, node.node_type == NodeType::Image);
                        slots.push(SlotValue::Field(path, value));
                    }
                }
            }
        }
        Ok(slots)
    }
}

/// Replace previously generated cards under `collection_id` with one card
/// per product, in list order. Ids are `<collection>-product-<index>`, with
/// a numeric suffix when an authored node already holds that id.
fn expand_product_nodes(
    document: &mut Document,
    collection_id: &str,
    products: &[Product],
) -> Result<(), BindingError> {
    let collection = document.get(collection_id).ok_or_else(|| {
        BindingError::Malformed(DocumentError::UnknownNode {
            node: collection_id.to_string(),
            missing: collection_id.to_string(),
        })
    })?;
    if !collection.is_canvas {
        return Err(BindingError::CollectionNotCanvas(collection_id.to_string()));
    }

    let stale: Vec<NodeId> = collection
        .children
        .iter()
        .filter(|child| {
            document
                .get(child.as_str())
                .and_then(|n| n.prop_str(GENERATED_BY_PROP))
                == Some(collection_id)
        })
        .cloned()
        .collect();
    for id in stale {
        document.remove_subtree(&id);
    }

    for (index, product) in products.iter().enumerate() {
        let props = product_props(product, collection_id);
        let mut card = create_node(NodeType::ProductCard, props, Some("Product"), false, vec![], None);
        card.id = card_id(document, collection_id, index);
        document.append_child(collection_id, card)?;
    }
    Ok(())
}

fn card_id(document: &Document, collection_id: &str, index: usize) -> NodeId {
    let base = format!("{}-product-{}", collection_id, index);
    let mut id = base.clone();
    let mut suffix = 1;
    while document.contains(&id) {
        id = format!("{}-{}", base, suffix);
        suffix += 1;
    }
    id
}

fn product_props(product: &Product, collection_id: &str) -> Props {
    let mut props = Props::new();
    props.insert(GENERATED_BY_PROP.into(), Value::String(collection_id.to_string()));
    props.insert("productId".into(), Value::String(product.id.clone()));
    props.insert("name".into(), Value::String(product.name.clone()));
    if let Some(description) = product.description.as_deref().filter(|d| !d.is_empty()) {
        props.insert("description".into(), Value::String(description.to_string()));
    }
    if let Some(price) = &product.price {
        props.insert("price".into(), price.to_value());
    }
    if let Some(currency) = &product.currency {
        props.insert("currency".into(), Value::String(currency.clone()));
    }
    if let Some(sku) = &product.sku {
        props.insert("sku".into(), Value::String(sku.clone()));
    }
    if !product.images.is_empty() {
        props.insert("images".into(), json_list(&product.images));
    }
    if !product.tags.is_empty() {
        props.insert("tags".into(), json_list(&product.tags));
    }
    props.insert("sortOrder".into(), Value::from(product.sort_order));
    props.insert("isActive".into(), Value::Bool(product.is_active));
    if let Some(category) = &product.category_id {
        props.insert("categoryId".into(), Value::String(category.clone()));
    }
    props
}

fn read_product_props(props: &Props) -> Product {
    let text = |key: &str| props.get(key).and_then(Value::as_str).map(str::to_string);
    let list = |key: &str| props.get(key).and_then(list_from_json).unwrap_or_default();
    Product {
        id: text("productId").unwrap_or_default(),
        name: text("name").unwrap_or_default(),
        description: text("description"),
        price: props.get("price").and_then(Price::from_value),
        currency: text("currency"),
        sku: text("sku"),
        tags: list("tags"),
        images: list("images"),
        sort_order: props
            .get("sortOrder")
            .and_then(Value::as_i64)
            .and_then(|n| i32::try_from(n).ok())
            .unwrap_or_default(),
        is_active: props.get("isActive").and_then(Value::as_bool).unwrap_or(true),
        category_id: text("categoryId"),
    }
}
