//! Document Node Model - Typed Page Graphs
//!
//! A document is a flat map of node id to node, rooted at [`ROOT_NODE_ID`].
//! Ownership runs through `children`; `parent` is a back-reference used for
//! traversal only.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use uuid::Uuid;

pub type NodeId = String;
pub type Props = Map<String, Value>;

/// Id of the distinguished root node of every document.
pub const ROOT_NODE_ID: &str = "ROOT";

/// Prop carrying the content path a node is bound to.
pub const CONTENT_PATH_PROP: &str = "contentPath";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("Document has no root node")]
    MissingRoot,

    #[error("Root node must not have a parent (found {0})")]
    RootHasParent(NodeId),

    #[error("Node {node} references unknown node {missing}")]
    UnknownNode { node: NodeId, missing: NodeId },

    #[error("Node {node} names parent {parent}, which does not list it as a child")]
    ParentMismatch { node: NodeId, parent: NodeId },

    #[error("Node {parent} lists child {child}, whose parent is not {parent}")]
    ChildMismatch { parent: NodeId, child: NodeId },

    #[error("Node {0} is not a canvas but has children")]
    LeafWithChildren(NodeId),

    #[error("Node {0} has no parent but is not the root")]
    MultipleRoots(NodeId),

    #[error("Cycle detected at node {0}")]
    Cycle(NodeId),

    #[error("Node {0} is not reachable from the root")]
    Unreachable(NodeId),

    #[error("Node id {0} is already in use")]
    DuplicateNode(NodeId),

    #[error("Invalid document JSON: {0}")]
    Json(String),

    #[error("Invalid markup at byte {position}: {message}")]
    Markup { message: String, position: u64 },
}

/// Closed set of node kinds an editing surface knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    Container,
    Text,
    Heading,
    Image,
    Button,
    Grid,
    Divider,
    Spacer,
    ProductCard,
}

impl NodeType {
    /// Prop that holds the displayed value for a bound node.
    pub fn value_prop(self) -> &'static str {
        match self {
            NodeType::Image => "src",
            _ => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Filled from the document key on decode.
    #[serde(skip)]
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub is_canvas: bool,
    #[serde(default)]
    pub props: Props,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, rename = "nodes")]
    pub children: Vec<NodeId>,
    #[serde(default)]
    pub parent: Option<NodeId>,
}

impl Node {
    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }

    pub fn content_path(&self) -> Option<&str> {
        self.prop_str(CONTENT_PATH_PROP)
    }

    /// Tag this node with a content path.
    pub fn bound_to(mut self, path: &str) -> Self {
        self.props
            .insert(CONTENT_PATH_PROP.to_string(), Value::String(path.to_string()));
        self
    }
}

/// A single page: node id -> node, keyed by [`ROOT_NODE_ID`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<NodeId, Node>", into = "BTreeMap<NodeId, Node>")]
pub struct Document {
    nodes: BTreeMap<NodeId, Node>,
}

impl TryFrom<BTreeMap<NodeId, Node>> for Document {
    type Error = DocumentError;

    fn try_from(mut nodes: BTreeMap<NodeId, Node>) -> Result<Self, Self::Error> {
        if !nodes.contains_key(ROOT_NODE_ID) {
            return Err(DocumentError::MissingRoot);
        }
        for (id, node) in nodes.iter_mut() {
            node.id = id.clone();
        }
        Ok(Self { nodes })
    }
}

impl From<Document> for BTreeMap<NodeId, Node> {
    fn from(doc: Document) -> Self {
        doc.nodes
    }
}

impl Document {
    /// Start a document from its root node; the root's id is forced to `ROOT`.
    pub fn new(mut root: Node) -> Self {
        root.id = ROOT_NODE_ID.to_string();
        root.parent = None;
        let mut nodes = BTreeMap::new();
        nodes.insert(root.id.clone(), root);
        Self { nodes }
    }

    /// Assemble a document from pre-keyed nodes without checking the graph.
    pub fn from_nodes(nodes: BTreeMap<NodeId, Node>) -> Self {
        let nodes = nodes
            .into_iter()
            .map(|(id, mut node)| {
                node.id = id.clone();
                (id, node)
            })
            .collect();
        Self { nodes }
    }

    pub fn from_json(value: &Value) -> Result<Self, DocumentError> {
        serde_json::from_value(value.clone()).map_err(|e| DocumentError::Json(e.to_string()))
    }

    pub fn from_json_str(source: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(source).map_err(|e| DocumentError::Json(e.to_string()))
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.get(ROOT_NODE_ID)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Insert or replace a node under its own id. No graph checks.
    pub fn insert(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Attach `node` as the last child of `parent_id`, keeping both links.
    /// Fails if `node.id` is already taken.
    pub fn append_child(&mut self, parent_id: &str, mut node: Node) -> Result<(), DocumentError> {
        if self.nodes.contains_key(&node.id) {
            return Err(DocumentError::DuplicateNode(node.id));
        }
        let parent = self
            .nodes
            .get_mut(parent_id)
            .ok_or_else(|| DocumentError::UnknownNode {
                node: node.id.clone(),
                missing: parent_id.to_string(),
            })?;
        if !parent.is_canvas {
            return Err(DocumentError::LeafWithChildren(parent_id.to_string()));
        }
        parent.children.push(node.id.clone());
        node.parent = Some(parent_id.to_string());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Detach a node and its whole subtree. Returns the number of nodes removed.
    pub fn remove_subtree(&mut self, id: &str) -> usize {
        let Some(node) = self.nodes.remove(id) else {
            return 0;
        };
        if let Some(parent) = node.parent.as_deref().and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|c| c != id);
        }
        let mut removed = 1;
        for child in node.children {
            removed += self.remove_subtree(&child);
        }
        removed
    }

    /// Verify the graph invariants: one root, bidirectional parent/child
    /// links, leaves without children, no cycles, everything reachable.
    pub fn check_graph(&self) -> Result<(), DocumentError> {
        let root = self.root().ok_or(DocumentError::MissingRoot)?;
        if let Some(parent) = &root.parent {
            return Err(DocumentError::RootHasParent(parent.clone()));
        }

        for node in self.nodes.values() {
            if !node.is_canvas && !node.children.is_empty() {
                return Err(DocumentError::LeafWithChildren(node.id.clone()));
            }
            if node.id != ROOT_NODE_ID {
                let parent_id = node
                    .parent
                    .as_ref()
                    .ok_or_else(|| DocumentError::MultipleRoots(node.id.clone()))?;
                let parent = self.nodes.get(parent_id).ok_or_else(|| DocumentError::UnknownNode {
                    node: node.id.clone(),
                    missing: parent_id.clone(),
                })?;
                if !parent.children.contains(&node.id) {
                    return Err(DocumentError::ParentMismatch {
                        node: node.id.clone(),
                        parent: parent_id.clone(),
                    });
                }
            }
            for child_id in &node.children {
                let child = self.nodes.get(child_id).ok_or_else(|| DocumentError::UnknownNode {
                    node: node.id.clone(),
                    missing: child_id.clone(),
                })?;
                if child.parent.as_deref() != Some(node.id.as_str()) {
                    return Err(DocumentError::ChildMismatch {
                        parent: node.id.clone(),
                        child: child_id.clone(),
                    });
                }
            }
        }

        let mut seen = BTreeSet::new();
        let mut stack = vec![ROOT_NODE_ID.to_string()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                return Err(DocumentError::Cycle(id));
            }
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().cloned());
            }
        }
        if let Some(orphan) = self.nodes.keys().find(|id| !seen.contains(*id)) {
            return Err(DocumentError::Unreachable(orphan.clone()));
        }

        Ok(())
    }
}

// --- Factories ---

fn generate_node_id() -> NodeId {
    format!("node-{}", Uuid::new_v4().simple())
}

fn merge_props(defaults: Value, overrides: Props) -> Props {
    let mut props = match defaults {
        Value::Object(map) => map,
        _ => Props::new(),
    };
    props.extend(overrides);
    props
}

/// Build one node. Only structural defaults apply; nothing is validated.
pub fn create_node(
    node_type: NodeType,
    props: Props,
    display_name: Option<&str>,
    is_canvas: bool,
    child_ids: Vec<NodeId>,
    parent_id: Option<NodeId>,
) -> Node {
    Node {
        id: generate_node_id(),
        node_type,
        is_canvas,
        props,
        display_name: display_name.map(str::to_string),
        children: child_ids,
        parent: parent_id,
    }
}

pub fn create_container(props: Props, child_ids: Vec<NodeId>) -> Node {
    let props = merge_props(
        json!({ "padding": 16, "background": "transparent", "flexDirection": "column" }),
        props,
    );
    create_node(NodeType::Container, props, Some("Container"), true, child_ids, None)
}

pub fn create_text(text: &str, props: Props) -> Node {
    let props = merge_props(json!({ "text": text, "fontSize": 16, "textAlign": "left" }), props);
    create_node(NodeType::Text, props, Some("Text"), false, vec![], None)
}

pub fn create_heading(text: &str, level: u8, props: Props) -> Node {
    let level = level.clamp(1, 6);
    let props = merge_props(json!({ "text": text, "level": level, "fontWeight": "bold" }), props);
    create_node(NodeType::Heading, props, Some("Heading"), false, vec![], None)
}

pub fn create_image(src: &str, alt: &str, props: Props) -> Node {
    let props = merge_props(json!({ "src": src, "alt": alt, "objectFit": "cover" }), props);
    create_node(NodeType::Image, props, Some("Image"), false, vec![], None)
}

pub fn create_button(text: &str, href: Option<&str>, props: Props) -> Node {
    let props = merge_props(
        json!({ "text": text, "href": href, "variant": "primary" }),
        props,
    );
    create_node(NodeType::Button, props, Some("Button"), false, vec![], None)
}

/// Grid container; `gridTemplateColumns` is derived from `columns`.
pub fn create_grid(columns: u32, gap: u32, props: Props, child_ids: Vec<NodeId>) -> Node {
    let columns = columns.max(1);
    let props = merge_props(
        json!({
            "columns": columns,
            "gap": gap,
            "gridTemplateColumns": format!("repeat({}, minmax(0, 1fr))", columns),
        }),
        props,
    );
    create_node(NodeType::Grid, props, Some("Grid"), true, child_ids, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_id(mut node: Node, id: &str) -> Node {
        node.id = id.to_string();
        node
    }

    fn sample() -> Document {
        let mut doc = Document::new(create_container(Props::new(), vec![]));
        doc.append_child(ROOT_NODE_ID, with_id(create_heading("Title", 1, Props::new()), "title"))
            .unwrap();
        doc.append_child(ROOT_NODE_ID, with_id(create_grid(3, 8, Props::new(), vec![]), "grid"))
            .unwrap();
        doc.append_child("grid", with_id(create_text("cell", Props::new()), "cell"))
            .unwrap();
        doc
    }

    #[test]
    fn test_grid_derives_template_columns() {
        let grid = create_grid(4, 12, Props::new(), vec![]);
        assert_eq!(
            grid.prop_str("gridTemplateColumns"),
            Some("repeat(4, minmax(0, 1fr))")
        );
        assert!(grid.is_canvas);
    }

    #[test]
    fn test_caller_props_override_defaults() {
        let mut props = Props::new();
        props.insert("fontSize".into(), json!(24));
        let text = create_text("hi", props);
        assert_eq!(text.props["fontSize"], json!(24));
        assert_eq!(text.props["text"], json!("hi"));
    }

    #[test]
    fn test_well_formed_graph_passes() {
        assert_eq!(sample().check_graph(), Ok(()));
    }

    #[test]
    fn test_append_child_rejects_taken_id() {
        let mut doc = sample();
        let err = doc
            .append_child("grid", with_id(create_text("again", Props::new()), "title"))
            .unwrap_err();
        assert_eq!(err, DocumentError::DuplicateNode("title".into()));
        assert_eq!(doc.get("title").unwrap().props["text"], json!("Title"));
        assert_eq!(doc.check_graph(), Ok(()));
    }

    #[test]
    fn test_leaf_with_children_rejected() {
        let mut doc = sample();
        doc.get_mut("title").unwrap().children.push("cell".into());
        assert_eq!(
            doc.check_graph(),
            Err(DocumentError::LeafWithChildren("title".into()))
        );
    }

    #[test]
    fn test_one_sided_parent_link_rejected() {
        let mut doc = sample();
        doc.get_mut("grid").unwrap().children.clear();
        assert!(matches!(
            doc.check_graph(),
            Err(DocumentError::ParentMismatch { .. })
        ));
    }

    #[test]
    fn test_second_root_rejected() {
        let mut doc = sample();
        doc.insert(with_id(create_text("stray", Props::new()), "stray"));
        assert_eq!(
            doc.check_graph(),
            Err(DocumentError::MultipleRoots("stray".into()))
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let mut doc = sample();
        doc.get_mut("grid").unwrap().parent = Some("inner".into());
        doc.get_mut("grid").unwrap().children.push("inner".into());
        let mut inner = with_id(create_container(Props::new(), vec!["grid".into()]), "inner");
        inner.parent = Some("grid".into());
        doc.insert(inner);
        doc.get_mut(ROOT_NODE_ID).unwrap().children.retain(|c| c != "grid");
        assert!(doc.check_graph().is_err());
    }

    #[test]
    fn test_json_uses_root_key_and_restores_ids() {
        let doc = sample();
        let value = doc.to_json().unwrap();
        assert!(value.get("ROOT").is_some());
        assert_eq!(value["grid"]["nodes"], json!(["cell"]));

        let decoded = Document::from_json(&value).unwrap();
        assert_eq!(decoded.get("cell").unwrap().id, "cell");
        assert_eq!(decoded, doc);
    }

    #[test]
    fn test_json_without_root_rejected() {
        let value = json!({ "a": { "type": "Text" } });
        assert!(matches!(
            Document::from_json(&value),
            Err(DocumentError::Json(_))
        ));
    }

    #[test]
    fn test_remove_subtree_unlinks_parent() {
        let mut doc = sample();
        assert_eq!(doc.remove_subtree("grid"), 2);
        assert!(!doc.contains("cell"));
        assert_eq!(doc.root().unwrap().children, vec!["title".to_string()]);
        assert_eq!(doc.check_graph(), Ok(()));
    }
}
