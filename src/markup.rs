//! Markup Tree - Attribute-Addressed Page Fragments
//!
//! Accepts HTML with attributes as well as XHTML. Void elements (`<img>`,
//! `<br>`, `<input>`, ...) need no closing tag and are written back the way
//! they were found. HTML named entities are resolved. Every other element
//! must be closed. Comments, processing instructions and doctypes are
//! dropped.

use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::nodes::DocumentError;

#[derive(Debug, Clone, PartialEq)]
pub enum MarkupNode {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<MarkupNode>,
    pub self_closing: bool,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: false,
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.set_text(text);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(MarkupNode::Element(child));
        self.self_closing = false;
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute in place, appending it if new.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attributes.retain(|(key, _)| key != name);
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: &str) {
        self.children = vec![MarkupNode::Text(text.to_string())];
        self.self_closing = false;
    }

    pub fn set_children(&mut self, children: Vec<Element>) {
        self.children = children.into_iter().map(MarkupNode::Element).collect();
        self.self_closing = false;
    }

    /// Concatenated descendant text.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            MarkupNode::Element(e) => Some(e),
            MarkupNode::Text(_) => None,
        })
    }

    /// Depth-first pre-order visit of every descendant element, mutably.
    pub fn visit_children_mut<F>(&mut self, visit: &mut F)
    where
        F: FnMut(&mut Element) -> Visit,
    {
        visit_nodes_mut(&mut self.children, visit);
    }

    /// Depth-first pre-order visit of every descendant element.
    pub fn visit_children<F>(&self, visit: &mut F)
    where
        F: FnMut(&Element) -> Visit,
    {
        visit_nodes(&self.children, visit);
    }

    /// First descendant (depth-first) carrying `attr == value`.
    pub fn find_by_attr(&self, attr: &str, value: &str) -> Option<&Element> {
        for child in self.child_elements() {
            if child.attr(attr) == Some(value) {
                return Some(child);
            }
            if let Some(found) = child.find_by_attr(attr, value) {
                return Some(found);
            }
        }
        None
    }

    /// First descendant element with tag `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&Element> {
        for child in self.child_elements() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_by_name(name) {
                return Some(found);
            }
        }
        None
    }
}

fn collect_text(nodes: &[MarkupNode], out: &mut String) {
    for node in nodes {
        match node {
            MarkupNode::Text(text) => out.push_str(text),
            MarkupNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

/// A parsed fragment; may hold several top-level nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    pub nodes: Vec<MarkupNode>,
}

impl Fragment {
    pub fn parse(source: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(false);
        // void elements never close, so end names are matched here instead
        reader.config_mut().check_end_names = false;

        let mut stack: Vec<Element> = Vec::new();
        let mut top: Vec<MarkupNode> = Vec::new();

        loop {
            let position = reader.buffer_position() as u64;
            let event = reader.read_event().map_err(|e| DocumentError::Markup {
                message: e.to_string(),
                position: reader.buffer_position() as u64,
            })?;

            match event {
                Event::Start(start) => {
                    let element = open_element(&start, position)?;
                    if is_void_element(&element.name) {
                        push_node(&mut stack, &mut top, MarkupNode::Element(element));
                    } else {
                        stack.push(element);
                    }
                }
                Event::Empty(start) => {
                    let mut element = open_element(&start, position)?;
                    element.self_closing = true;
                    push_node(&mut stack, &mut top, MarkupNode::Element(element));
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).to_string();
                    if is_void_element(&name) {
                        continue;
                    }
                    let element = stack.pop().ok_or_else(|| DocumentError::Markup {
                        message: format!("unexpected closing tag </{}>", name),
                        position,
                    })?;
                    if element.name != name {
                        return Err(DocumentError::Markup {
                            message: format!("expected </{}>, found </{}>", element.name, name),
                            position,
                        });
                    }
                    push_node(&mut stack, &mut top, MarkupNode::Element(element));
                }
                Event::Text(text) => {
                    let text = text.unescape_with(resolve_html5_entity).map_err(|e| DocumentError::Markup {
                        message: e.to_string(),
                        position,
                    })?;
                    push_node(&mut stack, &mut top, MarkupNode::Text(text.into_owned()));
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).to_string();
                    push_node(&mut stack, &mut top, MarkupNode::Text(text));
                }
                Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        if let Some(open) = stack.last() {
            return Err(DocumentError::Markup {
                message: format!("unclosed element <{}>", open.name),
                position: reader.buffer_position() as u64,
            });
        }

        Ok(Self { nodes: top })
    }

    pub fn to_markup(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }
        String::from_utf8(writer.into_inner()).map_err(write_err)
    }

    /// Top-level elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.nodes.iter().filter_map(|node| match node {
            MarkupNode::Element(e) => Some(e),
            MarkupNode::Text(_) => None,
        })
    }

    /// Depth-first pre-order visit of every element, mutably.
    pub fn visit_mut<F>(&mut self, visit: &mut F)
    where
        F: FnMut(&mut Element) -> Visit,
    {
        visit_nodes_mut(&mut self.nodes, visit);
    }

    /// Depth-first pre-order visit of every element.
    pub fn visit<F>(&self, visit: &mut F)
    where
        F: FnMut(&Element) -> Visit,
    {
        visit_nodes(&self.nodes, visit);
    }
}

/// Whether a visitor descends into the element it just saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Descend,
    Skip,
}

fn visit_nodes_mut<F>(nodes: &mut [MarkupNode], visit: &mut F)
where
    F: FnMut(&mut Element) -> Visit,
{
    for node in nodes {
        if let MarkupNode::Element(element) = node {
            if visit(element) == Visit::Descend {
                visit_nodes_mut(&mut element.children, visit);
            }
        }
    }
}

fn visit_nodes<F>(nodes: &[MarkupNode], visit: &mut F)
where
    F: FnMut(&Element) -> Visit,
{
    for node in nodes {
        if let MarkupNode::Element(element) = node {
            if visit(element) == Visit::Descend {
                visit_nodes(&element.children, visit);
            }
        }
    }
}

fn open_element(start: &BytesStart<'_>, position: u64) -> Result<Element, DocumentError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let mut element = Element::new(&name);
    for attr in start.html_attributes() {
        let attr = attr.map_err(|e| DocumentError::Markup {
            message: e.to_string(),
            position,
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value_with(resolve_html5_entity).map_err(|e| DocumentError::Markup {
            message: e.to_string(),
            position,
        })?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

/// HTML elements that never have content or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|void| void.eq_ignore_ascii_case(name))
}

fn push_node(stack: &mut [Element], top: &mut Vec<MarkupNode>, node: MarkupNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top.push(node),
    }
}

fn write_err<E: std::fmt::Display>(e: E) -> DocumentError {
    DocumentError::Markup {
        message: e.to_string(),
        position: 0,
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &MarkupNode) -> Result<(), DocumentError> {
    match node {
        MarkupNode::Text(text) => writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_err),
        MarkupNode::Element(element) => {
            let mut start = BytesStart::new(element.name.as_str());
            for (key, value) in &element.attributes {
                start.push_attribute((key.as_str(), value.as_str()));
            }
            if element.children.is_empty() && element.self_closing {
                return writer.write_event(Event::Empty(start)).map_err(write_err);
            }
            if element.children.is_empty() && is_void_element(&element.name) {
                return writer.write_event(Event::Start(start)).map_err(write_err);
            }
            writer.write_event(Event::Start(start)).map_err(write_err)?;
            for child in &element.children {
                write_node(writer, child)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(element.name.as_str())))
                .map_err(write_err)
        }
    }
}
