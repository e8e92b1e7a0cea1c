use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{DocumentError, PathError};
use crate::location::parse_location;

/// Read-only view of a configuration document. The builder sees documents
/// only through this trait.
pub trait Document {
    /// Non-owning reference to one element. Graph nodes keep these as their
    /// source handle, so they must stay cheap to copy.
    type Handle: Copy + Eq + Hash + Debug;

    fn root(&self) -> Self::Handle;
    fn tag(&self, node: Self::Handle) -> &str;
    fn attr(&self, node: Self::Handle, name: &str) -> Option<&str>;
    fn text(&self, node: Self::Handle) -> Option<&str>;
    fn children(&self, node: Self::Handle) -> Vec<Self::Handle>;
    fn parent(&self, node: Self::Handle) -> Option<Self::Handle>;
    fn eval_path(&self, node: Self::Handle, expr: &str) -> Result<Vec<Self::Handle>, PathError>;
}

/// Owned, nested description of an element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(usize);

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: Vec<(String, String)>,
    text: Option<String>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    /// One past the last descendant in preorder.
    end: usize,
}

/// Elements stored in preorder, so index order is document order and every
/// subtree is a contiguous index range.
#[derive(Debug, Clone)]
pub struct ElementTree {
    nodes: Vec<Node>,
}

impl ElementTree {
    pub fn from_element(root: &Element) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.push(root, None);
        tree
    }

    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let root: Element = serde_json::from_str(json)?;
        Ok(Self::from_element(&root))
    }

    pub fn from_reader(mut reader: impl Read) -> Result<Self, DocumentError> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Self::from_json(&buf)
    }

    fn push(&mut self, element: &Element, parent: Option<ElementId>) -> ElementId {
        let id = ElementId(self.nodes.len());
        self.nodes.push(Node {
            tag: element.tag.clone(),
            attrs: element
                .attrs
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            text: element.text.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(str::to_string),
            parent,
            children: Vec::with_capacity(element.children.len()),
            end: id.0 + 1,
        });
        for child in &element.children {
            let child_id = self.push(child, Some(id));
            self.nodes[id.0].children.push(child_id);
        }
        self.nodes[id.0].end = self.nodes.len();
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root_id(&self) -> ElementId {
        ElementId(0)
    }

    pub fn tag_of(&self, id: ElementId) -> &str {
        &self.nodes[id.0].tag
    }

    pub fn attr_of(&self, id: ElementId, name: &str) -> Option<&str> {
        self.nodes[id.0]
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn text_of(&self, id: ElementId) -> Option<&str> {
        self.nodes[id.0].text.as_deref()
    }

    pub fn children_of(&self, id: ElementId) -> &[ElementId] {
        &self.nodes[id.0].children
    }

    pub fn parent_of(&self, id: ElementId) -> Option<ElementId> {
        self.nodes[id.0].parent
    }

    pub fn descendants_of(&self, id: ElementId) -> impl Iterator<Item = ElementId> + use<> {
        (id.0 + 1..self.nodes[id.0].end).map(ElementId)
    }
}

impl Document for ElementTree {
    type Handle = ElementId;

    fn root(&self) -> ElementId {
        self.root_id()
    }

    fn tag(&self, node: ElementId) -> &str {
        self.tag_of(node)
    }

    fn attr(&self, node: ElementId, name: &str) -> Option<&str> {
        self.attr_of(node, name)
    }

    fn text(&self, node: ElementId) -> Option<&str> {
        self.text_of(node)
    }

    fn children(&self, node: ElementId) -> Vec<ElementId> {
        self.children_of(node).to_vec()
    }

    fn parent(&self, node: ElementId) -> Option<ElementId> {
        self.parent_of(node)
    }

    fn eval_path(&self, node: ElementId, expr: &str) -> Result<Vec<ElementId>, PathError> {
        Ok(parse_location(expr)?.evaluate(self, node))
    }
}
