//! Arena-backed XML document produced by translation.
//!
//! Nodes live in one `Vec` and refer to each other by [`NodeId`]. Content
//! nodes carry a [`ContentId`] assigned when they are created; importing a
//! subtree into another document copies the id unchanged, so side tables
//! keyed by it stay valid after include splicing.

pub(crate) mod load;

use std::collections::BTreeMap;
use std::fmt::Write;

pub use load::parse_document;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable identity of a CDATA/text node across document imports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(pub u32);

/// 1-based position of a construct's first character in its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub namespace: Option<String>,
    /// Qualified name as written (`prefix:local` or `local`).
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.name).0
    }

    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub namespace: Option<String>,
    /// Qualified name as written (`prefix:local` or `local`).
    pub name: String,
    pub position: Option<SourcePosition>,
    /// Start of the end tag; `None` for empty-element tags.
    pub end_position: Option<SourcePosition>,
    /// Lines spanned by the start tag.
    pub start_tag_lines: u32,
    attributes: Vec<Attribute>,
    multi_values: BTreeMap<String, Vec<String>>,
}

impl Element {
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.into(),
            position: None,
            end_position: None,
            start_tag_lines: 1,
            attributes: Vec::new(),
            multi_values: BTreeMap::new(),
        }
    }

    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.position = Some(SourcePosition { line, column });
        self
    }

    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.name).0
    }

    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// Namespace URI and local name both match.
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local_name() == local
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Value of the attribute with qualified name `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    pub fn attribute_ns(&self, namespace: &str, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.namespace.as_deref() == Some(namespace) && attr.local_name() == local)
            .map(|attr| attr.value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        self.set_attribute_ns(None, name, value);
    }

    /// Set an attribute by qualified name. An existing attribute keeps its
    /// place in the attribute order.
    pub fn set_attribute_ns(&mut self, namespace: Option<&str>, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => {
                attr.namespace = namespace.map(str::to_string);
                attr.value = value;
            }
            None => self.attributes.push(Attribute {
                namespace: namespace.map(str::to_string),
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        let idx = self.attributes.iter().position(|attr| attr.name == name)?;
        Some(self.attributes.remove(idx))
    }

    /// Record one more value for a repeated attribute.
    pub fn push_attribute_value(&mut self, name: &str, value: impl Into<String>) {
        self.multi_values
            .entry(name.to_string())
            .or_default()
            .push(value.into());
    }

    /// Every value recorded for a repeated attribute, in source order.
    pub fn attribute_values(&self, name: &str) -> &[String] {
        self.multi_values.get(name).map_or(&[], Vec::as_slice)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Element(Element),
    CData { text: String, id: ContentId },
    Text { text: String, id: ContentId },
}

#[derive(Clone, Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Clone, Debug, Default)]
pub struct Document {
    nodes: Vec<NodeData>,
    top_level: Vec<NodeId>,
    /// Source positions of loaded text and CDATA. Not carried by imports.
    text_positions: BTreeMap<NodeId, SourcePosition>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, element: Element) -> NodeId {
        self.push(NodeKind::Element(element))
    }

    pub fn create_cdata(&mut self, text: impl Into<String>, id: ContentId) -> NodeId {
        self.push(NodeKind::CData {
            text: text.into(),
            id,
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>, id: ContentId) -> NodeId {
        self.push(NodeKind::Text {
            text: text.into(),
            id,
        })
    }

    pub fn set_text_position(&mut self, node: NodeId, line: u32, column: u32) {
        self.text_positions.insert(node, SourcePosition { line, column });
    }

    pub fn text_position(&self, node: NodeId) -> Option<SourcePosition> {
        self.text_positions.get(&node).copied()
    }

    /// Invariant: `child` is detached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(self.nodes[child.index()].parent.is_none());
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    pub fn append_to_document(&mut self, child: NodeId) {
        self.top_level.push(child);
    }

    pub fn top_level(&self) -> &[NodeId] {
        &self.top_level
    }

    /// The first top-level element.
    pub fn document_element(&self) -> Option<NodeId> {
        self.top_level
            .iter()
            .copied()
            .find(|&id| matches!(self.kind(id), NodeKind::Element(_)))
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.index()].kind
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.index()].children
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].parent
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match &self.nodes[node.index()].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[node.index()].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Number of nodes ever created, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deep-copy `node` of `source` into this document, detached. Content
    /// ids are carried over unchanged.
    pub fn import_node(&mut self, source: &Document, node: NodeId) -> NodeId {
        let root = self.push(source.kind(node).clone());
        let mut pending: Vec<(NodeId, NodeId)> = vec![(node, root)];
        while let Some((from, to)) = pending.pop() {
            for &child in source.children(from) {
                let copy = self.push(source.kind(child).clone());
                self.append_child(to, copy);
                pending.push((child, copy));
            }
        }
        root
    }

    /// Attached nodes in document order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.top_level.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Serialize to XML text. Output is a pure function of the tree.
    pub fn to_xml_string(&self) -> String {
        enum Step {
            Open(NodeId),
            Close(NodeId),
        }
        let mut out = String::new();
        let mut stack: Vec<Step> = self.top_level.iter().rev().map(|&id| Step::Open(id)).collect();
        while let Some(step) = stack.pop() {
            match step {
                Step::Open(id) => match self.kind(id) {
                    NodeKind::Element(element) => {
                        out.push('<');
                        out.push_str(&element.name);
                        for attr in &element.attributes {
                            out.push(' ');
                            out.push_str(&attr.name);
                            out.push_str("=\"");
                            escape_attribute(&mut out, &attr.value);
                            out.push('"');
                        }
                        let children = self.children(id);
                        if children.is_empty() {
                            out.push_str("/>");
                        } else {
                            out.push('>');
                            stack.push(Step::Close(id));
                            stack.extend(children.iter().rev().map(|&c| Step::Open(c)));
                        }
                    }
                    NodeKind::CData { text, .. } => {
                        out.push_str("<![CDATA[");
                        out.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
                        out.push_str("]]>");
                    }
                    NodeKind::Text { text, .. } => escape_text(&mut out, text),
                },
                Step::Close(id) => {
                    if let Some(element) = self.element(id) {
                        let _ = write!(out, "</{}>", element.name);
                    }
                }
            }
        }
        out
    }
}

/// Split `prefix:local`.
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

fn escape_attribute(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(ch),
        }
    }
}

fn escape_text(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}
