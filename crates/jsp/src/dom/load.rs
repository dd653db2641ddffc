//! Plain XML loading into a [`Document`], plus the namespace and entity
//! helpers shared with the JSP document parser.

use super::{ContentId, Document, Element, NodeId, SourcePosition};
use crate::error::{Result, TranslationError};
use crate::names::XMLNS_NAMESPACE;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tools::text::{LineIndex, line_count};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// In-scope namespace bindings of an element stack.
#[derive(Debug, Default)]
pub(crate) struct NamespaceScopes {
    bindings: Vec<(String, String)>,
    marks: Vec<usize>,
}

impl NamespaceScopes {
    pub(crate) fn push_scope(&mut self) {
        self.marks.push(self.bindings.len());
    }

    pub(crate) fn pop_scope(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.bindings.truncate(mark);
        }
    }

    pub(crate) fn declare(&mut self, prefix: &str, uri: &str) {
        self.bindings.push((prefix.to_string(), uri.to_string()));
    }

    /// URI bound to `prefix` (`""` is the default namespace).
    pub(crate) fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// Innermost non-empty prefix currently bound to `uri`.
    pub(crate) fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .filter(|(prefix, bound)| !prefix.is_empty() && bound == uri)
            .map(|(prefix, _)| prefix.as_str())
            .find(|prefix| self.resolve(prefix) == Some(uri))
    }
}

/// General entities available while unescaping text and attribute values.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Entities<'a> {
    declared: Option<&'a BTreeMap<String, String>>,
}

impl<'a> Entities<'a> {
    pub(crate) fn with_declared(declared: &'a BTreeMap<String, String>) -> Self {
        Self {
            declared: Some(declared),
        }
    }

    fn resolve(&self, name: &str) -> Option<&'a str> {
        let predefined = match name {
            "lt" => Some("<"),
            "gt" => Some(">"),
            "amp" => Some("&"),
            "apos" => Some("'"),
            "quot" => Some("\""),
            _ => None,
        };
        predefined.or_else(|| {
            self.declared
                .and_then(|map| map.get(name))
                .map(String::as_str)
        })
    }

    pub(crate) fn unescape<'s>(&self, raw: &'s str) -> std::result::Result<Cow<'s, str>, String> {
        quick_xml::escape::unescape_with(raw, |name| self.resolve(name)).map_err(|e| e.to_string())
    }
}

/// Qualified name of a start tag.
pub(crate) fn tag_name(start: &BytesStart<'_>) -> std::result::Result<String, String> {
    std::str::from_utf8(start.name().as_ref())
        .map(str::to_string)
        .map_err(|e| e.to_string())
}

/// `(qualified name, unescaped value)` pairs in document order.
pub(crate) fn decoded_attributes(
    start: &BytesStart<'_>,
    entities: Entities<'_>,
) -> std::result::Result<Vec<(String, String)>, String> {
    let mut out = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let name = std::str::from_utf8(attr.key.as_ref()).map_err(|e| e.to_string())?;
        let raw = std::str::from_utf8(&attr.value).map_err(|e| e.to_string())?;
        let value = entities.unescape(raw)?;
        out.push((name.to_string(), value.into_owned()));
    }
    Ok(out)
}

/// Push a scope holding the `xmlns` declarations among `attributes`.
pub(crate) fn declare_namespaces(scopes: &mut NamespaceScopes, attributes: &[(String, String)]) {
    scopes.push_scope();
    for (name, value) in attributes {
        if name == "xmlns" {
            scopes.declare("", value);
        } else if let Some(prefix) = name.strip_prefix("xmlns:") {
            scopes.declare(prefix, value);
        }
    }
}

/// Namespace of an attribute given its qualified name.
pub(crate) fn attribute_namespace<'s>(scopes: &'s NamespaceScopes, name: &str) -> Option<&'s str> {
    if name == "xmlns" || name.starts_with("xmlns:") {
        return Some(XMLNS_NAMESPACE);
    }
    match name.split_once(':') {
        Some((prefix, _)) => scopes.resolve(prefix),
        None => None,
    }
}

/// Namespace of an element given its qualified name. Fails for an
/// undeclared prefix.
pub(crate) fn element_namespace<'s>(
    scopes: &'s NamespaceScopes,
    name: &str,
) -> std::result::Result<Option<&'s str>, String> {
    match name.split_once(':') {
        Some((prefix, _)) => scopes
            .resolve(prefix)
            .map(Some)
            .ok_or_else(|| format!("the prefix \"{prefix}\" for element \"{name}\" is not bound")),
        None => Ok(scopes.resolve("")),
    }
}

/// Parse well-formed XML into a [`Document`], recording each element's
/// source position. Text and CDATA stay distinct; comments and processing
/// instructions are dropped. Content ids are numbered from zero.
pub fn parse_document(path: &str, text: &str) -> Result<Document> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let index = LineIndex::new(text);
    let position = |offset: usize| index.position(text, offset);
    let err = |offset: usize, message: String| {
        let (line, column) = position(offset);
        TranslationError::xml(path, line, column, message)
    };

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);
    let mut doc = Document::new();
    let mut scopes = NamespaceScopes::default();
    let mut open: Vec<NodeId> = Vec::new();
    let mut next_content = 0u32;

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader.read_event().map_err(|e| err(start, e.to_string()))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let name = tag_name(e).map_err(|m| err(start, m))?;
                let attributes =
                    decoded_attributes(e, Entities::default()).map_err(|m| err(start, m))?;
                declare_namespaces(&mut scopes, &attributes);
                let namespace = element_namespace(&scopes, &name).map_err(|m| err(start, m))?;
                let (line, column) = position(start);
                let mut element = Element::new(namespace, name).with_position(line, column);
                let end = reader.buffer_position() as usize;
                element.start_tag_lines = text.get(start..end).map_or(1, line_count);
                for (attr_name, value) in &attributes {
                    let ns = attribute_namespace(&scopes, attr_name);
                    element.set_attribute_ns(ns, attr_name, value.as_str());
                }
                let node = doc.create_element(element);
                match open.last() {
                    Some(&parent) => doc.append_child(parent, node),
                    None => doc.append_to_document(node),
                }
                if matches!(event, Event::Start(_)) {
                    open.push(node);
                } else {
                    scopes.pop_scope();
                }
            }
            Event::End(_) => {
                let (line, column) = position(start);
                if let Some(element) = open.pop().and_then(|node| doc.element_mut(node)) {
                    element.end_position = Some(SourcePosition { line, column });
                }
                scopes.pop_scope();
            }
            Event::Text(e) => {
                let raw = std::str::from_utf8(&e).map_err(|m| err(start, m.to_string()))?;
                let value = Entities::default().unescape(raw).map_err(|m| err(start, m))?;
                if let Some(&parent) = open.last() {
                    let node = doc.create_text(value.into_owned(), ContentId(next_content));
                    next_content += 1;
                    doc.append_child(parent, node);
                    let (line, column) = position(start);
                    doc.set_text_position(node, line, column);
                }
            }
            Event::CData(e) => {
                let raw = std::str::from_utf8(&e).map_err(|m| err(start, m.to_string()))?;
                if let Some(&parent) = open.last() {
                    let node = doc.create_cdata(raw, ContentId(next_content));
                    next_content += 1;
                    doc.append_child(parent, node);
                    let (line, column) = position(start);
                    doc.set_text_position(node, line, column);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !open.is_empty() {
        return Err(err(text.len(), "unexpected end of document".into()));
    }
    if doc.document_element().is_none() {
        return Err(err(0, "document has no root element".into()));
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeKind;

    #[test]
    fn scopes_shadow_and_unwind() {
        let mut scopes = NamespaceScopes::default();
        scopes.push_scope();
        scopes.declare("a", "urn:one");
        scopes.push_scope();
        scopes.declare("a", "urn:two");
        assert_eq!(scopes.resolve("a"), Some("urn:two"));
        scopes.pop_scope();
        assert_eq!(scopes.resolve("a"), Some("urn:one"));
        assert_eq!(scopes.resolve(""), None);
        assert_eq!(scopes.resolve("xml"), Some(XML_NAMESPACE));
    }

    #[test]
    fn declared_entities_expand() {
        let mut declared = BTreeMap::new();
        declared.insert("co".to_string(), "ACME".to_string());
        let entities = Entities::with_declared(&declared);
        assert_eq!(entities.unescape("&co; &amp; &#65;").unwrap(), "ACME & A");
        assert!(Entities::default().unescape("&co;").is_err());
    }

    #[test]
    fn loads_positions_and_namespaces() {
        let doc = parse_document(
            "/a.xml",
            "<r xmlns:j=\"urn:j\">\n  <j:x a=\"1\"/><![CDATA[c]]>t</r>",
        )
        .expect("parse");
        let root = doc.document_element().expect("root");
        let children = doc.children(root);
        assert_eq!(children.len(), 4);
        let x = doc.element(children[1]).expect("element");
        assert_eq!(x.namespace.as_deref(), Some("urn:j"));
        assert_eq!(x.position.map(|p| (p.line, p.column)), Some((2, 3)));
        assert_eq!(x.end_position, None);
        let root_el = doc.element(root).expect("root element");
        assert_eq!(root_el.end_position.map(|p| (p.line, p.column)), Some((2, 29)));
        assert_eq!(doc.text_position(children[2]).map(|p| (p.line, p.column)), Some((2, 15)));
        assert_eq!(doc.text_position(children[3]).map(|p| (p.line, p.column)), Some((2, 28)));
        assert!(matches!(doc.kind(children[2]), NodeKind::CData { text, .. } if text == "c"));
        assert!(matches!(doc.kind(children[3]), NodeKind::Text { text, .. } if text == "t"));
        assert_eq!(
            root_el.attribute_ns(XMLNS_NAMESPACE, "j"),
            Some("urn:j")
        );
    }

    #[test]
    fn unbound_prefix_is_an_error() {
        let err = parse_document("/a.xml", "<r><q:x/></r>").expect_err("unbound");
        assert!(matches!(err, TranslationError::Xml { line: 1, column: 4, .. }));
    }
}
