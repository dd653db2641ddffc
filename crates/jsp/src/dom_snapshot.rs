use crate::context::CdataIdMap;
use crate::dom::{Document, Element, NodeId, NodeKind};
use crate::names::{ID, JSP_NAMESPACE};
use std::fmt::{self, Write};

/// Deterministic line serialization of translated documents for golden and
/// idempotence tests. Not a stable format.
///
/// Equivalence rules:
/// - Node kinds must match; CDATA and text stay distinct.
/// - Element names and namespaces must match.
/// - Attribute order is significant; names and values must match.
/// - Character data must match exactly.
/// - jsp:id attributes and CDATA ids can be ignored by options.
#[derive(Clone, Copy, Debug, Default)]
pub struct DomSnapshotOptions {
    pub ignore_jsp_ids: bool,
}

#[derive(Debug)]
pub struct DomSnapshot {
    lines: Vec<String>,
}

impl DomSnapshot {
    /// `cdata_ids` adds each recorded CDATA jsp:id to its node's line.
    pub fn new(
        document: &Document,
        cdata_ids: Option<&CdataIdMap>,
        options: DomSnapshotOptions,
    ) -> Self {
        let mut lines = vec!["#document".to_string()];
        let mut stack: Vec<(NodeId, usize)> =
            document.top_level().iter().rev().map(|&id| (id, 1)).collect();
        while let Some((id, depth)) = stack.pop() {
            let mut line = " ".repeat(depth * INDENT_STEP);
            write_node_line(&mut line, document, id, cdata_ids, &options);
            lines.push(line);
            stack.extend(document.children(id).iter().rev().map(|&c| (c, depth + 1)));
        }
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for DomSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

const INDENT_STEP: usize = 2;

#[derive(Debug)]
pub struct DomMismatch {
    path: String,
    detail: String,
    expected: String,
    actual: String,
}

impl fmt::Display for DomMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DOM mismatch at {}: {}", self.path, self.detail)?;
        writeln!(f, "expected: {}", self.expected)?;
        writeln!(f, "actual:   {}", self.actual)?;
        Ok(())
    }
}

impl std::error::Error for DomMismatch {}

pub fn assert_dom_eq(expected: &Document, actual: &Document, options: DomSnapshotOptions) {
    if let Err(mismatch) = compare_dom(expected, actual, options) {
        panic!("{mismatch}");
    }
}

/// Structural comparison reporting the first difference with its path.
pub fn compare_dom(
    expected: &Document,
    actual: &Document,
    options: DomSnapshotOptions,
) -> Result<(), Box<DomMismatch>> {
    let mut stack: Vec<(String, &[NodeId], &[NodeId])> =
        vec![("/#document".to_string(), expected.top_level(), actual.top_level())];
    while let Some((path, exp_children, act_children)) = stack.pop() {
        if exp_children.len() != act_children.len() {
            return Err(Box::new(DomMismatch {
                path,
                detail: "child count".to_string(),
                expected: exp_children.len().to_string(),
                actual: act_children.len().to_string(),
            }));
        }
        for (index, (&exp, &act)) in exp_children.iter().zip(act_children).enumerate() {
            let child_path = format!("{path}/{}[{index}]", node_label(expected, exp));
            let exp_line = format_node_line(expected, exp, &options);
            let act_line = format_node_line(actual, act, &options);
            if exp_line != act_line {
                return Err(Box::new(DomMismatch {
                    path: child_path,
                    detail: "node".to_string(),
                    expected: exp_line,
                    actual: act_line,
                }));
            }
            stack.push((child_path, expected.children(exp), actual.children(act)));
        }
    }
    Ok(())
}

fn node_label(document: &Document, id: NodeId) -> String {
    match document.kind(id) {
        NodeKind::Element(element) => element.name.clone(),
        NodeKind::CData { .. } => "#cdata".to_string(),
        NodeKind::Text { .. } => "#text".to_string(),
    }
}

fn format_node_line(document: &Document, id: NodeId, options: &DomSnapshotOptions) -> String {
    let mut line = String::new();
    write_node_line(&mut line, document, id, None, options);
    line
}

fn is_jsp_id(namespace: Option<&str>, local: &str) -> bool {
    namespace == Some(JSP_NAMESPACE) && local == ID
}

fn write_element(out: &mut String, element: &Element, options: &DomSnapshotOptions) {
    out.push('<');
    out.push_str(&element.name);
    for attr in element.attributes() {
        if options.ignore_jsp_ids && is_jsp_id(attr.namespace.as_deref(), attr.local_name()) {
            continue;
        }
        out.push(' ');
        out.push_str(&attr.name);
        out.push_str("=\"");
        write_escaped(out, &attr.value);
        out.push('"');
    }
    out.push('>');
    if element.namespace.is_some() && element.prefix().is_none() {
        out.push_str(" {");
        out.push_str(element.namespace.as_deref().unwrap_or_default());
        out.push('}');
    }
}

fn write_node_line(
    out: &mut String,
    document: &Document,
    id: NodeId,
    cdata_ids: Option<&CdataIdMap>,
    options: &DomSnapshotOptions,
) {
    match document.kind(id) {
        NodeKind::Element(element) => write_element(out, element, options),
        NodeKind::CData { text, id } => {
            out.push_str("#cdata \"");
            write_escaped(out, text);
            out.push('"');
            if !options.ignore_jsp_ids {
                if let Some(jsp_id) = cdata_ids.and_then(|ids| ids.get(id)) {
                    let _ = write!(out, " jsp:id=\"{jsp_id}\"");
                }
            }
        }
        NodeKind::Text { text, .. } => {
            out.push('"');
            write_escaped(out, text);
            out.push('"');
        }
    }
}

fn write_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ if ch.is_ascii() => out.push(ch),
            _ => {
                let _ = write!(out, "\\u{{{:X}}}", ch as u32);
            }
        }
    }
}
