//! Translation of an already-parsed document supplied by the caller.
//!
//! The source tree is walked in document order and re-emitted with jsp:id
//! attributes, collapsed character data and expanded include directives,
//! matching what the document parser produces from source text. Elements
//! without a recorded position are numbered by document order; text without
//! one takes its parent's.

use crate::config::JspConfiguration;
use crate::context::{TagPrefixMap, TranslationContext};
use crate::dom::load::{NamespaceScopes, declare_namespaces};
use crate::dom::{Document, Element, NodeId, NodeKind, SourcePosition};
use crate::error::{Result, TranslationError};
use crate::include::{IncludeSite, expand_static_include};
use crate::jsp_id::{end_marker, start_marker};
use crate::names::{DIRECTIVE_INCLUDE, ID, JSP_NAMESPACE, JSP_PREFIX, TEXT, XMLNS_NAMESPACE, strip_urn};
use tools::text::{is_blank, line_count};
use tools::uri::encode_path;

pub struct JspDocumentConverter<'d, 'c> {
    source: &'d Document,
    path: String,
    encoded_path: String,
    config: &'c mut JspConfiguration,
    implicit_tag_libs: TagPrefixMap,
    tag_prefixes: TagPrefixMap,
    output: Document,
    scopes: NamespaceScopes,
    ordinal: u32,
}

/// An element re-emitted into the output.
struct Copied {
    node: NodeId,
    position: SourcePosition,
    /// Qualified name its jsp:id was written under.
    id_name: String,
}

/// Pending character data of one parent.
#[derive(Default)]
struct TextRun {
    text: String,
    position: Option<SourcePosition>,
}

impl<'d, 'c> JspDocumentConverter<'d, 'c> {
    pub fn new(
        source: &'d Document,
        path: &str,
        config: &'c mut JspConfiguration,
        implicit_tag_libs: TagPrefixMap,
    ) -> Self {
        Self {
            source,
            path: path.to_string(),
            encoded_path: encode_path(path),
            config,
            tag_prefixes: implicit_tag_libs.clone(),
            implicit_tag_libs,
            output: Document::new(),
            scopes: NamespaceScopes::default(),
            ordinal: 0,
        }
    }

    pub fn convert(mut self, ctx: &mut TranslationContext<'_>) -> Result<Document> {
        log::debug!(target: "jsp.converter", "converting supplied document for {}", self.path);
        let source = self.source;
        let Some(root) = source.document_element() else {
            return Err(TranslationError::xml(&self.path, 0, 0, "document has no root element"));
        };
        let Some(element) = source.element(root) else {
            return Err(TranslationError::xml(&self.path, 0, 0, "document has no root element"));
        };
        if element.is(JSP_NAMESPACE, DIRECTIVE_INCLUDE) {
            return Err(self.reference_error(element, "include directive outside the root element"));
        }

        let copied = self.copy_element(element);
        self.output.append_to_document(copied.node);
        for prelude in self.config.preludes.clone() {
            self.include(ctx, &prelude, copied.node, copied.position)?;
        }
        self.convert_children(ctx, root, copied.node)?;
        for coda in self.config.codas.clone() {
            self.include(ctx, &coda, copied.node, copied.position)?;
        }
        self.close_element(element, &copied);
        Ok(self.output)
    }

    fn convert_children(
        &mut self,
        ctx: &mut TranslationContext<'_>,
        from: NodeId,
        to: NodeId,
    ) -> Result<()> {
        let source = self.source;
        let parent_position = self.output.element(to).and_then(|el| el.position);
        let mut run = TextRun::default();
        for &child in source.children(from) {
            match source.kind(child) {
                NodeKind::Text { text, .. } | NodeKind::CData { text, .. } => {
                    if run.text.is_empty() {
                        run.position = source.text_position(child).or(parent_position);
                    }
                    run.text.push_str(text);
                }
                NodeKind::Element(element) => {
                    self.flush_text(ctx, &mut run, to);
                    if element.is(JSP_NAMESPACE, DIRECTIVE_INCLUDE) {
                        let Some(file) = element.attribute("file") else {
                            return Err(self.reference_error(
                                element,
                                "jsp:directive.include requires a file attribute",
                            ));
                        };
                        let position = self.position_of(element);
                        self.include(ctx, file, to, position)?;
                        continue;
                    }
                    let copied = self.copy_element(element);
                    self.output.append_child(to, copied.node);
                    self.convert_children(ctx, child, copied.node)?;
                    self.close_element(element, &copied);
                }
            }
        }
        self.flush_text(ctx, &mut run, to);
        Ok(())
    }

    /// Copy of `element` with its jsp:id, detached. Opens the element's
    /// namespace scope; [`Self::close_element`] closes it.
    fn copy_element(&mut self, element: &Element) -> Copied {
        let position = self.position_of(element);
        let declarations: Vec<(String, String)> = element
            .attributes()
            .iter()
            .filter(|attr| attr.namespace.as_deref() == Some(XMLNS_NAMESPACE))
            .map(|attr| (attr.name.clone(), attr.value.clone()))
            .collect();
        declare_namespaces(&mut self.scopes, &declarations);

        let mut copy = Element::new(element.namespace.as_deref(), element.name.clone())
            .with_position(position.line, position.column);
        for attr in element.attributes() {
            if attr.namespace.as_deref() == Some(XMLNS_NAMESPACE) {
                if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
                    if attr.value != JSP_NAMESPACE {
                        self.tag_prefixes
                            .insert(prefix.to_string(), strip_urn(&attr.value).to_string());
                    }
                }
            }
            copy.set_attribute_ns(attr.namespace.as_deref(), &attr.name, attr.value.as_str());
        }
        let prefix = self.scopes.prefix_for(JSP_NAMESPACE).unwrap_or(JSP_PREFIX);
        let id_name = format!("{prefix}:{ID}");
        let lines = if element.position.is_some() {
            element.start_tag_lines
        } else {
            1
        };
        copy.set_attribute_ns(
            Some(JSP_NAMESPACE),
            &id_name,
            start_marker(&self.encoded_path, position.line, position.column, lines),
        );
        Copied {
            node: self.output.create_element(copy),
            position,
            id_name,
        }
    }

    /// Append the end-tag marker of a container and leave its scope.
    fn close_element(&mut self, element: &Element, copied: &Copied) {
        if let Some(end) = element.end_position {
            if let Some(out) = self.output.element_mut(copied.node) {
                if let Some(id) = out.attribute(&copied.id_name).map(str::to_string) {
                    out.set_attribute_ns(
                        Some(JSP_NAMESPACE),
                        &copied.id_name,
                        id + &end_marker(end.line, end.column),
                    );
                }
            }
        }
        self.scopes.pop_scope();
    }

    fn position_of(&mut self, element: &Element) -> SourcePosition {
        self.ordinal += 1;
        element.position.unwrap_or(SourcePosition {
            line: self.ordinal,
            column: 1,
        })
    }

    fn flush_text(&mut self, ctx: &mut TranslationContext<'_>, run: &mut TextRun, parent: NodeId) {
        if run.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut run.text);
        let blank = is_blank(&text);
        let in_jsp_text = self
            .output
            .element(parent)
            .is_some_and(|el| el.is(JSP_NAMESPACE, TEXT));
        if blank && !in_jsp_text {
            return;
        }
        let position = run.position.take().unwrap_or(SourcePosition { line: 1, column: 1 });
        let jsp_id = start_marker(&self.encoded_path, position.line, position.column, line_count(&text));
        let content_id = ctx.next_content_id();
        let node = self.output.create_cdata(text, content_id);
        self.output.append_child(parent, node);
        if !blank {
            ctx.record_cdata_id(content_id, jsp_id);
        }
    }

    fn include(
        &mut self,
        ctx: &mut TranslationContext<'_>,
        file: &str,
        parent: NodeId,
        position: SourcePosition,
    ) -> Result<()> {
        let site = IncludeSite {
            file,
            config: &*self.config,
            implicit_tag_libs: &self.implicit_tag_libs,
        };
        expand_static_include(ctx, site, &mut self.tag_prefixes, &mut self.output, parent)
            .map_err(|e| e.in_include(&self.path, position.line, position.column))
    }

    fn reference_error(&self, element: &Element, message: &str) -> TranslationError {
        let position = element.position.unwrap_or(SourcePosition { line: 0, column: 0 });
        TranslationError::reference(&self.path, position.line, position.column, message)
    }
}
