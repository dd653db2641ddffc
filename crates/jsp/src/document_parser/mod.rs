//! Translation of JSP documents (well-formed XML) into the XML view.
//!
//! The document is parsed namespace-aware without validation. A DOCTYPE
//! aborts that pass; the document is then parsed again with validation
//! against its internal DTD subset. Adjacent text and CDATA collapse into a
//! single CDATA node, comments are dropped, and `jsp:directive.include` is
//! replaced by the included content.

mod dtd;

use crate::config::JspConfiguration;
use crate::context::{TagPrefixMap, TranslationContext};
use crate::dom::load::{
    Entities, NamespaceScopes, attribute_namespace, decoded_attributes, declare_namespaces,
    element_namespace, tag_name,
};
use crate::dom::{Document, Element, NodeId};
use crate::encoding::compatible;
use crate::encoding::resolver::SourceResolution;
use crate::error::{EncodingSource, Result, TranslationError};
use crate::include::{IncludeSite, expand_static_include};
use crate::jsp_id::{end_marker, start_marker};
use crate::names::{
    DIRECTIVE_INCLUDE, DIRECTIVE_PAGE, ID, JSP_NAMESPACE, JSP_PREFIX, TEXT, strip_urn,
};
use dtd::Dtd;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tools::text::{LineIndex, is_blank, line_count};
use tools::uri::encode_path;

pub struct JspDocumentParser<'s, 'c> {
    text: &'s str,
    path: String,
    encoded_path: String,
    config: &'c mut JspConfiguration,
    implicit_tag_libs: TagPrefixMap,
    encoding: String,
    encoding_source: EncodingSource,
    index: LineIndex,
}

enum PassOutcome {
    Done(Document),
    RetryWithValidation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Validation {
    Off,
    On,
}

/// An open start tag. Include directives leave no node behind.
struct OpenTag {
    node: Option<NodeId>,
}

struct PassState {
    validation: Validation,
    document: Document,
    open: Vec<OpenTag>,
    scopes: NamespaceScopes,
    tag_prefixes: TagPrefixMap,
    text: String,
    text_start: usize,
    dtd: Option<Dtd>,
    page_encoding_specified: bool,
}

impl PassState {
    fn parent(&self) -> Option<NodeId> {
        self.open.iter().rev().find_map(|tag| tag.node)
    }

    fn jsp_id_name(&self) -> String {
        let prefix = self.scopes.prefix_for(JSP_NAMESPACE).unwrap_or(JSP_PREFIX);
        format!("{prefix}:{ID}")
    }
}

impl<'s, 'c> JspDocumentParser<'s, 'c> {
    pub fn new(
        text: &'s str,
        path: &str,
        config: &'c mut JspConfiguration,
        implicit_tag_libs: TagPrefixMap,
        resolution: &SourceResolution,
    ) -> Self {
        Self {
            text,
            path: path.to_string(),
            encoded_path: encode_path(path),
            config,
            implicit_tag_libs,
            encoding: resolution.encoding.clone(),
            encoding_source: resolution
                .encoding_source
                .unwrap_or(EncodingSource::XmlDefault),
            index: LineIndex::new(text),
        }
    }

    pub fn parse(mut self, ctx: &mut TranslationContext<'_>) -> Result<Document> {
        log::debug!(target: "jsp.document_parser", "parsing {}", self.path);
        let mark = ctx.watermark();
        let page_encoding = self.config.page_encoding.clone();

        match self.run(ctx, Validation::Off)? {
            PassOutcome::Done(document) => Ok(document),
            PassOutcome::RetryWithValidation => {
                log::debug!(
                    target: "jsp.document_parser",
                    "{}: DOCTYPE present, parsing again with validation",
                    self.path
                );
                ctx.rollback(mark);
                self.config.page_encoding = page_encoding;
                match self.run(ctx, Validation::On)? {
                    PassOutcome::Done(document) => Ok(document),
                    PassOutcome::RetryWithValidation => {
                        Err(self.xml_error(0, "unexpected DOCTYPE in validating pass"))
                    }
                }
            }
        }
    }

    fn run(&mut self, ctx: &mut TranslationContext<'_>, validation: Validation) -> Result<PassOutcome> {
        let mut reader = Reader::from_str(self.text);
        reader.config_mut().trim_text(false);
        let mut state = PassState {
            validation,
            document: Document::new(),
            open: Vec::new(),
            scopes: NamespaceScopes::default(),
            tag_prefixes: self.implicit_tag_libs.clone(),
            text: String::new(),
            text_start: 0,
            dtd: None,
            page_encoding_specified: false,
        };

        loop {
            let start = reader.buffer_position() as usize;
            let event = reader
                .read_event()
                .map_err(|e| self.xml_error(start, e.to_string()))?;
            match event {
                Event::DocType(e) => {
                    if state.validation == Validation::Off {
                        return Ok(PassOutcome::RetryWithValidation);
                    }
                    let raw = self.utf8(&e, start)?;
                    let dtd = Dtd::parse(raw).map_err(|m| self.xml_error(start, m))?;
                    state.dtd = Some(dtd);
                }
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let end = reader.buffer_position() as usize;
                    let empty = matches!(event, Event::Empty(_));
                    self.start_element(ctx, &mut state, e, start..end, empty)?;
                }
                Event::End(_) => self.end_element(ctx, &mut state, start)?,
                Event::Text(e) => {
                    let raw = self.utf8(&e, start)?;
                    let entities = match &state.dtd {
                        Some(dtd) => Entities::with_declared(&dtd.entities),
                        None => Entities::default(),
                    };
                    let value = entities
                        .unescape(raw)
                        .map_err(|m| self.xml_error(start, m))?
                        .into_owned();
                    self.push_text(&mut state, &value, start);
                }
                Event::CData(e) => {
                    let raw = self.utf8(&e, start)?.to_string();
                    self.push_text(&mut state, &raw, start);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !state.open.is_empty() {
            return Err(self.xml_error(self.text.len(), "unexpected end of document"));
        }
        self.flush_text(ctx, &mut state)?;
        if state.document.document_element().is_none() {
            return Err(self.xml_error(0, "document has no root element"));
        }
        Ok(PassOutcome::Done(state.document))
    }

    fn start_element(
        &mut self,
        ctx: &mut TranslationContext<'_>,
        state: &mut PassState,
        start: &BytesStart<'_>,
        span: std::ops::Range<usize>,
        empty: bool,
    ) -> Result<()> {
        self.flush_text(ctx, state)?;
        let offset = span.start;
        let name = tag_name(start).map_err(|m| self.xml_error(offset, m))?;
        let entities = match &state.dtd {
            Some(dtd) => Entities::with_declared(&dtd.entities),
            None => Entities::default(),
        };
        let attributes = decoded_attributes(start, entities).map_err(|m| self.xml_error(offset, m))?;

        let is_root = state.open.is_empty();
        if is_root && state.document.document_element().is_some() {
            return Err(self.xml_error(offset, "content after the root element"));
        }
        if let Some(dtd) = &state.dtd {
            dtd.validate_element(&name, is_root)
                .map_err(|m| self.xml_error(offset, format!("validation failed: {m}")))?;
        }

        declare_namespaces(&mut state.scopes, &attributes);
        for (attr, value) in &attributes {
            if let Some(prefix) = attr.strip_prefix("xmlns:") {
                if value != JSP_NAMESPACE {
                    state
                        .tag_prefixes
                        .insert(prefix.to_string(), strip_urn(value).to_string());
                }
            }
        }
        let namespace = element_namespace(&state.scopes, &name)
            .map_err(|m| self.xml_error(offset, m))?
            .map(str::to_string);
        let (line, column) = self.index.position(self.text, offset);
        let lines = self.text.get(span).map_or(1, line_count);
        let mut element = Element::new(namespace.as_deref(), name).with_position(line, column);

        if element.is(JSP_NAMESPACE, DIRECTIVE_INCLUDE) {
            let Some((_, file)) = attributes.iter().find(|(attr, _)| attr == "file") else {
                return Err(TranslationError::reference(
                    &self.path,
                    line,
                    column,
                    "jsp:directive.include requires a file attribute",
                ));
            };
            self.include(ctx, state, file, line, column)?;
            if empty {
                state.scopes.pop_scope();
            } else {
                state.open.push(OpenTag { node: None });
            }
            return Ok(());
        }

        for (attr, value) in &attributes {
            let attr_ns = attribute_namespace(&state.scopes, attr);
            element.set_attribute_ns(attr_ns, attr, value.as_str());
        }
        element.set_attribute_ns(
            Some(JSP_NAMESPACE),
            &state.jsp_id_name(),
            start_marker(&self.encoded_path, line, column, lines),
        );
        if element.is(JSP_NAMESPACE, DIRECTIVE_PAGE) {
            self.check_page_encoding(state, &element, line, column)?;
        }

        let node = state.document.create_element(element);
        match state.parent() {
            Some(parent) => state.document.append_child(parent, node),
            None => state.document.append_to_document(node),
        }

        if empty {
            state.scopes.pop_scope();
            if is_root {
                state.open.push(OpenTag { node: Some(node) });
                self.include_all(ctx, state, Prologue::Preludes, line, column)?;
                self.include_all(ctx, state, Prologue::Codas, line, column)?;
                state.open.pop();
            }
        } else {
            state.open.push(OpenTag { node: Some(node) });
            if is_root {
                self.include_all(ctx, state, Prologue::Preludes, line, column)?;
            }
        }
        Ok(())
    }

    fn end_element(
        &mut self,
        ctx: &mut TranslationContext<'_>,
        state: &mut PassState,
        offset: usize,
    ) -> Result<()> {
        self.flush_text(ctx, state)?;
        let (line, column) = self.index.position(self.text, offset);
        if state.open.len() == 1 {
            let (root_line, root_column) = state
                .parent()
                .and_then(|root| state.document.element(root))
                .and_then(|el| el.position)
                .map_or((line, column), |p| (p.line, p.column));
            self.include_all(ctx, state, Prologue::Codas, root_line, root_column)?;
        }

        let Some(tag) = state.open.pop() else {
            return Err(self.xml_error(offset, "end tag without a start tag"));
        };
        if let Some(element) = tag.node.and_then(|node| state.document.element_mut(node)) {
            let id = element
                .attributes()
                .iter()
                .find(|a| a.namespace.as_deref() == Some(JSP_NAMESPACE) && a.local_name() == ID)
                .map(|a| (a.name.clone(), a.value.clone()));
            if let Some((id_name, value)) = id {
                element.set_attribute_ns(Some(JSP_NAMESPACE), &id_name, value + &end_marker(line, column));
            }
        }
        state.scopes.pop_scope();
        Ok(())
    }

    fn push_text(&self, state: &mut PassState, text: &str, offset: usize) {
        if state.text.is_empty() {
            state.text_start = offset;
        }
        state.text.push_str(text);
    }

    /// Emit buffered character data as one CDATA node. Whitespace-only runs
    /// are dropped unless the enclosing element is `jsp:text`.
    fn flush_text(&self, ctx: &mut TranslationContext<'_>, state: &mut PassState) -> Result<()> {
        if state.text.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut state.text);
        let blank = is_blank(&text);
        let Some(parent) = state.parent() else {
            if blank {
                return Ok(());
            }
            return Err(self.xml_error(state.text_start, "character data outside the root element"));
        };
        let in_jsp_text = state
            .document
            .element(parent)
            .is_some_and(|el| el.is(JSP_NAMESPACE, TEXT));
        if blank && !in_jsp_text {
            return Ok(());
        }

        let (line, column) = self.index.position(self.text, state.text_start);
        let content_id = ctx.next_content_id();
        let jsp_id = start_marker(&self.encoded_path, line, column, line_count(&text));
        let node = state.document.create_cdata(text, content_id);
        state.document.append_child(parent, node);
        if !blank {
            ctx.record_cdata_id(content_id, jsp_id);
        }
        Ok(())
    }

    fn include_all(
        &mut self,
        ctx: &mut TranslationContext<'_>,
        state: &mut PassState,
        which: Prologue,
        line: u32,
        column: u32,
    ) -> Result<()> {
        let files = match which {
            Prologue::Preludes => self.config.preludes.clone(),
            Prologue::Codas => self.config.codas.clone(),
        };
        for file in &files {
            self.include(ctx, state, file, line, column)?;
        }
        Ok(())
    }

    fn include(
        &mut self,
        ctx: &mut TranslationContext<'_>,
        state: &mut PassState,
        file: &str,
        line: u32,
        column: u32,
    ) -> Result<()> {
        let Some(parent) = state.parent() else {
            return Err(TranslationError::xml(
                &self.path,
                line,
                column,
                "include directive outside the root element",
            ));
        };
        let site = IncludeSite {
            file,
            config: &*self.config,
            implicit_tag_libs: &self.implicit_tag_libs,
        };
        expand_static_include(ctx, site, &mut state.tag_prefixes, &mut state.document, parent)
            .map_err(|e| e.in_include(&self.path, line, column))
    }

    fn check_page_encoding(
        &mut self,
        state: &mut PassState,
        element: &Element,
        line: u32,
        column: u32,
    ) -> Result<()> {
        let Some(declared) = element.attribute("pageEncoding") else {
            return Ok(());
        };
        if state.page_encoding_specified {
            return Err(TranslationError::syntax(
                &self.path,
                line,
                column,
                format!("pageEncoding specified more than once in {}", self.path),
            ));
        }
        state.page_encoding_specified = true;

        if !compatible(&self.encoding, declared) {
            return Err(TranslationError::EncodingConflict {
                path: self.path.clone(),
                first: self.encoding.clone(),
                first_source: self.encoding_source,
                second: declared.to_string(),
                second_source: EncodingSource::PageDirective,
            });
        }
        match &self.config.page_encoding {
            Some(configured) if !compatible(configured, declared) => {
                if self.config.servlet_version.rejects_encoding_mismatch() {
                    return Err(TranslationError::EncodingConflict {
                        path: self.path.clone(),
                        first: configured.clone(),
                        first_source: EncodingSource::Configuration,
                        second: declared.to_string(),
                        second_source: EncodingSource::PageDirective,
                    });
                }
            }
            Some(_) => {}
            None => self.config.page_encoding = Some(declared.to_string()),
        }
        Ok(())
    }

    fn utf8<'b>(&self, bytes: &'b [u8], offset: usize) -> Result<&'b str> {
        std::str::from_utf8(bytes).map_err(|e| self.xml_error(offset, e.to_string()))
    }

    fn xml_error(&self, offset: usize, message: impl Into<String>) -> TranslationError {
        let (line, column) = self.index.position(self.text, offset);
        TranslationError::xml(&self.path, line, column, message)
    }
}

#[derive(Clone, Copy)]
enum Prologue {
    Preludes,
    Codas,
}
