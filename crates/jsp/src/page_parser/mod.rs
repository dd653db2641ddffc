//! Translation of JSP-syntax pages into an XML view rooted at `jsp:root`.
//!
//! The page is read one character at a time. Everything that is not JSP
//! syntax accumulates as template text and becomes a CDATA child of the
//! innermost open action whenever JSP syntax interrupts it. Positions are
//! 1-based and refer to the first character of each construct.

mod action;
mod directive;
mod scripting;

use crate::config::JspConfiguration;
use crate::context::{TagPrefixMap, TranslationContext};
use crate::dom::{Document, Element, NodeId};
use crate::error::{Result, TranslationError};
use crate::include::{IncludeSite, expand_static_include};
use crate::jsp_id::{JspId, start_marker};
use crate::names::{ID, JSP_NAMESPACE, JSP_PREFIX, JSP_VERSION, ROOT, TEXT, XMLNS_NAMESPACE};
use crate::reader::LookaheadReader;
use std::collections::BTreeMap;
use tools::text::{is_blank, line_count};
use tools::uri::encode_path;

use scripting::ScriptingKind;

pub struct JspPageParser<'s, 'c> {
    reader: LookaheadReader<'s>,
    path: String,
    encoded_path: String,
    config: &'c mut JspConfiguration,
    implicit_tag_libs: TagPrefixMap,
    tag_prefixes: TagPrefixMap,
    /// Prefixes seen on tags before any taglib declared them, with the
    /// `path(line,column)` of the first use.
    undeclared_prefix_uses: BTreeMap<String, String>,
    document: Document,
    root: NodeId,
    open_elements: Vec<NodeId>,
    template_text: String,
    text_line: u32,
    text_column: u32,
    syntax_line: u32,
    syntax_column: u32,
    page_encoding_specified: bool,
}

impl<'s, 'c> JspPageParser<'s, 'c> {
    /// `path` is the resolved relative path of the page, `implicit_tag_libs`
    /// the prefixes visible before the first taglib directive.
    pub fn new(
        source: &'s str,
        path: &str,
        config: &'c mut JspConfiguration,
        implicit_tag_libs: TagPrefixMap,
    ) -> Self {
        let mut document = Document::new();
        let mut root = Element::new(Some(JSP_NAMESPACE), format!("{JSP_PREFIX}:{ROOT}"));
        root.set_attribute_ns(
            Some(JSP_NAMESPACE),
            &jsp_attribute(ID),
            JspId::root(path).to_string(),
        );
        let root = document.create_element(root);
        document.append_to_document(root);

        Self {
            reader: LookaheadReader::new(source),
            path: path.to_string(),
            encoded_path: encode_path(path),
            config,
            tag_prefixes: implicit_tag_libs.clone(),
            implicit_tag_libs,
            undeclared_prefix_uses: BTreeMap::new(),
            document,
            root,
            open_elements: vec![root],
            template_text: String::new(),
            text_line: 1,
            text_column: 1,
            syntax_line: 1,
            syntax_column: 1,
            page_encoding_specified: false,
        }
    }

    pub fn parse(mut self, ctx: &mut TranslationContext<'_>) -> Result<Document> {
        log::debug!(target: "jsp.page_parser", "parsing {}", self.path);

        for prelude in self.config.preludes.clone() {
            self.insert_include(ctx, &prelude)?;
        }

        while let Some(ch) = self.reader.read() {
            if ch == '<' {
                self.syntax_line = self.reader.line();
                self.syntax_column = self.reader.column();
                self.process_jsp_syntax(ctx)?;
            } else {
                self.template_text.push(ch);
            }
        }
        self.flush_template_text(ctx);

        for coda in self.config.codas.clone() {
            self.insert_include(ctx, &coda)?;
        }

        if self.open_elements.len() > 1 {
            let open = self.current_parent();
            let (name, line, column) = match self.document.element(open) {
                Some(el) => (
                    el.name.clone(),
                    el.position.map_or(0, |p| p.line),
                    el.position.map_or(0, |p| p.column),
                ),
                None => (String::new(), 0, 0),
            };
            return Err(TranslationError::syntax(
                &self.path,
                line,
                column,
                format!("unterminated <{name}> tag"),
            ));
        }

        self.declare_root_namespaces();
        Ok(self.document)
    }

    fn declare_root_namespaces(&mut self) {
        let Some(root) = self.document.element_mut(self.root) else {
            return;
        };
        root.set_attribute_ns(
            Some(XMLNS_NAMESPACE),
            &format!("xmlns:{JSP_PREFIX}"),
            JSP_NAMESPACE,
        );
        root.set_attribute("version", JSP_VERSION);
        for (prefix, uri) in &self.tag_prefixes {
            if prefix != JSP_PREFIX {
                root.set_attribute_ns(Some(XMLNS_NAMESPACE), &format!("xmlns:{prefix}"), uri.as_str());
            }
        }
    }

    /// Handle the construct following a `<` read at the syntax position.
    fn process_jsp_syntax(&mut self, ctx: &mut TranslationContext<'_>) -> Result<()> {
        loop {
            match self.reader.peek() {
                Some('!') => {
                    self.reader.read();
                    if self.reader.starts_with("--") {
                        let interrupted = self.process_html_comment(ctx)?;
                        if interrupted {
                            // The comment ended at a `<` that starts new syntax.
                            self.syntax_line = self.reader.line();
                            self.syntax_column = self.reader.column();
                            continue;
                        }
                        self.mark_text_start();
                    } else {
                        self.template_text.push_str("<!");
                    }
                }
                Some('%') => {
                    self.reader.read();
                    self.process_element(ctx)?;
                    self.mark_text_start();
                }
                _ => self.process_action(ctx)?,
            }
            return Ok(());
        }
    }

    fn process_element(&mut self, ctx: &mut TranslationContext<'_>) -> Result<()> {
        self.flush_template_text(ctx);
        match self.reader.peek() {
            Some('@') => {
                self.reader.read();
                self.process_directive(ctx)
            }
            Some('-') if self.reader.starts_with("--") => {
                self.reader.read();
                self.process_jsp_comment()
            }
            Some('=') => {
                self.reader.read();
                self.process_scripting(ctx, ScriptingKind::Expression)
            }
            Some('!') => {
                self.reader.read();
                self.process_scripting(ctx, ScriptingKind::Declaration)
            }
            _ => self.process_scripting(ctx, ScriptingKind::Scriptlet),
        }
    }

    /// `<%-` has been consumed; the closing `--%>` may reuse its dash.
    fn process_jsp_comment(&mut self) -> Result<()> {
        if self.reader.skip_past("--%>") {
            Ok(())
        } else {
            Err(self.syntax_error("unterminated JSP comment"))
        }
    }

    /// `<!` has been consumed and `--` follows. Returns true when the comment
    /// was cut short by a `<`, which has been consumed.
    fn process_html_comment(&mut self, ctx: &mut TranslationContext<'_>) -> Result<bool> {
        self.flush_template_text(ctx);
        let mut text = String::from("<!");
        let mut lines = 1;
        let mut interrupted = false;
        loop {
            let Some(ch) = self.reader.read() else {
                return Err(self.syntax_error("unterminated HTML comment"));
            };
            match ch {
                '>' => {
                    let closed = text.ends_with("--");
                    text.push('>');
                    if closed {
                        break;
                    }
                }
                '<' => {
                    interrupted = true;
                    break;
                }
                '\n' => {
                    lines += 1;
                    text.push(ch);
                }
                _ => text.push(ch),
            }
        }

        let parent = self.current_parent();
        let content_id = ctx.next_content_id();
        let blank = is_blank(&text);
        let node = self.document.create_cdata(text, content_id);
        self.document.append_child(parent, node);
        if !blank {
            let jsp_id = self.syntax_marker(lines);
            ctx.record_cdata_id(content_id, jsp_id);
        }
        Ok(interrupted)
    }

    /// Emit pending template text as a CDATA child of the innermost open
    /// element. Whitespace-only runs are dropped unless that element is
    /// `jsp:text`.
    fn flush_template_text(&mut self, ctx: &mut TranslationContext<'_>) {
        if self.template_text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.template_text);
        let parent = self.current_parent();
        let blank = is_blank(&text);
        let in_jsp_text = self
            .document
            .element(parent)
            .is_some_and(|el| el.is(JSP_NAMESPACE, TEXT));
        if blank && !in_jsp_text {
            return;
        }

        let jsp_id = start_marker(
            &self.encoded_path,
            self.text_line,
            self.text_column,
            line_count(&text),
        );
        let content_id = ctx.next_content_id();
        let node = self.document.create_cdata(text, content_id);
        self.document.append_child(parent, node);
        if !blank {
            ctx.record_cdata_id(content_id, jsp_id);
        }
    }

    /// Template text resumes after the construct just consumed.
    fn mark_text_start(&mut self) {
        self.text_line = self.reader.line();
        self.text_column = self.reader.column() + 1;
    }

    fn insert_include(&mut self, ctx: &mut TranslationContext<'_>, file: &str) -> Result<()> {
        let parent = self.current_parent();
        let site = IncludeSite {
            file,
            config: &*self.config,
            implicit_tag_libs: &self.implicit_tag_libs,
        };
        expand_static_include(ctx, site, &mut self.tag_prefixes, &mut self.document, parent)
            .map_err(|e| e.in_include(&self.path, self.syntax_line, self.syntax_column))
    }

    fn current_parent(&self) -> NodeId {
        self.open_elements.last().copied().unwrap_or(self.root)
    }

    fn syntax_marker(&self, lines: u32) -> String {
        start_marker(&self.encoded_path, self.syntax_line, self.syntax_column, lines)
    }

    fn set_jsp_id(element: &mut Element, value: String) {
        element.set_attribute_ns(Some(JSP_NAMESPACE), &jsp_attribute(ID), value);
    }

    fn syntax_error(&self, message: impl Into<String>) -> TranslationError {
        TranslationError::syntax(&self.path, self.syntax_line, self.syntax_column, message)
    }

    fn reference_error(&self, message: impl Into<String>) -> TranslationError {
        TranslationError::reference(&self.path, self.syntax_line, self.syntax_column, message)
    }
}

fn jsp_attribute(local: &str) -> String {
    format!("{JSP_PREFIX}:{local}")
}
