//! Translation of one resource, dispatching on its resolved syntax.

use crate::config::JspConfiguration;
use crate::context::{TagPrefixMap, TranslationContext};
use crate::converter::JspDocumentConverter;
use crate::document_parser::JspDocumentParser;
use crate::dom::Document;
use crate::encoding::resolver::{SourceResolution, resolve};
use crate::encoding::{decode, scanner::SCAN_LIMIT};
use crate::error::Result;
use crate::loader::{read_all, read_prefix};
use crate::page_parser::JspPageParser;
use tools::uri::{parent_directory, resolve_against};

/// Translates `path` (resolved against the current directory) into its XML
/// view. A caller-supplied document skips reading and goes through the
/// converter.
pub struct Jsp2Dom<'c> {
    path: String,
    config: &'c mut JspConfiguration,
    implicit_tag_libs: TagPrefixMap,
    source_document: Option<Document>,
    resolution: Option<SourceResolution>,
}

impl<'c> Jsp2Dom<'c> {
    pub fn new(path: &str, config: &'c mut JspConfiguration, implicit_tag_libs: TagPrefixMap) -> Self {
        Self {
            path: path.to_string(),
            config,
            implicit_tag_libs,
            source_document: None,
            resolution: None,
        }
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.source_document = Some(document);
        self
    }

    pub fn translate(self, ctx: &mut TranslationContext<'_>) -> Result<Document> {
        self.translate_resolved(ctx).map(|(document, _)| document)
    }

    /// Like [`Jsp2Dom::translate`], also returning how the source was read.
    pub fn translate_resolved(
        mut self,
        ctx: &mut TranslationContext<'_>,
    ) -> Result<(Document, Option<SourceResolution>)> {
        let resolved = resolve_against(ctx.current_directory(), &self.path);
        ctx.directory_stack.push(parent_directory(&resolved).to_string());
        let result = self.build(ctx, &resolved);
        ctx.directory_stack.pop();
        result.map(|document| (document, self.resolution))
    }

    fn build(&mut self, ctx: &mut TranslationContext<'_>, resolved: &str) -> Result<Document> {
        let implicit = std::mem::take(&mut self.implicit_tag_libs);
        if let Some(source) = self.source_document.take() {
            return JspDocumentConverter::new(&source, resolved, &mut *self.config, implicit)
                .convert(ctx);
        }

        let prefix = read_prefix(ctx.loader, resolved, SCAN_LIMIT)?;
        let resolution = resolve(resolved, &prefix, self.config)?;
        log::debug!(
            target: "jsp.resolver",
            "{resolved}: {} syntax, encoding {}",
            if resolution.is_xml { "XML" } else { "JSP" },
            resolution.encoding
        );

        let bytes = read_all(ctx.loader, resolved)?;
        let body = bytes.get(resolution.bom_len()..).unwrap_or_default();
        let decoded = decode(resolved, body, &resolution.encoding)?;
        // A byte order mark can survive decoding when the source repeats it.
        let text = decoded.strip_prefix('\u{feff}').unwrap_or(&decoded);

        let document = if resolution.is_xml {
            JspDocumentParser::new(text, resolved, &mut *self.config, implicit, &resolution)
                .parse(ctx)?
        } else {
            JspPageParser::new(text, resolved, &mut *self.config, implicit).parse(ctx)?
        };
        self.resolution = Some(resolution);
        Ok(document)
    }
}
