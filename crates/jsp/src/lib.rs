//! Translation of JSP pages and JSP documents into a uniform XML view.
//!
//! Both syntaxes produce the same shape: a document whose elements carry a
//! `jsp:id` locating them in the source, with template text as CDATA and
//! static includes expanded in place. Start with [`Translator`].

pub mod config;
pub mod context;
pub mod converter;
pub mod document_parser;
pub mod dom;
#[cfg(any(test, feature = "dom-snapshot"))]
pub mod dom_snapshot;
pub mod encoding;
pub mod error;
mod include;
pub mod jsp2dom;
pub mod jsp_id;
pub mod loader;
pub mod names;
pub mod options;
pub mod page_parser;
pub mod reader;

pub use config::{JspConfigManager, JspConfiguration, ServletVersion};
pub use context::{CdataIdMap, TagPrefixMap, TranslationContext};
pub use dom::{ContentId, Document, Element, NodeId, NodeKind};
pub use error::{EncodingSource, Result, TranslationError};
pub use jsp_id::JspId;
pub use loader::{FsResourceLoader, MemoryResourceLoader, ResourceLoader};
pub use options::JspOptions;

use jsp2dom::Jsp2Dom;
use tools::uri::resolve_uri;

/// Outcome of translating one top-level resource.
#[derive(Debug)]
pub struct Translation {
    pub document: Document,
    /// Statically included paths in inclusion order, nested ones included.
    pub dependencies: Vec<String>,
    pub cdata_ids: CdataIdMap,
    /// The top-level resource was read as a JSP document.
    pub is_xml: bool,
    /// Encoding the top-level resource was decoded with.
    pub encoding: Option<String>,
}

/// Entry point tying a resource loader to translator options and JSP
/// configuration.
pub struct Translator<'a> {
    loader: &'a dyn ResourceLoader,
    options: JspOptions,
    config_manager: JspConfigManager,
}

impl<'a> Translator<'a> {
    pub fn new(loader: &'a dyn ResourceLoader) -> Self {
        Self {
            loader,
            options: JspOptions::default(),
            config_manager: JspConfigManager::default(),
        }
    }

    pub fn with_options(mut self, options: JspOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_config_manager(mut self, config_manager: JspConfigManager) -> Self {
        self.config_manager = config_manager;
        self
    }

    pub fn options(&self) -> &JspOptions {
        &self.options
    }

    /// Translate the resource at `path` with the configuration its property
    /// groups give it.
    pub fn translate(&self, path: &str) -> Result<Translation> {
        let path = normalize(path);
        let mut config = self.config_manager.configuration_for(&path);
        self.run(&path, &mut config, None)
    }

    /// Translate with an explicit configuration. A `page_encoding` left unset
    /// is filled in from the page directive.
    pub fn translate_with_config(
        &self,
        path: &str,
        config: &mut JspConfiguration,
    ) -> Result<Translation> {
        self.run(&normalize(path), config, None)
    }

    /// Translate a document the caller already parsed, as if it were the
    /// JSP document at `path`.
    pub fn translate_document(&self, path: &str, document: Document) -> Result<Translation> {
        let path = normalize(path);
        let mut config = self.config_manager.configuration_for(&path);
        self.run(&path, &mut config, Some(document))
    }

    fn run(
        &self,
        path: &str,
        config: &mut JspConfiguration,
        document: Option<Document>,
    ) -> Result<Translation> {
        log::info!(target: "jsp.translator", "translating {path}");
        let mut ctx = TranslationContext::new(self.loader, &self.options, &self.config_manager);
        ctx.dependency_stack.push(self.loader.real_path(path));

        let from_document = document.is_some();
        let mut unit = Jsp2Dom::new(path, config, self.options.implicit_tag_prefixes());
        if let Some(document) = document {
            unit = unit.with_document(document);
        }
        let (document, resolution) = unit.translate_resolved(&mut ctx)?;

        let (dependencies, cdata_ids) = ctx.into_results();
        Ok(Translation {
            document,
            dependencies,
            cdata_ids,
            is_xml: from_document || resolution.as_ref().is_some_and(|r| r.is_xml),
            encoding: resolution.map(|r| r.encoding),
        })
    }
}

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        resolve_uri(path)
    } else {
        resolve_uri(&format!("/{path}"))
    }
}
