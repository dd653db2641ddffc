//! State shared by every nested translation of one top-level request.

use crate::config::JspConfigManager;
use crate::dom::ContentId;
use crate::loader::ResourceLoader;
use crate::options::JspOptions;
use std::collections::BTreeMap;

/// Tag-library prefix to URI.
pub type TagPrefixMap = BTreeMap<String, String>;

/// Content id of a non-blank CDATA node to its jsp:id.
pub type CdataIdMap = BTreeMap<ContentId, String>;

/// Threaded by `&mut` through the page parser, the document parser, the
/// converter and every static include they expand.
pub struct TranslationContext<'a> {
    pub loader: &'a dyn ResourceLoader,
    pub options: &'a JspOptions,
    pub config_manager: &'a JspConfigManager,
    /// Directory of each resource being translated, innermost last.
    pub directory_stack: Vec<String>,
    /// Physical paths of the resources being translated, innermost last.
    pub dependency_stack: Vec<String>,
    /// Every statically included path, in inclusion order.
    pub dependencies: Vec<String>,
    pub cdata_ids: CdataIdMap,
    next_content_id: u32,
}

/// Rollback point for a discarded parse pass.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Watermark {
    content_id: u32,
    dependencies: usize,
}

impl<'a> TranslationContext<'a> {
    pub fn new(
        loader: &'a dyn ResourceLoader,
        options: &'a JspOptions,
        config_manager: &'a JspConfigManager,
    ) -> Self {
        Self {
            loader,
            options,
            config_manager,
            directory_stack: Vec::new(),
            dependency_stack: Vec::new(),
            dependencies: Vec::new(),
            cdata_ids: CdataIdMap::new(),
            next_content_id: 0,
        }
    }

    pub fn next_content_id(&mut self) -> ContentId {
        let id = ContentId(self.next_content_id);
        self.next_content_id += 1;
        id
    }

    pub fn record_cdata_id(&mut self, id: ContentId, jsp_id: String) {
        self.cdata_ids.insert(id, jsp_id);
    }

    /// Directory relative paths resolve against; `/` outside any resource.
    pub fn current_directory(&self) -> &str {
        self.directory_stack.last().map_or("/", String::as_str)
    }

    pub(crate) fn watermark(&self) -> Watermark {
        Watermark {
            content_id: self.next_content_id,
            dependencies: self.dependencies.len(),
        }
    }

    /// Forget content ids and dependencies recorded since `mark`.
    pub(crate) fn rollback(&mut self, mark: Watermark) {
        let _ = self.cdata_ids.split_off(&ContentId(mark.content_id));
        self.next_content_id = mark.content_id;
        self.dependencies.truncate(mark.dependencies);
    }

    pub(crate) fn into_results(self) -> (Vec<String>, CdataIdMap) {
        (self.dependencies, self.cdata_ids)
    }
}
