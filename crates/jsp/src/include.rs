//! Static include expansion shared by every translator.
//!
//! The included resource is translated on its own with the prefixes known
//! at the include site, then its content is spliced under the current
//! parent. An included `jsp:root` contributes its children, and its
//! namespace declarations become tag prefixes of the includer.

use crate::config::JspConfiguration;
use crate::context::{TagPrefixMap, TranslationContext};
use crate::dom::{Document, NodeId};
use crate::error::{Result, TranslationError};
use crate::jsp2dom::Jsp2Dom;
use crate::names::{JSP_NAMESPACE, ROOT, XMLNS_NAMESPACE, XSI_NAMESPACE, strip_urn};
use tools::uri::resolve_against;

pub(crate) struct IncludeSite<'a> {
    /// Target as written in the directive.
    pub file: &'a str,
    /// Configuration of the including resource.
    pub config: &'a JspConfiguration,
    pub implicit_tag_libs: &'a TagPrefixMap,
}

pub(crate) fn expand_static_include(
    ctx: &mut TranslationContext<'_>,
    site: IncludeSite<'_>,
    tag_prefixes: &mut TagPrefixMap,
    document: &mut Document,
    parent: NodeId,
) -> Result<()> {
    let include_path = resolve_against(ctx.current_directory(), site.file);
    if ctx.loader.is_directory(&include_path) && !ctx.options.allow_directory_include {
        log::debug!(target: "jsp.include", "skipping include of directory {include_path}");
        return Ok(());
    }

    let physical = ctx.loader.real_path(&include_path);
    if ctx.dependency_stack.contains(&physical) {
        log::debug!(target: "jsp.include", "circular include of {physical}");
        return Err(TranslationError::CircularDependency {
            path: include_path,
            physical,
        });
    }

    log::debug!(target: "jsp.include", "including {include_path}");
    ctx.dependency_stack.push(physical);
    ctx.dependencies.push(include_path.clone());
    let result = splice(ctx, &site, &include_path, tag_prefixes, document, parent);
    ctx.dependency_stack.pop();
    result
}

fn splice(
    ctx: &mut TranslationContext<'_>,
    site: &IncludeSite<'_>,
    include_path: &str,
    tag_prefixes: &mut TagPrefixMap,
    document: &mut Document,
    parent: NodeId,
) -> Result<()> {
    let mut visible = site.implicit_tag_libs.clone();
    visible.extend(tag_prefixes.iter().map(|(k, v)| (k.clone(), v.clone())));
    let mut config = ctx
        .config_manager
        .configuration_for_static_include(include_path, site.config);

    let included = Jsp2Dom::new(include_path, &mut config, visible).translate(ctx)?;

    let Some(root) = included.document_element() else {
        return Ok(());
    };
    let root_element = included
        .element(root)
        .filter(|el| el.is(JSP_NAMESPACE, ROOT));
    match root_element {
        Some(root_element) => {
            for &child in included.children(root) {
                let copy = document.import_node(&included, child);
                document.append_child(parent, copy);
            }
            for attr in root_element.attributes() {
                if attr.namespace.as_deref() != Some(XMLNS_NAMESPACE) {
                    continue;
                }
                let Some(prefix) = attr.name.strip_prefix("xmlns:") else {
                    continue;
                };
                if attr.value == JSP_NAMESPACE || attr.value == XSI_NAMESPACE {
                    continue;
                }
                tag_prefixes.insert(prefix.to_string(), strip_urn(&attr.value).to_string());
            }
        }
        None => {
            for &node in included.top_level() {
                let copy = document.import_node(&included, node);
                document.append_child(parent, copy);
            }
        }
    }
    Ok(())
}
