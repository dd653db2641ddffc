//! Namespace URIs and reserved names of the JSP XML view.

pub const JSP_NAMESPACE: &str = "http://java.sun.com/JSP/Page";
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Prefix of tag-library URIs that resolve through a TLD-less `uri`.
pub const TLD_URN_PREFIX: &str = "urn:jsptld:";
/// Prefix of tag-library URIs naming a tag-file directory.
pub const TAGDIR_URN_PREFIX: &str = "urn:jsptagdir:";

pub const JSP_PREFIX: &str = "jsp";
pub const JSP_VERSION: &str = "2.0";

/// Extensions whose resources are JSP documents unless configured otherwise.
pub const DOCUMENT_SUFFIXES: [&str; 2] = [".jspx", ".tagx"];

pub const ROOT: &str = "root";
pub const TEXT: &str = "text";
pub const ID: &str = "id";
pub const SCRIPTLET: &str = "scriptlet";
pub const EXPRESSION: &str = "expression";
pub const DECLARATION: &str = "declaration";
pub const DIRECTIVE_INCLUDE: &str = "directive.include";
pub const DIRECTIVE_PAGE: &str = "directive.page";

/// Strip the `urn:jsptld:`/`urn:jsptagdir:` marker from a tag-library URI.
pub fn strip_urn(uri: &str) -> &str {
    uri.strip_prefix(TLD_URN_PREFIX)
        .or_else(|| uri.strip_prefix(TAGDIR_URN_PREFIX))
        .unwrap_or(uri)
}

pub fn has_document_suffix(path: &str) -> bool {
    DOCUMENT_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}
