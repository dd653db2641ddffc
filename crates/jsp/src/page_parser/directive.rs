use super::JspPageParser;
use crate::context::TranslationContext;
use crate::dom::Element;
use crate::encoding::compatible;
use crate::error::{EncodingSource, Result, TranslationError};
use crate::names::{JSP_NAMESPACE, JSP_PREFIX, TAGDIR_URN_PREFIX};

const TAGDIR_ROOT: &str = "/WEB-INF/tags";

#[derive(Default)]
struct TaglibDeclaration {
    prefix: String,
    uri: String,
}

impl<'s, 'c> JspPageParser<'s, 'c> {
    /// `<%@` has been consumed.
    pub(super) fn process_directive(&mut self, ctx: &mut TranslationContext<'_>) -> Result<()> {
        let mut directive = String::new();
        let mut in_directive_name = true;
        let mut element: Option<Element> = None;
        let mut taglib = TaglibDeclaration::default();
        let mut attr_name = String::new();
        let mut value = String::new();
        let mut quote: Option<char> = None;
        let mut lines = 1;

        loop {
            let Some(ch) = self.reader.read() else {
                return Err(self.syntax_error("unterminated directive"));
            };
            match ch {
                '%' if quote.is_none() && self.reader.peek() == Some('>') => {
                    self.reader.read();
                    break;
                }
                '\r' => {}
                ' ' | '\t' | '\n' => {
                    if ch == '\n' {
                        lines += 1;
                    }
                    if quote.is_some() {
                        value.push(ch);
                    } else if in_directive_name && !directive.is_empty() {
                        in_directive_name = false;
                        element = directive_element(&directive);
                    }
                }
                '<' if quote.is_some() => value.push_str("&lt;"),
                '<' => return Err(self.syntax_error("invalid '<' inside directive")),
                '>' if quote.is_some() => value.push_str("&gt;"),
                '"' | '\'' => match quote {
                    Some(open) if open == ch => {
                        quote = None;
                        let name = std::mem::take(&mut attr_name);
                        let val = std::mem::take(&mut value);
                        self.directive_attribute(
                            ctx,
                            &directive,
                            element.as_mut(),
                            &mut taglib,
                            name.trim(),
                            val,
                        )?;
                    }
                    Some(_) => value.push(ch),
                    None => quote = Some(ch),
                },
                '=' if quote.is_none() => {}
                _ if quote.is_some() => value.push(ch),
                _ if in_directive_name => directive.push(ch),
                _ => attr_name.push(ch),
            }
        }

        if in_directive_name && !directive.is_empty() {
            element = directive_element(&directive);
        }
        if directive.is_empty() {
            return Err(self.syntax_error("directive name missing"));
        }

        if directive == "taglib" {
            self.declare_taglib(ctx, taglib)?;
        }

        if let Some(mut element) = element {
            if directive == "page" {
                self.check_page_encoding(&element)?;
            }
            Self::set_jsp_id(&mut element, self.syntax_marker(lines));
            let parent = self.current_parent();
            let node = self.document.create_element(element);
            self.document.append_child(parent, node);
        }
        Ok(())
    }

    fn directive_attribute(
        &mut self,
        ctx: &mut TranslationContext<'_>,
        directive: &str,
        element: Option<&mut Element>,
        taglib: &mut TaglibDeclaration,
        name: &str,
        value: String,
    ) -> Result<()> {
        match directive {
            "taglib" => self.taglib_attribute(taglib, name, value),
            "include" => {
                if name != "file" {
                    return Err(self.reference_error(format!(
                        "invalid attribute \"{name}\" in include directive"
                    )));
                }
                if value.is_empty() {
                    return Err(self.reference_error("include directive file value missing"));
                }
                self.insert_include(ctx, &value)
            }
            "page" | "tag" => {
                let Some(element) = element else {
                    return Ok(());
                };
                match element.attribute(name) {
                    Some(existing) if name == "import" => {
                        let joined = format!("{existing},{value}");
                        element.set_attribute(name, joined);
                    }
                    Some(existing) if existing != value => {
                        return Err(self.syntax_error(format!(
                            "{directive} directive attribute \"{name}\" has conflicting values \"{existing}\" and \"{value}\""
                        )));
                    }
                    _ => element.set_attribute(name, value),
                }
                Ok(())
            }
            _ => {
                if let Some(element) = element {
                    element.set_attribute(name, value);
                }
                Ok(())
            }
        }
    }

    fn taglib_attribute(
        &self,
        taglib: &mut TaglibDeclaration,
        name: &str,
        value: String,
    ) -> Result<()> {
        match name {
            "prefix" => taglib.prefix = value,
            "uri" => {
                if taglib.uri.starts_with(TAGDIR_URN_PREFIX) {
                    return Err(self.reference_error("taglib directive has both tagdir and uri"));
                }
                if !taglib.uri.is_empty() {
                    return Err(self.reference_error("taglib directive has a duplicate uri"));
                }
                taglib.uri = value;
            }
            "tagdir" => {
                if taglib.uri.starts_with(TAGDIR_URN_PREFIX) {
                    return Err(self.reference_error("taglib directive has a duplicate tagdir"));
                }
                if !taglib.uri.is_empty() {
                    return Err(self.reference_error("taglib directive has both tagdir and uri"));
                }
                if !value.starts_with(TAGDIR_ROOT) {
                    return Err(self.reference_error(format!(
                        "tagdir \"{value}\" must start with {TAGDIR_ROOT}"
                    )));
                }
                taglib.uri = format!("{TAGDIR_URN_PREFIX}{value}");
            }
            other => {
                return Err(self.reference_error(format!(
                    "invalid attribute \"{other}\" in taglib directive"
                )));
            }
        }
        Ok(())
    }

    fn declare_taglib(
        &mut self,
        ctx: &TranslationContext<'_>,
        taglib: TaglibDeclaration,
    ) -> Result<()> {
        let TaglibDeclaration { prefix, uri } = taglib;
        if prefix.is_empty() {
            return Err(self.reference_error("taglib directive prefix missing"));
        }
        if uri.is_empty() {
            return Err(self.reference_error(format!(
                "taglib directive for prefix \"{prefix}\" has neither uri nor tagdir"
            )));
        }

        if !ctx.options.allow_taglib_prefix_redefinition {
            if let Some(existing) = self.tag_prefixes.get(&prefix) {
                let same_tagdir = uri.strip_prefix(TAGDIR_URN_PREFIX) == Some(existing.as_str());
                if existing != &uri && !same_tagdir {
                    return Err(self.reference_error(format!(
                        "taglib prefix \"{prefix}\" redefined to \"{uri}\", already bound to \"{existing}\""
                    )));
                }
            }
        }
        if !ctx.options.allow_taglib_prefix_use_before_definition {
            if let Some(first_use) = self.undeclared_prefix_uses.get(&prefix) {
                return Err(self.reference_error(format!(
                    "taglib prefix \"{prefix}\" used at {first_use} before it was declared"
                )));
            }
        }

        log::trace!(target: "jsp.page_parser", "taglib {prefix} -> {uri}");
        self.tag_prefixes.insert(prefix, uri);
        Ok(())
    }

    fn check_page_encoding(&mut self, element: &Element) -> Result<()> {
        let Some(declared) = element.attribute("pageEncoding") else {
            return Ok(());
        };
        if self.page_encoding_specified {
            return Err(self.syntax_error(format!(
                "pageEncoding specified more than once in {}",
                self.path
            )));
        }
        self.page_encoding_specified = true;

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
                log::debug!(
                    target: "jsp.page_parser",
                    "{}: configured page encoding {configured} overrides {declared}",
                    self.path
                );
            }
            Some(_) => {}
            None => self.config.page_encoding = Some(declared.to_string()),
        }
        Ok(())
    }
}

/// Element recording a directive. Taglib and include directives take
/// effect during translation and leave no element behind.
fn directive_element(directive: &str) -> Option<Element> {
    match directive {
        "taglib" | "include" => None,
        name => Some(Element::new(
            Some(JSP_NAMESPACE),
            format!("{JSP_PREFIX}:directive.{name}"),
        )),
    }
}
