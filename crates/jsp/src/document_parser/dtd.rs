//! Internal DTD subsets, as far as validation of a JSP document needs them.
//!
//! External subsets are never fetched. Only element names and internal
//! general entities are retained.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Dtd {
    pub root_name: String,
    /// `SYSTEM`/`PUBLIC` identifier text, unparsed.
    pub external_id: Option<String>,
    pub elements: BTreeSet<String>,
    pub entities: BTreeMap<String, String>,
}

impl Dtd {
    /// Parse the content of a `<!DOCTYPE ...>` declaration.
    pub(crate) fn parse(declaration: &str) -> Result<Self, String> {
        let declaration = declaration.trim();
        let name_end = declaration
            .find(|c: char| c.is_whitespace() || c == '[')
            .unwrap_or(declaration.len());
        let root_name = &declaration[..name_end];
        if root_name.is_empty() {
            return Err("DOCTYPE declaration names no root element".into());
        }

        let rest = &declaration[name_end..];
        let (external, subset) = match rest.find('[') {
            Some(open) => {
                let close = rest
                    .rfind(']')
                    .filter(|&close| close > open)
                    .ok_or("unterminated internal DTD subset")?;
                (&rest[..open], Some(&rest[open + 1..close]))
            }
            None => (rest, None),
        };

        let external = external.trim();
        let mut dtd = Dtd {
            root_name: root_name.to_string(),
            external_id: (!external.is_empty()).then(|| external.to_string()),
            ..Dtd::default()
        };
        if let Some(subset) = subset {
            dtd.read_internal_subset(subset)?;
        }
        Ok(dtd)
    }

    pub(crate) fn validate_element(&self, name: &str, is_root: bool) -> Result<(), String> {
        if is_root && name != self.root_name {
            return Err(format!(
                "root element \"{name}\" does not match DOCTYPE \"{}\"",
                self.root_name
            ));
        }
        if !self.elements.is_empty() && !self.elements.contains(name) {
            return Err(format!("element \"{name}\" is not declared in the DTD"));
        }
        Ok(())
    }

    fn read_internal_subset(&mut self, subset: &str) -> Result<(), String> {
        let mut rest = subset;
        while let Some(start) = rest.find('<') {
            rest = &rest[start..];
            if let Some(after) = rest.strip_prefix("<!--") {
                let end = after.find("-->").ok_or("unterminated comment in DTD")?;
                rest = &after[end + 3..];
                continue;
            }
            let end = markup_end(rest).ok_or("unterminated markup declaration in DTD")?;
            let declaration = &rest[..end];
            rest = &rest[end + 1..];

            if let Some(body) = declaration.strip_prefix("<!ELEMENT") {
                if let Some(name) = body.split_whitespace().next() {
                    self.elements.insert(name.to_string());
                }
            } else if let Some(body) = declaration.strip_prefix("<!ENTITY") {
                self.read_entity(body);
            }
        }
        Ok(())
    }

    /// First declaration of a name wins. Parameter and external entities are
    /// skipped.
    fn read_entity(&mut self, body: &str) {
        let body = body.trim_start();
        if body.starts_with('%') {
            return;
        }
        let Some(name_end) = body.find(char::is_whitespace) else {
            return;
        };
        let name = &body[..name_end];
        let definition = body[name_end..].trim_start();
        let Some(quote) = definition.chars().next().filter(|c| matches!(c, '"' | '\'')) else {
            return;
        };
        let literal = &definition[1..];
        let Some(close) = literal.find(quote) else {
            return;
        };
        let raw = &literal[..close];
        let value = quick_xml::escape::unescape(raw).map_or_else(|_| raw.to_string(), |v| v.into_owned());
        self.entities.entry(name.to_string()).or_insert(value);
    }
}

/// Offset of the `>` closing a markup declaration, skipping quoted text.
fn markup_end(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in text.char_indices() {
        match (quote, ch) {
            (None, '"' | '\'') => quote = Some(ch),
            (Some(open), _) if open == ch => quote = None,
            (None, '>') => return Some(idx),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_root_external_id_and_subset() {
        let dtd = Dtd::parse(
            r#" page SYSTEM "page.dtd" [
                <!-- shapes -->
                <!ELEMENT page (#PCDATA|item)*>
                <!ELEMENT item EMPTY>
                <!ATTLIST item name CDATA #IMPLIED>
                <!ENTITY co "ACME &amp; Sons">
                <!ENTITY co "ignored">
                <!ENTITY % param "x">
                <!ENTITY logo SYSTEM "logo.gif">
            ]"#,
        )
        .expect("parse");
        assert_eq!(dtd.root_name, "page");
        assert_eq!(dtd.external_id.as_deref(), Some("SYSTEM \"page.dtd\""));
        assert_eq!(dtd.elements.len(), 2);
        assert_eq!(dtd.entities.get("co").map(String::as_str), Some("ACME & Sons"));
        assert!(!dtd.entities.contains_key("param"));
        assert!(!dtd.entities.contains_key("logo"));
    }

    #[test]
    fn validation_checks_root_and_declared_elements() {
        let dtd = Dtd::parse("page [<!ELEMENT page ANY>]").expect("parse");
        assert!(dtd.validate_element("page", true).is_ok());
        assert!(dtd.validate_element("other", true).is_err());
        assert!(dtd.validate_element("item", false).is_err());

        let open = Dtd::parse("page SYSTEM \"x.dtd\"").expect("parse");
        assert!(open.validate_element("anything", false).is_ok());
    }

    #[test]
    fn rejects_unterminated_subset() {
        assert!(Dtd::parse("page [<!ELEMENT page ANY>").is_err());
        assert!(Dtd::parse("").is_err());
    }
}
