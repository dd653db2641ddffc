use super::JspPageParser;
use crate::context::TranslationContext;
use crate::dom::Element;
use crate::error::Result;
use crate::jsp_id::end_marker;
use crate::names::{DIRECTIVE_INCLUDE, ID, JSP_NAMESPACE, JSP_PREFIX, strip_urn};

/// Tag opening read up to its name.
struct TagHead {
    raw: String,
    prefix: String,
    name: String,
    in_name: bool,
    at_eof: bool,
    /// The head ended at its closing `>`.
    closed: bool,
    lines: u32,
}

impl<'s, 'c> JspPageParser<'s, 'c> {
    /// A `<` starting neither a comment nor a scripting element has been
    /// consumed. Standard and custom actions become elements; anything else
    /// is kept verbatim as template text.
    pub(super) fn process_action(&mut self, ctx: &mut TranslationContext<'_>) -> Result<()> {
        let head = self.read_tag_head();

        let prefix = head.prefix.trim();
        let (is_end_tag, prefix) = match prefix.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, prefix),
        };
        let name = head.name.trim();
        let (name, has_children) = match name.strip_suffix('/') {
            Some(rest) => (rest, false),
            None => (name, true),
        };
        let known_prefix = self.tag_prefixes.contains_key(prefix);

        if !(head.in_name && (prefix == JSP_PREFIX || known_prefix)) {
            if head.in_name && !known_prefix && !self.undeclared_prefix_uses.contains_key(prefix) {
                let first_use = format!("{}({},{})", self.path, self.syntax_line, self.syntax_column);
                self.undeclared_prefix_uses.insert(prefix.to_string(), first_use);
            }
            self.template_text.push_str(&head.raw);
            return Ok(());
        }

        if head.at_eof {
            return Err(self.syntax_error(format!("unterminated <{prefix}:{name}> tag")));
        }
        self.flush_template_text(ctx);

        let prefix = prefix.to_string();
        let name = name.to_string();
        if is_end_tag {
            if !self.close_action(ctx, &prefix, &name, &head.raw)? {
                return Ok(());
            }
        } else {
            self.open_action(ctx, &prefix, &name, has_children, &head)?;
        }
        self.mark_text_start();
        Ok(())
    }

    fn read_tag_head(&mut self) -> TagHead {
        let mut head = TagHead {
            raw: String::from("<"),
            prefix: String::new(),
            name: String::new(),
            in_name: false,
            at_eof: false,
            closed: false,
            lines: 1,
        };
        loop {
            if self.reader.peek() == Some('<') {
                break;
            }
            let Some(ch) = self.reader.read() else {
                head.at_eof = true;
                break;
            };
            head.raw.push(ch);
            match ch {
                ':' => head.in_name = true,
                '>' => {
                    head.closed = true;
                    break;
                }
                ' ' | '\t' | '\r' | '\n' => {
                    if ch == '\n' {
                        head.lines += 1;
                    }
                    while let Some(w) = self.reader.peek().filter(|c| is_tag_space(*c)) {
                        self.reader.read();
                        head.raw.push(w);
                        if w == '\n' {
                            head.lines += 1;
                        }
                    }
                    let attributes_follow = self.reader.peek() != Some('>');
                    if attributes_follow && (head.in_name || !head.prefix.trim().is_empty()) {
                        break;
                    }
                }
                _ if head.in_name => head.name.push(ch),
                _ => head.prefix.push(ch),
            }
        }
        head
    }

    /// Returns false when the end tag was kept as template text.
    fn close_action(
        &mut self,
        ctx: &TranslationContext<'_>,
        prefix: &str,
        name: &str,
        raw: &str,
    ) -> Result<bool> {
        let top = self.current_parent();
        let matches = self.open_elements.len() > 1
            && self
                .document
                .element(top)
                .is_some_and(|el| el.prefix() == Some(prefix) && el.local_name() == name);

        if matches {
            self.open_elements.pop();
            let suffix = end_marker(self.syntax_line, self.syntax_column);
            if let Some(element) = self.document.element_mut(top) {
                let id_name = format!("{JSP_PREFIX}:{ID}");
                let id = element.attribute(&id_name).unwrap_or_default().to_string();
                element.set_attribute_ns(Some(JSP_NAMESPACE), &id_name, id + &suffix);
            }
            return Ok(true);
        }

        if ctx.options.allow_unmatched_end_tag {
            log::debug!(
                target: "jsp.page_parser",
                "{}({},{}): unmatched </{prefix}:{name}> kept as template text",
                self.path, self.syntax_line, self.syntax_column
            );
            self.text_line = self.syntax_line;
            self.text_column = self.syntax_column;
            self.template_text.push_str(raw);
            return Ok(false);
        }

        let expected = match self.document.element(top) {
            Some(el) if self.open_elements.len() > 1 => format!("</{}>", el.name),
            _ => "no end tag".to_string(),
        };
        Err(self.syntax_error(format!(
            "unmatched end tag </{prefix}:{name}>, expected {expected}"
        )))
    }

    fn open_action(
        &mut self,
        ctx: &mut TranslationContext<'_>,
        prefix: &str,
        name: &str,
        has_children: bool,
        head: &TagHead,
    ) -> Result<()> {
        let namespace = if prefix == JSP_PREFIX {
            JSP_NAMESPACE.to_string()
        } else {
            self.tag_prefixes
                .get(prefix)
                .map(|uri| strip_urn(uri).to_string())
                .unwrap_or_default()
        };
        let mut element = Element::new(Some(&namespace), format!("{prefix}:{name}"))
            .with_position(self.syntax_line, self.syntax_column);

        let mut lines = head.lines;
        let has_children = if head.closed {
            has_children
        } else {
            self.parse_action_attributes(ctx, &mut element, &mut lines)?
        };
        Self::set_jsp_id(&mut element, self.syntax_marker(lines));

        if prefix == JSP_PREFIX && name == DIRECTIVE_INCLUDE {
            let Some(file) = element.attribute("file").map(str::to_string) else {
                return Err(self.reference_error("jsp:directive.include requires a file attribute"));
            };
            return self.insert_include(ctx, &file);
        }

        let parent = self.current_parent();
        let node = self.document.create_element(element);
        self.document.append_child(parent, node);
        if has_children {
            self.open_elements.push(node);
        }
        Ok(())
    }

    /// Read attributes up to the closing `>` of a start tag. Returns whether
    /// the element has content (false for `/>`).
    fn parse_action_attributes(
        &mut self,
        ctx: &TranslationContext<'_>,
        element: &mut Element,
        lines: &mut u32,
    ) -> Result<bool> {
        let mut has_children = true;
        let mut name = String::new();
        let mut value = String::new();
        let mut quote: Option<char> = None;
        let mut escaped = false;
        let mut previous: Option<char> = None;

        loop {
            let Some(ch) = self.reader.read() else {
                return Err(self.syntax_error(format!("unterminated <{}> tag", element.name)));
            };
            match ch {
                '>' if quote.is_none() => {
                    if previous == Some('/') {
                        has_children = false;
                    }
                    break;
                }
                '>' => {
                    if previous != Some('%') {
                        value.push_str("&gt;");
                    }
                }
                '"' | '\'' => {
                    match quote {
                        Some(open) if open == ch && !escaped => {
                            quote = None;
                            let attr = std::mem::take(&mut name);
                            let val = std::mem::take(&mut value);
                            self.set_action_attribute(ctx, element, attr.trim(), val)?;
                        }
                        Some(_) => value.push(ch),
                        None => quote = Some(ch),
                    }
                    escaped = false;
                }
                '\\' if quote.is_some() => {
                    if escaped {
                        escaped = false;
                        value.push('\\');
                    } else if matches!(self.reader.peek(), Some('\'' | '"' | '\\')) {
                        escaped = true;
                        let after = self.reader.peek_nth(1);
                        if ctx.options.eval_expression_following_two_backslashes
                            && !matches!(after, Some('\'' | '"'))
                        {
                            value.push('\\');
                        }
                    } else {
                        value.push('\\');
                    }
                }
                '&' => {
                    if quote.is_some() {
                        value.push_str("&amp;");
                    }
                }
                '<' if quote.is_some() => {
                    // `<%=` opens a runtime expression; its `<` is dropped.
                    let next = self.reader.peek_nth(0);
                    let after = self.reader.peek_nth(1);
                    if next != Some('%') && after != Some('=') {
                        value.push_str("&lt;");
                    }
                }
                '<' => {
                    return Err(self.syntax_error(format!(
                        "invalid '<' inside <{}> tag",
                        element.name
                    )));
                }
                ' ' | '\t' | '\r' | '\n' | '=' => {
                    if ch == '\n' {
                        *lines += 1;
                    }
                    if quote.is_some() {
                        value.push(ch);
                    }
                }
                _ if quote.is_some() => value.push(ch),
                _ => name.push(ch),
            }
            previous = Some(ch);
        }
        Ok(has_children)
    }

    fn set_action_attribute(
        &self,
        ctx: &TranslationContext<'_>,
        element: &mut Element,
        name: &str,
        value: String,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(self.syntax_error(format!(
                "attribute value without a name in <{}> tag",
                element.name
            )));
        }
        let namespace = name
            .split_once(':')
            .and_then(|(prefix, _)| self.tag_prefixes.get(prefix))
            .cloned();

        // A repeated attribute overwrites unless values accumulate.
        if ctx.options.allow_multiple_attribute_values {
            element.push_attribute_value(name, value.clone());
        }
        element.set_attribute_ns(namespace.as_deref(), name, value);
        Ok(())
    }
}

fn is_tag_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r' | '\n')
}
