use super::JspPageParser;
use crate::context::TranslationContext;
use crate::dom::Element;
use crate::error::Result;
use crate::names::{DECLARATION, EXPRESSION, JSP_NAMESPACE, JSP_PREFIX, SCRIPTLET};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum ScriptingKind {
    Scriptlet,
    Expression,
    Declaration,
}

impl ScriptingKind {
    fn local_name(self) -> &'static str {
        match self {
            ScriptingKind::Scriptlet => SCRIPTLET,
            ScriptingKind::Expression => EXPRESSION,
            ScriptingKind::Declaration => DECLARATION,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Comment {
    Line,
    Block,
}

impl<'s, 'c> JspPageParser<'s, 'c> {
    /// Body of `<%`, `<%=` or `<%!` up to the closing `%>`. The body is kept
    /// verbatim except that `<`, `>` and `&` are escaped.
    pub(super) fn process_scripting(
        &mut self,
        ctx: &mut TranslationContext<'_>,
        kind: ScriptingKind,
    ) -> Result<()> {
        let mut body = String::new();
        let mut lines = 1;
        let mut quote: Option<char> = None;
        let mut comment: Option<Comment> = None;
        let mut escaped = false;
        let mut previous: Option<char> = None;

        loop {
            let Some(ch) = self.reader.read() else {
                return Err(self.syntax_error(format!(
                    "unterminated jsp:{} element",
                    kind.local_name()
                )));
            };
            match ch {
                '%' if self.reader.peek() == Some('>') => {
                    self.reader.read();
                    break;
                }
                '<' => {
                    if quote.is_none() && comment.is_none() && self.reader.peek() == Some('%') {
                        return Err(self.syntax_error(format!(
                            "'<%' inside jsp:{} element",
                            kind.local_name()
                        )));
                    }
                    body.push_str("&lt;");
                }
                '>' => body.push_str("&gt;"),
                '&' => body.push_str("&amp;"),
                '\'' | '"' => {
                    if comment.is_none() && !escaped {
                        quote = match quote {
                            None => Some(ch),
                            Some(open) if open == ch => None,
                            other => other,
                        };
                    }
                    body.push(ch);
                }
                '\\' => {
                    body.push(ch);
                    if quote.is_some() && !escaped {
                        escaped = true;
                        previous = Some(ch);
                        continue;
                    }
                }
                '\n' => {
                    lines += 1;
                    if comment == Some(Comment::Line) {
                        comment = None;
                    }
                    body.push(ch);
                }
                '/' if quote.is_none() && comment.is_none() => {
                    body.push(ch);
                    match self.reader.peek() {
                        Some('*') => {
                            self.reader.read();
                            body.push('*');
                            comment = Some(Comment::Block);
                            previous = None;
                            continue;
                        }
                        Some('/') => comment = Some(Comment::Line),
                        _ => {}
                    }
                }
                '/' if comment == Some(Comment::Block) && previous == Some('*') => {
                    comment = None;
                    body.push(ch);
                }
                _ => body.push(ch),
            }
            escaped = false;
            previous = Some(ch);
        }

        let local = kind.local_name();
        let mut element = Element::new(Some(JSP_NAMESPACE), format!("{JSP_PREFIX}:{local}"))
            .with_position(self.syntax_line, self.syntax_column);
        Self::set_jsp_id(&mut element, self.syntax_marker(lines));
        let parent = self.current_parent();
        let node = self.document.create_element(element);
        self.document.append_child(parent, node);
        let content = self.document.create_cdata(body, ctx.next_content_id());
        self.document.append_child(node, content);
        Ok(())
    }
}
