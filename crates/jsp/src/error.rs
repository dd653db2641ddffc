use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TranslationError>;

/// Where an encoding declaration came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodingSource {
    ByteOrderMark,
    XmlProlog,
    XmlDefault,
    Configuration,
    PageDirective,
}

impl std::fmt::Display for EncodingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EncodingSource::ByteOrderMark => "byte order mark",
            EncodingSource::XmlProlog => "XML prolog",
            EncodingSource::XmlDefault => "XML default",
            EncodingSource::Configuration => "JSP configuration",
            EncodingSource::PageDirective => "page directive",
        })
    }
}

/// Every failure a translation can surface. A failed translation yields no
/// document.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error(
        "{path}: page encoding \"{first}\" from the {first_source} conflicts with \"{second}\" from the {second_source}"
    )]
    EncodingConflict {
        path: String,
        first: String,
        first_source: EncodingSource,
        second: String,
        second_source: EncodingSource,
    },

    #[error("{path}({line},{column}): {message}")]
    Syntax {
        path: String,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("{path}({line},{column}): {message}")]
    Xml {
        path: String,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("{path}({line},{column}): {message}")]
    InvalidReference {
        path: String,
        line: u32,
        column: u32,
        message: String,
    },

    /// `physical` is the loader's real path of the resource entered twice.
    #[error("circular static include dependency on {physical} ({path})")]
    CircularDependency { path: String, physical: String },

    #[error("unable to read {path}: {source}")]
    ResourceNotFound {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{path}: unsupported encoding \"{encoding}\"")]
    UnsupportedEncoding { path: String, encoding: String },

    #[error("{path}({line},{column}): error in included resource: {source}")]
    Include {
        path: String,
        line: u32,
        column: u32,
        #[source]
        source: Box<TranslationError>,
    },
}

impl TranslationError {
    pub(crate) fn syntax(path: &str, line: u32, column: u32, message: impl Into<String>) -> Self {
        TranslationError::Syntax {
            path: path.to_string(),
            line,
            column,
            message: message.into(),
        }
    }

    pub(crate) fn reference(
        path: &str,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Self {
        TranslationError::InvalidReference {
            path: path.to_string(),
            line,
            column,
            message: message.into(),
        }
    }

    pub(crate) fn xml(path: &str, line: u32, column: u32, message: impl Into<String>) -> Self {
        TranslationError::Xml {
            path: path.to_string(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Wrap an error raised inside a static include with the position of the
    /// include in the including resource. Circular dependencies pass through
    /// unwrapped so callers can match on them at any depth.
    pub(crate) fn in_include(self, path: &str, line: u32, column: u32) -> Self {
        match self {
            TranslationError::CircularDependency { .. } => self,
            other => TranslationError::Include {
                path: path.to_string(),
                line,
                column,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, unwrapping include context.
    pub fn root_cause(&self) -> &TranslationError {
        match self {
            TranslationError::Include { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_wrapping_keeps_root_cause() {
        let inner = TranslationError::syntax("/inc.jsp", 3, 4, "unterminated directive");
        let outer = inner.in_include("/index.jsp", 1, 1);
        assert!(outer.to_string().starts_with("/index.jsp(1,1)"));
        assert!(matches!(
            outer.root_cause(),
            TranslationError::Syntax { line: 3, column: 4, .. }
        ));
        assert!(std::error::Error::source(&outer).is_some());
    }

    #[test]
    fn circular_dependency_is_not_wrapped() {
        let inner = TranslationError::CircularDependency {
            path: "/a.jsp".into(),
            physical: "/srv/web/a.jsp".into(),
        };
        assert_eq!(
            inner.to_string(),
            "circular static include dependency on /srv/web/a.jsp (/a.jsp)"
        );
        let outer = inner.in_include("/b.jsp", 2, 1);
        assert!(matches!(outer, TranslationError::CircularDependency { .. }));
    }

    #[test]
    fn conflict_names_both_values_and_sources() {
        let err = TranslationError::EncodingConflict {
            path: "/a.jsp".into(),
            first: "UTF-8".into(),
            first_source: EncodingSource::ByteOrderMark,
            second: "Shift_JIS".into(),
            second_source: EncodingSource::PageDirective,
        };
        let msg = err.to_string();
        assert!(msg.contains("UTF-8") && msg.contains("byte order mark"));
        assert!(msg.contains("Shift_JIS") && msg.contains("page directive"));
    }
}
