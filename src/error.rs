use thiserror::Error;

/// A query that does not match the grammar.
///
/// `position` is the byte offset of the offending token in the query text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at position {position}: expected {expected}, found {found}")]
pub struct SyntaxError {
    pub position: usize,
    pub expected: String,
    pub found: String,
}

impl SyntaxError {
    pub(crate) fn new(position: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Location expression errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid location expression `{expr}` at offset {offset}")]
    Syntax { expr: String, offset: usize },

    #[error("empty location expression")]
    Empty,
}

/// Context resolution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unsupported schema version: {0}")]
    UnsupportedVersion(String),

    #[error("no location template for {kind} on {device_type} in {context} context")]
    NoTemplate {
        kind: String,
        device_type: String,
        context: String,
    },

    #[error("context parameter `{0}` is empty")]
    EmptyParameter(&'static str),

    #[error("context parameter `{0}` contains both quote characters")]
    UnquotableParameter(String),
}

/// Errors loading a document into an [`ElementTree`](crate::document::ElementTree)
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid document JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document I/O error: {0}")]
    Io(#[from] std::io::Error),
}
