use std::fmt;

use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The context resolver failed (or its location could not be evaluated)
    /// and the broad fallback expression was used instead.
    FallbackLocationUsed {
        kind: &'static str,
        location: String,
        reason: String,
    },
    /// A referenced name had no definition and a placeholder node was made.
    PlaceholderCreated {
        node_type: &'static str,
        name: String,
        referenced_by: String,
        scope: String,
    },
    /// An entry or member without a name was skipped.
    RuleMissingNameSkipped {
        kind: &'static str,
        parent: Option<String>,
        scope: String,
    },
    /// A second definition landed on an existing node id.
    DefinitionCollapsed { id: String, scope: String },
}

impl Diagnostic {
    pub fn event(&self) -> &'static str {
        match self {
            Diagnostic::FallbackLocationUsed { .. } => "fallback_location_used",
            Diagnostic::PlaceholderCreated { .. } => "placeholder_created",
            Diagnostic::RuleMissingNameSkipped { .. } => "rule_missing_name_skipped",
            Diagnostic::DefinitionCollapsed { .. } => "definition_collapsed",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::FallbackLocationUsed {
                kind,
                location,
                reason,
            } => write!(f, "{kind}: using fallback location {location} ({reason})"),
            Diagnostic::PlaceholderCreated {
                node_type,
                name,
                referenced_by,
                scope,
            } => write!(
                f,
                "{node_type} `{name}` referenced by {referenced_by} is not defined in {scope}"
            ),
            Diagnostic::RuleMissingNameSkipped { kind, parent, scope } => match parent {
                Some(parent) => write!(f, "{kind} without a name under {parent} in {scope} skipped"),
                None => write!(f, "{kind} entry without a name in {scope} skipped"),
            },
            Diagnostic::DefinitionCollapsed { id, scope } => {
                write!(f, "{id} redefined in {scope}, keeping the last definition")
            }
        }
    }
}

pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Forwards diagnostics to `tracing`. Dangling references are routine in
/// real configurations, so placeholders go out at debug level.
#[derive(Debug, Default)]
pub struct TracingSink {
    emitted: usize,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.emitted += 1;
        match &diagnostic {
            Diagnostic::PlaceholderCreated { .. } => {
                debug!(event = diagnostic.event(), "{diagnostic}")
            }
            _ => warn!(event = diagnostic.event(), "{diagnostic}"),
        }
    }
}
