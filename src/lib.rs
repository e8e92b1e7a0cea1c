pub mod builder;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod graph;
pub mod location;
pub mod query_ast;
pub mod query_executor;
pub mod query_parser;
pub mod resolver;
pub mod table;

pub use builder::{BuildOptions, IdScoping, build, build_graph};
pub use diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
pub use document::{Document, Element, ElementId, ElementTree};
pub use error::{DocumentError, PathError, ResolveError, SyntaxError};
pub use graph::{Graph, GraphNode, NodeType, Relation};
pub use query_executor::ResultRow;
pub use resolver::{Context, ContextResolver, DeviceType, ObjectKind, PathTemplates};

/// Parses `text` and runs it against `graph`. Syntax errors are reported
/// before the graph is touched.
pub fn query<H>(graph: &Graph<H>, text: &str) -> Result<Vec<ResultRow>, SyntaxError> {
    let ast = query_parser::parse_query(text)?;
    Ok(query_executor::execute(&ast, graph))
}
