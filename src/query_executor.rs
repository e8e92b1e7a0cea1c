use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::graph::{Graph, GraphNode, NodeType};
use crate::query_ast::*;

/// One output row: projection labels mapped to values, in projection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    columns: Vec<(String, String)>,
}

impl ResultRow {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn columns(&self) -> &[(String, String)] {
        &self.columns
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(_, v)| v.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResultRow {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (label, value) in &self.columns {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// Evaluates `query` against `graph`. Rows come out in node insertion order;
/// nothing is sorted or deduplicated.
pub fn execute<H>(query: &Query, graph: &Graph<H>) -> Vec<ResultRow> {
    graph
        .nodes()
        .iter()
        .filter(|node| matches_label(&query.pattern, node))
        .filter(|node| {
            query
                .predicate
                .as_ref()
                .is_none_or(|predicate| evaluate(predicate, node))
        })
        .map(|node| project(&query.projection, node))
        .collect()
}

/// Without a label every node except root is a candidate. A label no node
/// carries simply matches nothing.
fn matches_label<H>(pattern: &Pattern, node: &GraphNode<H>) -> bool {
    match &pattern.label {
        Some(label) => node.node_type.as_str() == label,
        None => node.node_type != NodeType::Root,
    }
}

/// Comparisons against a property the node does not have are false,
/// whatever the operator.
fn evaluate<H>(predicate: &Predicate, node: &GraphNode<H>) -> bool {
    match predicate {
        Predicate::Compare {
            access,
            op,
            literal,
        } => match node.property(&access.property) {
            None => false,
            Some(value) => match op {
                CompareOp::Eq => value == literal,
                CompareOp::Ne => value != literal,
                CompareOp::Contains => value.contains(literal.as_str()),
            },
        },
        Predicate::And(operands) => operands.iter().all(|p| evaluate(p, node)),
        Predicate::Or(operands) => operands.iter().any(|p| evaluate(p, node)),
        Predicate::Not(inner) => !evaluate(inner, node),
    }
}

fn project<H>(projection: &[Projection], node: &GraphNode<H>) -> ResultRow {
    projection
        .iter()
        .map(|proj| {
            let value = match proj {
                Projection::Property(access) => node.property(&access.property).unwrap_or_default(),
                Projection::Variable(_) => node.name.as_str(),
            };
            (proj.label(), value)
        })
        .collect()
}
