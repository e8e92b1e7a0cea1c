use std::collections::HashSet;

use winnow::ascii::space0;
use winnow::combinator::{alt, delimited, opt, preceded, repeat};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

use crate::document::{ElementId, ElementTree};
use crate::error::PathError;

#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<AttrPredicate>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    Name(String),
    Any,
    SelfNode,
    Parent,
}

/// `[@name]` when `value` is `None`, `[@name='value']` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrPredicate {
    pub name: String,
    pub value: Option<String>,
}

pub fn parse_location(expr: &str) -> Result<LocationPath, PathError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(PathError::Empty);
    }
    let mut input = trimmed;
    match location_path(&mut input) {
        Ok(path) if input.is_empty() => Ok(path),
        _ => Err(PathError::Syntax {
            expr: expr.to_string(),
            offset: trimmed.len() - input.len(),
        }),
    }
}

fn location_path(input: &mut &str) -> winnow::Result<LocationPath> {
    let lead = opt(separator).parse_next(input)?;
    let first = step.parse_next(input)?;
    let rest: Vec<(Axis, Step)> = repeat(0.., (separator, step)).parse_next(input)?;

    let mut steps = Vec::with_capacity(rest.len() + 1);
    steps.push(Step {
        axis: lead.unwrap_or(Axis::Child),
        ..first
    });
    steps.extend(rest.into_iter().map(|(axis, s)| Step { axis, ..s }));

    Ok(LocationPath {
        absolute: lead.is_some(),
        steps,
    })
}

fn separator(input: &mut &str) -> winnow::Result<Axis> {
    alt(("//".value(Axis::Descendant), "/".value(Axis::Child))).parse_next(input)
}

fn step(input: &mut &str) -> winnow::Result<Step> {
    let test = node_test.parse_next(input)?;
    let predicates: Vec<AttrPredicate> = repeat(0.., predicate).parse_next(input)?;
    Ok(Step {
        axis: Axis::Child,
        test,
        predicates,
    })
}

fn node_test(input: &mut &str) -> winnow::Result<NodeTest> {
    alt((
        "..".value(NodeTest::Parent),
        ".".value(NodeTest::SelfNode),
        "*".value(NodeTest::Any),
        name.map(|n: &str| NodeTest::Name(n.to_string())),
    ))
    .parse_next(input)
}

fn name<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '-' || c == '_').parse_next(input)
}

fn predicate(input: &mut &str) -> winnow::Result<AttrPredicate> {
    "[".parse_next(input)?;
    space0.parse_next(input)?;
    "@".parse_next(input)?;
    let attr = name.parse_next(input)?;
    space0.parse_next(input)?;
    let value = opt(preceded(("=", space0), quoted)).parse_next(input)?;
    space0.parse_next(input)?;
    "]".parse_next(input)?;
    Ok(AttrPredicate {
        name: attr.to_string(),
        value: value.map(str::to_string),
    })
}

fn quoted<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    alt((
        delimited('\'', take_till(0.., '\''), '\''),
        delimited('"', take_till(0.., '"'), '"'),
    ))
    .parse_next(input)
}

impl LocationPath {
    /// Evaluates the path relative to `context`, returning matches in
    /// document order without duplicates.
    pub fn evaluate(&self, tree: &ElementTree, context: ElementId) -> Vec<ElementId> {
        // `None` stands for the document node above the root element.
        let mut current: Vec<Option<ElementId>> = if self.absolute {
            vec![None]
        } else {
            vec![Some(context)]
        };

        for step in &self.steps {
            let mut seen = HashSet::new();
            let mut next: Vec<ElementId> = Vec::new();
            for &from in &current {
                for id in step_candidates(tree, from, step) {
                    if seen.insert(id) {
                        next.push(id);
                    }
                }
            }
            next.sort();
            current = next.into_iter().map(Some).collect();
        }

        current.into_iter().flatten().collect()
    }
}

fn step_candidates(tree: &ElementTree, from: Option<ElementId>, step: &Step) -> Vec<ElementId> {
    let base: Vec<ElementId> = match (&step.test, step.axis) {
        (NodeTest::SelfNode, _) => from.into_iter().collect(),
        (NodeTest::Parent, _) => from.and_then(|id| tree.parent_of(id)).into_iter().collect(),
        (_, Axis::Child) => match from {
            Some(id) => tree.children_of(id).to_vec(),
            None => vec![tree.root_id()],
        },
        (_, Axis::Descendant) => match from {
            Some(id) => tree.descendants_of(id).collect(),
            None => std::iter::once(tree.root_id())
                .chain(tree.descendants_of(tree.root_id()))
                .collect(),
        },
    };

    base.into_iter()
        .filter(|&id| match &step.test {
            NodeTest::Name(n) => tree.tag_of(id) == n,
            _ => true,
        })
        .filter(|&id| {
            step.predicates.iter().all(|p| match (tree.attr_of(id, &p.name), &p.value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            })
        })
        .collect()
}
