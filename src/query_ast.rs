#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub pattern: Pattern,
    pub predicate: Option<Predicate>,
    pub projection: Vec<Projection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub variable: String,
    pub label: Option<String>,
}

/// `variable.property`
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAccess {
    pub variable: String,
    pub property: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        access: PropertyAccess,
        op: CompareOp,
        literal: String,
    },
    /// Two or more operands; chains stay flat.
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Property(PropertyAccess),
    Variable(String),
}

impl Projection {
    /// Output column label: `r.name` or the bare variable.
    pub fn label(&self) -> String {
        match self {
            Projection::Property(access) => format!("{}.{}", access.variable, access.property),
            Projection::Variable(variable) => variable.clone(),
        }
    }
}

impl Query {
    pub fn column_labels(&self) -> Vec<String> {
        self.projection.iter().map(Projection::label).collect()
    }
}
