use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::ops::Index;

pub const ROOT_ID: &str = "config_root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Address,
    AddressGroup,
    Service,
    ServiceGroup,
    SecurityRule,
    NatRule,
    Application,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Root => "root",
            NodeType::Address => "address",
            NodeType::AddressGroup => "address-group",
            NodeType::Service => "service",
            NodeType::ServiceGroup => "service-group",
            NodeType::SecurityRule => "security-rule",
            NodeType::NatRule => "nat-rule",
            NodeType::Application => "application",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Contains,
    UsesSource,
    UsesDestination,
    UsesService,
    UsesApplication,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Contains => "contains",
            Relation::UsesSource => "uses-source",
            Relation::UsesDestination => "uses-destination",
            Relation::UsesService => "uses-service",
            Relation::UsesApplication => "uses-application",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressAttrs {
    pub addr_type: Option<String>,
    pub value: Option<String>,
    pub device_group: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupAttrs {
    /// `static` or `dynamic`
    pub group_type: Option<String>,
    pub filter: Option<String>,
    pub device_group: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceAttrs {
    pub protocol: Option<String>,
    pub port: Option<String>,
    pub source_port: Option<String>,
    pub device_group: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleAttrs {
    pub from: Option<String>,
    pub to: Option<String>,
    pub action: Option<String>,
    pub disabled: Option<String>,
    pub log_setting: Option<String>,
    pub device_group: Option<String>,
    /// `None` outside Panorama pre/post rulebases.
    pub is_post_rule: Option<bool>,
    pub description: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Attributes {
    #[default]
    None,
    Address(AddressAttrs),
    Group(GroupAttrs),
    Service(ServiceAttrs),
    Rule(RuleAttrs),
}

impl Attributes {
    /// Type-agnostic attribute lookup by query property name.
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match (self, name) {
            (Attributes::Address(a), "addr_type") => &a.addr_type,
            (Attributes::Address(a), "value") => &a.value,
            (Attributes::Address(a), "device_group") => &a.device_group,
            (Attributes::Address(a), "description") => &a.description,
            (Attributes::Address(a), "tags") => &a.tags,
            (Attributes::Group(g), "group_type") => &g.group_type,
            (Attributes::Group(g), "filter") => &g.filter,
            (Attributes::Group(g), "device_group") => &g.device_group,
            (Attributes::Group(g), "description") => &g.description,
            (Attributes::Group(g), "tags") => &g.tags,
            (Attributes::Service(s), "protocol") => &s.protocol,
            (Attributes::Service(s), "port") => &s.port,
            (Attributes::Service(s), "source_port") => &s.source_port,
            (Attributes::Service(s), "device_group") => &s.device_group,
            (Attributes::Service(s), "description") => &s.description,
            (Attributes::Service(s), "tags") => &s.tags,
            (Attributes::Rule(r), "is_post_rule") => {
                return r.is_post_rule.map(|post| if post { "true" } else { "false" });
            }
            (Attributes::Rule(r), "from") => &r.from,
            (Attributes::Rule(r), "to") => &r.to,
            (Attributes::Rule(r), "action") => &r.action,
            (Attributes::Rule(r), "disabled") => &r.disabled,
            (Attributes::Rule(r), "log_setting") => &r.log_setting,
            (Attributes::Rule(r), "device_group") => &r.device_group,
            (Attributes::Rule(r), "description") => &r.description,
            (Attributes::Rule(r), "tags") => &r.tags,
            _ => return None,
        };
        value.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode<H> {
    pub id: String,
    pub node_type: NodeType,
    pub name: String,
    pub attributes: Attributes,
    pub placeholder: bool,
    /// Element this node was built from. Never set on placeholders.
    pub source: Option<H>,
}

impl<H> GraphNode<H> {
    pub fn root() -> Self {
        Self {
            id: ROOT_ID.to_string(),
            node_type: NodeType::Root,
            name: ROOT_ID.to_string(),
            attributes: Attributes::None,
            placeholder: false,
            source: None,
        }
    }

    pub fn defined(
        node_type: NodeType,
        id: String,
        name: impl Into<String>,
        attributes: Attributes,
        source: H,
    ) -> Self {
        Self {
            id,
            node_type,
            name: name.into(),
            attributes,
            placeholder: false,
            source: Some(source),
        }
    }

    pub fn placeholder(node_type: NodeType, id: String, name: impl Into<String>) -> Self {
        Self {
            id,
            node_type,
            name: name.into(),
            attributes: Attributes::None,
            placeholder: true,
            source: None,
        }
    }

    /// Query-visible property: `id`, `name`, `type`, `placeholder`, or any
    /// attribute of this node's type.
    pub fn property(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(&self.id),
            "name" => Some(&self.name),
            "type" => Some(self.node_type.as_str()),
            "placeholder" => Some(if self.placeholder { "true" } else { "false" }),
            other => self.attributes.get(other),
        }
    }
}

/// `"{type}:{name}"`, or `"{type}:{scope}/{name}"` for a scoped object.
pub fn node_id(node_type: NodeType, name: &str, scope: Option<&str>) -> String {
    match scope {
        Some(scope) => format!("{}:{scope}/{name}", node_type.as_str()),
        None => format!("{}:{name}", node_type.as_str()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphEdge {
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub relation: Relation,
}

/// Edges leaving and entering one node, in insertion order.
#[derive(Debug, Clone, Default)]
struct Adjacency {
    outgoing: Vec<(Relation, NodeIndex)>,
    incoming: Vec<(Relation, NodeIndex)>,
}

#[derive(Debug, Clone)]
pub struct Graph<H> {
    nodes: Vec<GraphNode<H>>,
    index: HashMap<String, NodeIndex>,
    edges: Vec<GraphEdge>,
    edge_set: HashSet<GraphEdge>,
    adjacency: Vec<Adjacency>,
}

impl<H> Default for Graph<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Graph<H> {
    /// A graph holding only the root node.
    pub fn new() -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            edge_set: HashSet::new(),
            adjacency: Vec::new(),
        };
        graph.add_node(GraphNode::root());
        graph
    }

    pub fn root(&self) -> NodeIndex {
        NodeIndex(0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes in insertion order, root first.
    pub fn nodes(&self) -> &[GraphNode<H>] {
        &self.nodes
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode<H>> {
        self.index_of(id).map(|idx| &self.nodes[idx.0])
    }

    /// Inserts `node`, or overwrites the node with the same id in place so
    /// its position in insertion order is unchanged. Edges are untouched.
    pub fn add_node(&mut self, node: GraphNode<H>) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node.id) {
            self.nodes[idx.0] = node;
            return idx;
        }
        let idx = NodeIndex(self.nodes.len());
        self.index.insert(node.id.clone(), idx);
        self.nodes.push(node);
        self.adjacency.push(Adjacency::default());
        idx
    }

    /// Returns false when the triple was already present.
    pub fn add_edge(&mut self, source: NodeIndex, target: NodeIndex, relation: Relation) -> bool {
        let edge = GraphEdge {
            source,
            target,
            relation,
        };
        if !self.edge_set.insert(edge) {
            return false;
        }
        self.edges.push(edge);
        self.adjacency[source.0].outgoing.push((relation, target));
        self.adjacency[target.0].incoming.push((relation, source));
        true
    }

    /// Drops every edge leaving `source`. Returns how many were removed.
    pub fn remove_outgoing(&mut self, source: NodeIndex) -> usize {
        let outgoing = std::mem::take(&mut self.adjacency[source.0].outgoing);
        if outgoing.is_empty() {
            return 0;
        }
        for &(relation, target) in &outgoing {
            self.edge_set.remove(&GraphEdge {
                source,
                target,
                relation,
            });
            self.adjacency[target.0]
                .incoming
                .retain(|&(r, s)| !(r == relation && s == source));
        }
        self.edges.retain(|e| e.source != source);
        outgoing.len()
    }

    pub fn has_edge(&self, source: &str, target: &str, relation: Relation) -> bool {
        match (self.index_of(source), self.index_of(target)) {
            (Some(source), Some(target)) => self.edge_set.contains(&GraphEdge {
                source,
                target,
                relation,
            }),
            _ => false,
        }
    }

    /// Targets of edges leaving `id`, optionally restricted to one relation.
    pub fn outgoing(&self, id: &str, relation: Option<Relation>) -> Vec<&GraphNode<H>> {
        let Some(idx) = self.index_of(id) else {
            return Vec::new();
        };
        self.neighbours(&self.adjacency[idx.0].outgoing, relation)
    }

    /// Sources of edges entering `id`: the groups and rules that use it.
    pub fn incoming(&self, id: &str, relation: Option<Relation>) -> Vec<&GraphNode<H>> {
        let Some(idx) = self.index_of(id) else {
            return Vec::new();
        };
        self.neighbours(&self.adjacency[idx.0].incoming, relation)
    }

    fn neighbours(
        &self,
        list: &[(Relation, NodeIndex)],
        relation: Option<Relation>,
    ) -> Vec<&GraphNode<H>> {
        list.iter()
            .filter(|(r, _)| relation.is_none_or(|wanted| *r == wanted))
            .map(|&(_, idx)| &self.nodes[idx.0])
            .collect()
    }

    /// True when root has a direct `contains` edge to `id`.
    pub fn is_rooted(&self, id: &str) -> bool {
        self.has_edge(ROOT_ID, id, Relation::Contains)
    }

    /// Everything reachable from root through `contains` edges.
    pub fn reachable_from_root(&self) -> HashSet<NodeIndex> {
        let mut seen = HashSet::from([self.root()]);
        let mut queue = VecDeque::from([self.root()]);
        while let Some(current) = queue.pop_front() {
            for &(relation, target) in &self.adjacency[current.0].outgoing {
                if relation == Relation::Contains && seen.insert(target) {
                    queue.push_back(target);
                }
            }
        }
        seen
    }

    /// Edges as `(source id, target id, relation)`, in insertion order.
    pub fn edge_triples(&self) -> Vec<(&str, &str, Relation)> {
        self.edges
            .iter()
            .map(|e| {
                (
                    self.nodes[e.source.0].id.as_str(),
                    self.nodes[e.target.0].id.as_str(),
                    e.relation,
                )
            })
            .collect()
    }
}

impl<H> Index<NodeIndex> for Graph<H> {
    type Output = GraphNode<H>;

    fn index(&self, idx: NodeIndex) -> &GraphNode<H> {
        &self.nodes[idx.0]
    }
}
