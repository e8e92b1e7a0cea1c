use std::collections::HashSet;

use tracing::debug;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::document::Document;
use crate::graph::{
    AddressAttrs, Attributes, Graph, GraphNode, GroupAttrs, NodeIndex, NodeType, Relation,
    RuleAttrs, ServiceAttrs, node_id,
};
use crate::resolver::{Context, ContextResolver, DeviceType, ObjectKind, PathTemplates};

const ADDRESS_TYPES: [&str; 4] = ["ip-netmask", "ip-range", "fqdn", "ip-wildcard"];
const SERVICE_PROTOCOLS: [&str; 3] = ["tcp", "udp", "sctp"];
const DEVICE_GROUPS: &str = "/config/devices/entry/device-group/entry";
const SHARED_SCOPE: &str = "/config/shared";
const SHARED: &str = "shared";

/// How node ids treat same-named objects in different device groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdScoping {
    /// Panorama objects owned by a device group get `"{type}:{group}/{name}"`.
    #[default]
    Qualified,
    /// Always `"{type}:{name}"`; the last definition seen wins.
    Collapsed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub device_type: DeviceType,
    pub context: Context,
    pub version: String,
    pub id_scoping: IdScoping,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            device_type: DeviceType::Firewall,
            context: Context::Auto,
            version: "10.1".to_string(),
            id_scoping: IdScoping::Qualified,
        }
    }
}

/// Builds with the bundled [`PathTemplates`] resolver.
pub fn build_graph<D: Document>(
    doc: &D,
    options: &BuildOptions,
    sink: &mut dyn DiagnosticSink,
) -> Graph<D::Handle> {
    build(doc, options, &PathTemplates::default(), sink)
}

/// Projects `doc` into a graph. Never fails: resolver errors fall back to
/// broad location expressions, unnamed entries are skipped and dangling
/// references become placeholder nodes, each reported to `sink`.
pub fn build<D: Document>(
    doc: &D,
    options: &BuildOptions,
    resolver: &dyn ContextResolver,
    sink: &mut dyn DiagnosticSink,
) -> Graph<D::Handle> {
    let builder = Builder {
        doc,
        options,
        resolver,
        sink,
        graph: Graph::new(),
    };
    builder.run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Address,
    Service,
    Application,
}

impl Family {
    /// Group namespace first, then plain objects.
    fn lookup_order(&self) -> &'static [NodeType] {
        match self {
            Family::Address => &[NodeType::AddressGroup, NodeType::Address],
            Family::Service => &[NodeType::ServiceGroup, NodeType::Service],
            Family::Application => &[NodeType::Application],
        }
    }

    fn placeholder_type(&self) -> NodeType {
        match self {
            Family::Address => NodeType::Address,
            Family::Service => NodeType::Service,
            Family::Application => NodeType::Application,
        }
    }
}

const SECURITY_REFERENCES: [(&str, Family, Relation); 4] = [
    ("source", Family::Address, Relation::UsesSource),
    ("destination", Family::Address, Relation::UsesDestination),
    ("service", Family::Service, Relation::UsesService),
    ("application", Family::Application, Relation::UsesApplication),
];

const NAT_REFERENCES: [(&str, Family, Relation); 3] = [
    ("source", Family::Address, Relation::UsesSource),
    ("destination", Family::Address, Relation::UsesDestination),
    ("service", Family::Service, Relation::UsesService),
];

fn is_wildcard(name: &str) -> bool {
    name == "any" || name == "application-default"
}

fn node_type_of(kind: ObjectKind) -> NodeType {
    match kind {
        ObjectKind::Address => NodeType::Address,
        ObjectKind::AddressGroup => NodeType::AddressGroup,
        ObjectKind::Service => NodeType::Service,
        ObjectKind::ServiceGroup => NodeType::ServiceGroup,
        ObjectKind::SecurityRule => NodeType::SecurityRule,
        ObjectKind::NatRule => NodeType::NatRule,
    }
}

/// Where an element sits in the Panorama hierarchy.
#[derive(Debug, Default)]
struct Placement {
    device_group: Option<String>,
    post_rulebase: Option<bool>,
}

struct Builder<'a, D: Document> {
    doc: &'a D,
    options: &'a BuildOptions,
    resolver: &'a dyn ContextResolver,
    sink: &'a mut dyn DiagnosticSink,
    graph: Graph<D::Handle>,
}

impl<D: Document> Builder<'_, D> {
    fn run(mut self) -> Graph<D::Handle> {
        for kind in [
            ObjectKind::Address,
            ObjectKind::AddressGroup,
            ObjectKind::Service,
            ObjectKind::ServiceGroup,
        ] {
            self.add_objects(kind);
        }
        self.link_members(NodeType::AddressGroup, "static", Family::Address);
        self.link_members(NodeType::ServiceGroup, "members", Family::Service);
        self.add_rules(ObjectKind::SecurityRule, &SECURITY_REFERENCES);
        self.add_rules(ObjectKind::NatRule, &NAT_REFERENCES);

        debug!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            device_type = %self.options.device_type,
            context = %self.options.context,
            "configuration graph built"
        );
        self.graph
    }

    fn panorama(&self) -> bool {
        self.options.device_type == DeviceType::Panorama
    }

    // --- locating elements ---

    fn locate(&mut self, kind: ObjectKind) -> Vec<D::Handle> {
        let root = self.doc.root();
        let resolved = self.resolver.resolve(
            kind,
            self.options.device_type,
            &self.options.context,
            &self.options.version,
        );
        let reason = match resolved {
            Ok(location) => match self.doc.eval_path(root, &location) {
                Ok(found) => return found,
                Err(err) => err.to_string(),
            },
            Err(err) => err.to_string(),
        };

        let location = kind.fallback_location();
        self.sink.emit(Diagnostic::FallbackLocationUsed {
            kind: kind.as_str(),
            location: location.to_string(),
            reason,
        });
        self.doc.eval_path(root, location).unwrap_or_default()
    }

    /// Shared post-rulebase rules, then the pre- and post-rulebase rules of
    /// every device group, group by group.
    fn fan_out_rules(&self, kind: ObjectKind) -> Vec<D::Handle> {
        let root = self.doc.root();
        let mut rules = Vec::new();
        if let Some(post) = kind.rulebase_location(true) {
            for shared in self.doc.eval_path(root, SHARED_SCOPE).unwrap_or_default() {
                rules.extend(self.doc.eval_path(shared, &post).unwrap_or_default());
            }
        }
        let groups = self.doc.eval_path(root, DEVICE_GROUPS).unwrap_or_default();
        for group in groups {
            for post in [false, true] {
                if let Some(rulebase) = kind.rulebase_location(post) {
                    rules.extend(self.doc.eval_path(group, &rulebase).unwrap_or_default());
                }
            }
        }
        rules
    }

    fn placement(&self, element: D::Handle) -> Placement {
        let mut placement = Placement::default();
        let mut current = self.doc.parent(element);
        while let Some(node) = current {
            let parent = self.doc.parent(node);
            match self.doc.tag(node) {
                "pre-rulebase" if placement.post_rulebase.is_none() => {
                    placement.post_rulebase = Some(false);
                }
                "post-rulebase" if placement.post_rulebase.is_none() => {
                    placement.post_rulebase = Some(true);
                }
                "entry" if placement.device_group.is_none() => {
                    if parent.is_some_and(|p| self.doc.tag(p) == "device-group") {
                        placement.device_group = self.doc.attr(node, "name").map(str::to_string);
                    }
                }
                _ => {}
            }
            current = parent;
        }
        placement
    }

    /// Owning device group on Panorama, `shared` when there is none.
    fn device_group_of(&self, element: D::Handle) -> Option<String> {
        if !self.panorama() {
            return None;
        }
        Some(
            self.placement(element)
                .device_group
                .unwrap_or_else(|| SHARED.to_string()),
        )
    }

    fn id_scope<'s>(&self, device_group: Option<&'s str>) -> Option<&'s str> {
        match (self.options.id_scoping, device_group) {
            (IdScoping::Qualified, Some(group)) if self.panorama() && group != SHARED => Some(group),
            _ => None,
        }
    }

    fn scope_label(&self, device_group: Option<&str>) -> String {
        match device_group {
            Some(group) => group.to_string(),
            None => self
                .options
                .context
                .normalize(self.options.device_type)
                .to_string(),
        }
    }

    // --- element helpers ---

    fn name_of(&self, element: D::Handle) -> Option<String> {
        self.doc
            .attr(element, "name")
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }

    fn child(&self, element: D::Handle, tag: &str) -> Option<D::Handle> {
        self.doc
            .children(element)
            .into_iter()
            .find(|&c| self.doc.tag(c) == tag)
    }

    fn child_text(&self, element: D::Handle, tag: &str) -> Option<String> {
        self.child(element, tag)
            .and_then(|c| self.doc.text(c))
            .map(str::to_string)
    }

    /// `<member>` texts of `container`, `None` for an empty member. A
    /// container without members but with text counts as one member.
    fn members(&self, container: D::Handle) -> Vec<Option<String>> {
        let members: Vec<Option<String>> = self
            .doc
            .children(container)
            .into_iter()
            .filter(|&c| self.doc.tag(c) == "member")
            .map(|c| self.doc.text(c).map(str::to_string))
            .collect();
        if members.is_empty() {
            if let Some(text) = self.doc.text(container) {
                return vec![Some(text.to_string())];
            }
        }
        members
    }

    fn first_member(&self, element: D::Handle, tag: &str) -> Option<String> {
        self.child(element, tag)
            .and_then(|c| self.members(c).into_iter().flatten().next())
    }

    fn tags(&self, element: D::Handle) -> Option<String> {
        let tags: Vec<String> = self
            .child(element, "tag")
            .map(|c| self.members(c).into_iter().flatten().collect())
            .unwrap_or_default();
        (!tags.is_empty()).then(|| tags.join(","))
    }

    // --- attribute extraction ---

    fn address_attrs(&self, element: D::Handle, device_group: Option<String>) -> Attributes {
        let mut attrs = AddressAttrs {
            device_group,
            description: self.child_text(element, "description"),
            tags: self.tags(element),
            ..AddressAttrs::default()
        };
        if let Some((addr_type, node)) = ADDRESS_TYPES
            .iter()
            .find_map(|&t| self.child(element, t).map(|c| (t, c)))
        {
            attrs.addr_type = Some(addr_type.to_string());
            attrs.value = self.doc.text(node).map(str::to_string);
        }
        Attributes::Address(attrs)
    }

    fn group_attrs(&self, element: D::Handle, device_group: Option<String>) -> Attributes {
        let (group_type, filter) = if let Some(dynamic) = self.child(element, "dynamic") {
            (Some("dynamic"), self.child_text(dynamic, "filter"))
        } else if self.child(element, "static").is_some() || self.child(element, "members").is_some() {
            (Some("static"), None)
        } else {
            (None, None)
        };
        Attributes::Group(GroupAttrs {
            group_type: group_type.map(str::to_string),
            filter,
            device_group,
            description: self.child_text(element, "description"),
            tags: self.tags(element),
        })
    }

    fn service_attrs(&self, element: D::Handle, device_group: Option<String>) -> Attributes {
        let mut attrs = ServiceAttrs {
            device_group,
            description: self.child_text(element, "description"),
            tags: self.tags(element),
            ..ServiceAttrs::default()
        };
        let protocol = self.child(element, "protocol").and_then(|p| {
            SERVICE_PROTOCOLS
                .iter()
                .find_map(|&t| self.child(p, t).map(|c| (t, c)))
        });
        if let Some((protocol, node)) = protocol {
            attrs.protocol = Some(protocol.to_string());
            attrs.port = self.child_text(node, "port");
            attrs.source_port = self.child_text(node, "source-port");
        }
        Attributes::Service(attrs)
    }

    fn rule_attrs(&self, element: D::Handle, device_group: Option<String>) -> Attributes {
        let post_rulebase = if self.panorama() {
            self.placement(element).post_rulebase
        } else {
            None
        };
        Attributes::Rule(RuleAttrs {
            from: self.first_member(element, "from"),
            to: self.first_member(element, "to"),
            action: self.child_text(element, "action"),
            disabled: self.child_text(element, "disabled"),
            log_setting: self.child_text(element, "log-setting"),
            device_group,
            is_post_rule: post_rulebase,
            description: self.child_text(element, "description"),
            tags: self.tags(element),
        })
    }

    // --- graph population ---

    fn define(
        &mut self,
        node_type: NodeType,
        name: &str,
        device_group: Option<&str>,
        attributes: Attributes,
        source: D::Handle,
    ) -> NodeIndex {
        let id = node_id(node_type, name, self.id_scope(device_group));
        if let Some(existing) = self.graph.index_of(&id).filter(|&i| !self.graph[i].placeholder) {
            let scope = self.scope_label(device_group);
            self.sink.emit(Diagnostic::DefinitionCollapsed {
                id: id.clone(),
                scope,
            });
            // the new definition relinks its own references
            self.graph.remove_outgoing(existing);
        }
        let idx = self
            .graph
            .add_node(GraphNode::defined(node_type, id, name, attributes, source));
        let root = self.graph.root();
        self.graph.add_edge(root, idx, Relation::Contains);
        idx
    }

    fn skip_unnamed(&mut self, kind: &'static str, parent: Option<String>, device_group: Option<&str>) {
        let scope = self.scope_label(device_group);
        self.sink.emit(Diagnostic::RuleMissingNameSkipped {
            kind,
            parent,
            scope,
        });
    }

    fn add_objects(&mut self, kind: ObjectKind) {
        let node_type = node_type_of(kind);
        let elements = self.locate(kind);
        let mut added = 0usize;
        for element in elements {
            let device_group = self.device_group_of(element);
            let Some(name) = self.name_of(element) else {
                self.skip_unnamed(kind.as_str(), None, device_group.as_deref());
                continue;
            };
            let attributes = match kind {
                ObjectKind::Address => self.address_attrs(element, device_group.clone()),
                ObjectKind::Service => self.service_attrs(element, device_group.clone()),
                _ => self.group_attrs(element, device_group.clone()),
            };
            self.define(node_type, &name, device_group.as_deref(), attributes, element);
            added += 1;
        }
        debug!(kind = kind.as_str(), added, "objects added");
    }

    /// Finds `name` in the referrer's device group, then in shared; within a
    /// scope groups shadow plain objects. Misses become placeholders.
    fn resolve_reference(
        &mut self,
        family: Family,
        name: &str,
        device_group: Option<&str>,
        referrer: &str,
    ) -> NodeIndex {
        let mut scopes = vec![None];
        if let Some(group) = self.id_scope(device_group) {
            scopes.insert(0, Some(group));
        }
        for scope in scopes {
            for &node_type in family.lookup_order() {
                if let Some(idx) = self.graph.index_of(&node_id(node_type, name, scope)) {
                    return idx;
                }
            }
        }

        let node_type = family.placeholder_type();
        let scope = self.scope_label(device_group);
        self.sink.emit(Diagnostic::PlaceholderCreated {
            node_type: node_type.as_str(),
            name: name.to_string(),
            referenced_by: referrer.to_string(),
            scope,
        });
        self.graph.add_node(GraphNode::placeholder(
            node_type,
            node_id(node_type, name, None),
            name,
        ))
    }

    fn link_reference_list(
        &mut self,
        from: NodeIndex,
        container: D::Handle,
        family: Family,
        relation: Relation,
        device_group: Option<&str>,
    ) {
        let referrer = self.graph[from].id.clone();
        for member in self.members(container) {
            match member {
                None => self.skip_unnamed("member", Some(referrer.clone()), device_group),
                Some(name) if is_wildcard(&name) => {}
                Some(name) => {
                    let target = self.resolve_reference(family, &name, device_group, &referrer);
                    self.graph.add_edge(from, target, relation);
                }
            }
        }
    }

    fn link_members(&mut self, group_type: NodeType, container_tag: &str, family: Family) {
        let groups: Vec<(NodeIndex, D::Handle, Option<String>)> = self
            .graph
            .nodes()
            .iter()
            .filter(|n| n.node_type == group_type && !n.placeholder)
            .filter_map(|n| {
                let idx = self.graph.index_of(&n.id)?;
                let source = n.source?;
                Some((idx, source, n.attributes.get("device_group").map(str::to_string)))
            })
            .collect();

        for (group, source, device_group) in groups {
            if let Some(container) = self.child(source, container_tag) {
                self.link_reference_list(
                    group,
                    container,
                    family,
                    Relation::Contains,
                    device_group.as_deref(),
                );
            }
        }
    }

    fn add_rules(&mut self, kind: ObjectKind, references: &[(&str, Family, Relation)]) {
        let node_type = node_type_of(kind);
        let mut elements = self.locate(kind);
        if self.options.context.fans_out(self.options.device_type) {
            elements.extend(self.fan_out_rules(kind));
        }

        let mut seen = HashSet::new();
        let mut added = 0usize;
        for element in elements {
            if !seen.insert(element) {
                continue;
            }
            let device_group = self.device_group_of(element);
            let Some(name) = self.name_of(element) else {
                self.skip_unnamed(kind.as_str(), None, device_group.as_deref());
                continue;
            };
            let attributes = self.rule_attrs(element, device_group.clone());
            let rule = self.define(node_type, &name, device_group.as_deref(), attributes, element);
            for &(tag, family, relation) in references {
                if let Some(container) = self.child(element, tag) {
                    self.link_reference_list(rule, container, family, relation, device_group.as_deref());
                }
            }
            added += 1;
        }
        debug!(kind = kind.as_str(), added, "rules added");
    }
}
