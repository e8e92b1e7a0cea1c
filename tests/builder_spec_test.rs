mod common;

use cfgraph::{
    BuildOptions, Context, ContextResolver, DeviceType, Diagnostic, Element, ElementId,
    ElementTree, Graph, IdScoping, NodeType, ObjectKind, Relation, ResolveError, build_graph,
};
use common::*;
use pretty_assertions::assert_eq;

fn build(doc: &Element, options: &BuildOptions) -> (Graph<ElementId>, Vec<Diagnostic>) {
    let tree = ElementTree::from_element(doc);
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let graph = build_graph(&tree, options, &mut diagnostics);
    (graph, diagnostics)
}

fn build_firewall(doc: &Element) -> (Graph<ElementId>, Vec<Diagnostic>) {
    build(doc, &BuildOptions::default())
}

fn panorama_options(context: Context, id_scoping: IdScoping) -> BuildOptions {
    BuildOptions {
        device_type: DeviceType::Panorama,
        context,
        id_scoping,
        ..BuildOptions::default()
    }
}

fn ids_of(graph: &Graph<ElementId>, node_type: NodeType) -> Vec<&str> {
    graph
        .nodes()
        .iter()
        .filter(|n| n.node_type == node_type)
        .map(|n| n.id.as_str())
        .collect()
}

fn targets<'g>(graph: &'g Graph<ElementId>, id: &str, relation: Relation) -> Vec<&'g str> {
    graph
        .outgoing(id, Some(relation))
        .iter()
        .map(|n| n.name.as_str())
        .collect()
}

fn fallbacks(diagnostics: &[Diagnostic]) -> Vec<(&str, &str)> {
    diagnostics
        .iter()
        .filter_map(|d| match d {
            Diagnostic::FallbackLocationUsed { kind, location, .. } => {
                Some((*kind, location.as_str()))
            }
            _ => None,
        })
        .collect()
}

fn mixed_firewall() -> Element {
    firewall(vec![
        section(
            "address",
            vec![address("addr1", "10.0.0.1/32"), address("web-srv", "10.0.1.10/32")],
        ),
        section(
            "address-group",
            vec![
                address_group("web", &["web-srv", "ghost"]),
                address_group("all", &["web", "addr1"]),
            ],
        ),
        section("service", vec![service("tcp-8080", "tcp", "8080")]),
        section(
            "service-group",
            vec![service_group("web-services", &["tcp-8080", "service-https"])],
        ),
        firewall_rulebase(
            vec![
                security_rule("R1", &["web"], &["addr1"], &["web-services"], &["web-browsing"]),
                security_rule("R2", &["any"], &["unknown-host"], &["application-default"], &["any"]),
            ],
            vec![nat_rule("N1", &["addr1"], &["any"], "tcp-8080")],
        ),
    ])
}

#[test]
fn group_membership_round_trip() {
    let doc = firewall(vec![
        section("address", vec![address("addr1", "10.0.0.1/32")]),
        section("address-group", vec![address_group("g", &["addr1", "addr2"])]),
    ]);
    let (graph, diagnostics) = build_firewall(&doc);

    assert_eq!(
        graph.edge_triples(),
        vec![
            ("config_root", "address:addr1", Relation::Contains),
            ("config_root", "address-group:g", Relation::Contains),
            ("address-group:g", "address:addr1", Relation::Contains),
            ("address-group:g", "address:addr2", Relation::Contains),
        ]
    );
    assert!(graph.node("address:addr2").unwrap().placeholder);
    assert!(!graph.is_rooted("address:addr2"));
    assert_eq!(
        diagnostics,
        vec![Diagnostic::PlaceholderCreated {
            node_type: "address",
            name: "addr2".to_string(),
            referenced_by: "address-group:g".to_string(),
            scope: "vsys:vsys1".to_string(),
        }]
    );
}

#[test]
fn defined_nodes_are_rooted_and_placeholders_are_not() {
    let (graph, _) = build_firewall(&mixed_firewall());
    let reachable = graph.reachable_from_root();

    for node in graph.nodes().iter().filter(|n| n.node_type != NodeType::Root) {
        assert_eq!(graph.is_rooted(&node.id), !node.placeholder, "{}", node.id);
        if !node.placeholder {
            let idx = graph.index_of(&node.id).unwrap();
            assert!(reachable.contains(&idx), "{} unreachable", node.id);
        }
    }
}

#[test]
fn placeholders_only_hang_off_referrers() {
    let (graph, _) = build_firewall(&mixed_firewall());

    let ghost = graph.node("address:ghost").unwrap();
    assert!(ghost.placeholder);
    assert_eq!(ghost.source, None);
    let referrers: Vec<&str> = graph
        .incoming("address:ghost", None)
        .iter()
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(referrers, vec!["address-group:web"]);

    assert_eq!(
        ids_of(&graph, NodeType::Application),
        vec!["application:web-browsing"]
    );
    assert!(graph.node("application:web-browsing").unwrap().placeholder);
}

#[test]
fn wildcards_produce_no_edges_or_nodes() {
    let (graph, diagnostics) = build_firewall(&mixed_firewall());

    let r2: Vec<(&str, Relation)> = graph
        .edge_triples()
        .into_iter()
        .filter(|(source, _, _)| *source == "security-rule:R2")
        .map(|(_, target, relation)| (target, relation))
        .collect();
    assert_eq!(r2, vec![("address:unknown-host", Relation::UsesDestination)]);

    for wildcard in ["any", "application-default"] {
        assert!(graph.nodes().iter().all(|n| n.name != wildcard));
        assert!(diagnostics.iter().all(|d| !d.to_string().contains(&format!("`{wildcard}`"))));
    }
}

#[test]
fn groups_shadow_objects_with_the_same_name() {
    let doc = firewall(vec![
        section("address", vec![address("web", "10.0.0.5/32")]),
        section("address-group", vec![address_group("web", &["web"])]),
        firewall_rulebase(
            vec![security_rule("R1", &["web"], &["any"], &["any"], &["any"])],
            vec![],
        ),
    ]);
    let (graph, _) = build_firewall(&doc);

    assert!(graph.has_edge("security-rule:R1", "address-group:web", Relation::UsesSource));
    assert!(!graph.has_edge("security-rule:R1", "address:web", Relation::UsesSource));
    // a group naming itself resolves to itself
    assert!(graph.has_edge("address-group:web", "address-group:web", Relation::Contains));
}

#[test]
fn nested_groups_resolve_regardless_of_declaration_order() {
    let (graph, diagnostics) = build_firewall(&mixed_firewall());

    let members: Vec<&str> = graph
        .outgoing("address-group:all", Some(Relation::Contains))
        .iter()
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(members, vec!["address-group:web", "address:addr1"]);
    assert!(!diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::PlaceholderCreated { referenced_by, .. } if referenced_by == "address-group:all"
    )));
}

#[test]
fn rule_references_follow_member_lists() {
    let (graph, _) = build_firewall(&mixed_firewall());

    let outgoing: Vec<(&str, Relation)> = graph
        .edge_triples()
        .into_iter()
        .filter(|(source, _, _)| *source == "security-rule:R1")
        .map(|(_, target, relation)| (target, relation))
        .collect();
    assert_eq!(
        outgoing,
        vec![
            ("address-group:web", Relation::UsesSource),
            ("address:addr1", Relation::UsesDestination),
            ("service-group:web-services", Relation::UsesService),
            ("application:web-browsing", Relation::UsesApplication),
        ]
    );
}

#[test]
fn rule_attributes_take_first_member() {
    let rule = entry("R1")
        .with_child(members("from", &["trust", "dmz"]))
        .with_child(members("to", &["untrust", "guest"]))
        .with_child(text("action", "deny"))
        .with_child(text("disabled", "yes"))
        .with_child(text("log-setting", "default"))
        .with_child(members("tag", &["audit", "temp"]));
    let doc = firewall(vec![firewall_rulebase(vec![rule], vec![])]);
    let (graph, _) = build_firewall(&doc);

    let node = graph.node("security-rule:R1").unwrap();
    assert_eq!(node.property("from"), Some("trust"));
    assert_eq!(node.property("to"), Some("untrust"));
    assert_eq!(node.property("action"), Some("deny"));
    assert_eq!(node.property("disabled"), Some("yes"));
    assert_eq!(node.property("log_setting"), Some("default"));
    assert_eq!(node.property("tags"), Some("audit,temp"));
    assert_eq!(node.property("device_group"), None);
    assert_eq!(node.property("is_post_rule"), None);
}

#[test]
fn object_attributes_are_extracted() {
    let dynamic = entry("dyn").with_child(
        Element::new("dynamic").with_child(text("filter", "'web' and 'prod'")),
    );
    let doc = firewall(vec![
        section(
            "address",
            vec![entry("range").with_child(text("ip-range", "10.0.0.1-10.0.0.9"))],
        ),
        section("address-group", vec![dynamic, address_group("static-g", &[])]),
        section("service", vec![service("dns", "udp", "53")]),
    ]);
    let (graph, _) = build_firewall(&doc);

    let range = graph.node("address:range").unwrap();
    assert_eq!(range.property("addr_type"), Some("ip-range"));
    assert_eq!(range.property("value"), Some("10.0.0.1-10.0.0.9"));

    let dyn_group = graph.node("address-group:dyn").unwrap();
    assert_eq!(dyn_group.property("group_type"), Some("dynamic"));
    assert_eq!(dyn_group.property("filter"), Some("'web' and 'prod'"));
    assert!(graph.outgoing("address-group:dyn", None).is_empty());
    assert_eq!(
        graph.node("address-group:static-g").unwrap().property("group_type"),
        Some("static")
    );

    let dns = graph.node("service:dns").unwrap();
    assert_eq!(dns.property("protocol"), Some("udp"));
    assert_eq!(dns.property("port"), Some("53"));
}

#[test]
fn nat_rules_never_reference_applications() {
    let nat = nat_rule("N2", &["addr1"], &["any"], "any")
        .with_child(members("application", &["ssl"]));
    let doc = firewall(vec![
        section("address", vec![address("addr1", "10.0.0.1/32")]),
        section("service", vec![service("tcp-8080", "tcp", "8080")]),
        firewall_rulebase(
            vec![],
            vec![nat_rule("N1", &["addr1"], &["any"], "tcp-8080"), nat],
        ),
    ]);
    let (graph, _) = build_firewall(&doc);

    assert_eq!(ids_of(&graph, NodeType::NatRule), vec!["nat-rule:N1", "nat-rule:N2"]);
    assert!(graph.has_edge("nat-rule:N1", "service:tcp-8080", Relation::UsesService));
    assert!(graph.has_edge("nat-rule:N2", "address:addr1", Relation::UsesSource));
    assert!(graph.outgoing("nat-rule:N2", Some(Relation::UsesService)).is_empty());
    assert!(graph.outgoing("nat-rule:N2", Some(Relation::UsesApplication)).is_empty());
    assert!(graph.node("application:ssl").is_none());
}

#[test]
fn unnamed_rules_and_members_are_skipped() {
    let unnamed = Element::new("entry")
        .with_attr("name", "  ")
        .with_child(members("source", &["addr1"]));
    let r1 = entry("R1").with_child(Element::new("source").with_child(Element::new("member")));
    let doc = firewall(vec![firewall_rulebase(vec![unnamed, r1], vec![])]);
    let (graph, diagnostics) = build_firewall(&doc);

    assert_eq!(ids_of(&graph, NodeType::SecurityRule), vec!["security-rule:R1"]);
    assert!(graph.node("address:addr1").is_none());
    assert_eq!(
        diagnostics,
        vec![
            Diagnostic::RuleMissingNameSkipped {
                kind: "security-rule",
                parent: None,
                scope: "vsys:vsys1".to_string(),
            },
            Diagnostic::RuleMissingNameSkipped {
                kind: "member",
                parent: Some("security-rule:R1".to_string()),
                scope: "vsys:vsys1".to_string(),
            },
        ]
    );
}

#[test]
fn build_is_deterministic() {
    let tree = ElementTree::from_element(&mixed_firewall());
    let options = BuildOptions::default();
    let mut first_diagnostics: Vec<Diagnostic> = Vec::new();
    let mut second_diagnostics: Vec<Diagnostic> = Vec::new();

    let first = build_graph(&tree, &options, &mut first_diagnostics);
    let second = build_graph(&tree, &options, &mut second_diagnostics);

    assert_eq!(first.nodes(), second.nodes());
    assert_eq!(first.edge_triples(), second.edge_triples());
    assert_eq!(first_diagnostics, second_diagnostics);
}

#[test]
fn unsupported_version_falls_back_to_broad_locations() {
    let options = BuildOptions {
        version: "7.0".to_string(),
        ..BuildOptions::default()
    };
    let (graph, diagnostics) = build(&mixed_firewall(), &options);
    let (expected, _) = build_firewall(&mixed_firewall());

    assert_eq!(graph.edge_triples(), expected.edge_triples());
    assert_eq!(
        fallbacks(&diagnostics),
        vec![
            ("address", "//address/entry"),
            ("address-group", "//address-group/entry"),
            ("service", "//service/entry"),
            ("service-group", "//service-group/entry"),
            ("security-rule", "//security/rules/entry"),
            ("nat-rule", "//nat/rules/entry"),
        ]
    );
}

fn panorama_doc() -> Element {
    panorama(
        vec![
            section("address", vec![address("s1", "192.0.2.1/32")]),
            pre_rulebase(vec![security_rule("shared-r", &["s1"], &["any"], &["any"], &["any"])]),
        ],
        vec![
            device_group(
                "dg1",
                vec![
                    section("address", vec![address("local", "10.1.0.1/32")]),
                    pre_rulebase(vec![security_rule(
                        "allow-web",
                        &["local", "s1"],
                        &["any"],
                        &["any"],
                        &["any"],
                    )]),
                    post_rulebase(vec![security_rule("cleanup", &["any"], &["any"], &["any"], &["any"])]),
                ],
            ),
            device_group(
                "dg2",
                vec![pre_rulebase(vec![security_rule(
                    "allow-web",
                    &["s1"],
                    &["any"],
                    &["any"],
                    &["any"],
                )])],
            ),
        ],
    )
}

#[test]
fn panorama_shared_context_fans_out_over_device_groups() {
    let options = panorama_options(Context::Auto, IdScoping::Qualified);
    let (graph, _) = build(&panorama_doc(), &options);

    assert_eq!(
        ids_of(&graph, NodeType::SecurityRule),
        vec![
            "security-rule:shared-r",
            "security-rule:dg1/allow-web",
            "security-rule:dg1/cleanup",
            "security-rule:dg2/allow-web",
        ]
    );

    let shared = graph.node("security-rule:shared-r").unwrap();
    assert_eq!(shared.property("device_group"), Some("shared"));
    assert_eq!(shared.property("is_post_rule"), Some("false"));

    let cleanup = graph.node("security-rule:dg1/cleanup").unwrap();
    assert_eq!(cleanup.name, "cleanup");
    assert_eq!(cleanup.property("device_group"), Some("dg1"));
    assert_eq!(cleanup.property("is_post_rule"), Some("true"));

    assert_eq!(
        graph.node("address:s1").unwrap().property("device_group"),
        Some("shared")
    );
    assert!(graph.has_edge("security-rule:dg2/allow-web", "address:s1", Relation::UsesSource));
}

#[test]
fn panorama_shared_context_does_not_load_device_group_objects() {
    let options = panorama_options(Context::Shared, IdScoping::Qualified);
    let (graph, diagnostics) = build(&panorama_doc(), &options);

    let local = graph.node("address:local").unwrap();
    assert!(local.placeholder);
    assert!(diagnostics.contains(&Diagnostic::PlaceholderCreated {
        node_type: "address",
        name: "local".to_string(),
        referenced_by: "security-rule:dg1/allow-web".to_string(),
        scope: "dg1".to_string(),
    }));
}

#[test]
fn device_group_context_reads_only_that_group() {
    let options = panorama_options(Context::DeviceGroup("dg1".to_string()), IdScoping::Qualified);
    let (graph, _) = build(&panorama_doc(), &options);

    assert_eq!(ids_of(&graph, NodeType::Address), vec!["address:dg1/local", "address:s1"]);
    assert_eq!(
        ids_of(&graph, NodeType::SecurityRule),
        vec!["security-rule:dg1/allow-web"]
    );
    assert!(graph.has_edge(
        "security-rule:dg1/allow-web",
        "address:dg1/local",
        Relation::UsesSource
    ));
    // shared objects are outside the context, so s1 is a placeholder here
    assert!(graph.node("address:s1").unwrap().placeholder);
    assert_eq!(
        graph.node("security-rule:dg1/allow-web").unwrap().property("is_post_rule"),
        Some("false")
    );
}

#[test]
fn qualified_ids_keep_same_named_rules_apart() {
    let options = panorama_options(Context::Shared, IdScoping::Qualified);
    let (graph, diagnostics) = build(&panorama_doc(), &options);

    let groups: Vec<&str> = graph
        .nodes()
        .iter()
        .filter(|n| n.name == "allow-web")
        .map(|n| n.property("device_group").unwrap_or_default())
        .collect();
    assert_eq!(groups, vec!["dg1", "dg2"]);
    assert!(!diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::DefinitionCollapsed { .. })));
}

#[test]
fn collapsed_ids_keep_the_last_definition() {
    let options = panorama_options(Context::Shared, IdScoping::Collapsed);
    let (graph, diagnostics) = build(&panorama_doc(), &options);

    assert_eq!(
        ids_of(&graph, NodeType::SecurityRule),
        vec![
            "security-rule:shared-r",
            "security-rule:allow-web",
            "security-rule:cleanup",
        ]
    );
    let rule = graph.node("security-rule:allow-web").unwrap();
    assert_eq!(rule.property("device_group"), Some("dg2"));
    assert_eq!(
        targets(&graph, "security-rule:allow-web", Relation::UsesSource),
        vec!["s1"]
    );
    assert!(graph.incoming("address:local", None).is_empty());

    let collapsed: Vec<&Diagnostic> = diagnostics
        .iter()
        .filter(|d| matches!(d, Diagnostic::DefinitionCollapsed { .. }))
        .collect();
    assert_eq!(
        collapsed,
        vec![&Diagnostic::DefinitionCollapsed {
            id: "security-rule:allow-web".to_string(),
            scope: "dg2".to_string(),
        }]
    );
}

#[test]
fn collapsed_definition_replaces_references() {
    let doc = panorama(
        vec![],
        vec![
            device_group(
                "dg1",
                vec![pre_rulebase(vec![security_rule(
                    "allow-web",
                    &["only-in-dg1"],
                    &["any"],
                    &["any"],
                    &["ssl"],
                )])],
            ),
            device_group(
                "dg2",
                vec![pre_rulebase(vec![security_rule(
                    "allow-web",
                    &["only-in-dg2"],
                    &["any"],
                    &["any"],
                    &["any"],
                )])],
            ),
        ],
    );
    let options = panorama_options(Context::Shared, IdScoping::Collapsed);
    let (graph, _) = build(&doc, &options);

    let id = "security-rule:allow-web";
    assert_eq!(graph.node(id).unwrap().property("device_group"), Some("dg2"));
    assert_eq!(targets(&graph, id, Relation::UsesSource), vec!["only-in-dg2"]);
    assert!(targets(&graph, id, Relation::UsesApplication).is_empty());
    assert!(graph.incoming("address:only-in-dg1", None).is_empty());
    assert!(graph.incoming("application:ssl", None).is_empty());

    let into_rule: Vec<(&str, Relation)> = graph
        .edge_triples()
        .into_iter()
        .filter(|(_, target, _)| *target == id)
        .map(|(source, _, relation)| (source, relation))
        .collect();
    assert_eq!(into_rule, vec![("config_root", Relation::Contains)]);
}

#[test]
fn repeated_rule_name_keeps_the_last_references() {
    let doc = firewall(vec![firewall_rulebase(
        vec![
            security_rule("R", &["a"], &["any"], &["any"], &["any"]),
            security_rule("R", &["b"], &["any"], &["any"], &["any"]),
        ],
        vec![],
    )]);
    let (graph, diagnostics) = build_firewall(&doc);

    assert_eq!(ids_of(&graph, NodeType::SecurityRule), vec!["security-rule:R"]);
    assert_eq!(targets(&graph, "security-rule:R", Relation::UsesSource), vec!["b"]);
    assert!(diagnostics.contains(&Diagnostic::DefinitionCollapsed {
        id: "security-rule:R".to_string(),
        scope: "vsys:vsys1".to_string(),
    }));
}

struct MalformedResolver;

impl ContextResolver for MalformedResolver {
    fn resolve(
        &self,
        _kind: ObjectKind,
        _device_type: DeviceType,
        _context: &Context,
        _version: &str,
    ) -> Result<String, ResolveError> {
        Ok("/config[".to_string())
    }
}

#[test]
fn unevaluable_location_falls_back() {
    let tree = ElementTree::from_element(&mixed_firewall());
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let graph = cfgraph::build(
        &tree,
        &BuildOptions::default(),
        &MalformedResolver,
        &mut diagnostics,
    );
    let (expected, _) = build_firewall(&mixed_firewall());

    assert_eq!(graph.nodes(), expected.nodes());
    assert_eq!(graph.edge_triples(), expected.edge_triples());
    assert_eq!(fallbacks(&diagnostics).len(), 6);
    match &diagnostics[0] {
        Diagnostic::FallbackLocationUsed {
            kind,
            location,
            reason,
        } => {
            assert_eq!(*kind, "address");
            assert_eq!(location, "//address/entry");
            assert!(reason.contains("/config["), "reason: {reason}");
        }
        other => panic!("expected a fallback, got {other:?}"),
    }
}

#[test]
fn shared_post_rules_are_part_of_the_fan_out() {
    let doc = panorama(
        vec![
            pre_rulebase(vec![security_rule("shared-pre", &["any"], &["any"], &["any"], &["any"])]),
            post_rulebase(vec![security_rule("shared-post", &["any"], &["any"], &["any"], &["any"])]),
        ],
        vec![device_group(
            "dg1",
            vec![pre_rulebase(vec![security_rule("dg-pre", &["any"], &["any"], &["any"], &["any"])])],
        )],
    );
    let (graph, _) = build(&doc, &panorama_options(Context::Auto, IdScoping::Qualified));

    assert_eq!(
        ids_of(&graph, NodeType::SecurityRule),
        vec![
            "security-rule:shared-pre",
            "security-rule:shared-post",
            "security-rule:dg1/dg-pre",
        ]
    );
    let post = graph.node("security-rule:shared-post").unwrap();
    assert_eq!(post.property("device_group"), Some("shared"));
    assert_eq!(post.property("is_post_rule"), Some("true"));
}

#[test]
fn device_group_names_with_quotes_resolve_in_context() {
    let doc = panorama(
        vec![section("address", vec![address("s1", "192.0.2.1/32")])],
        vec![device_group(
            "o'brien",
            vec![section("address", vec![address("local", "10.1.0.1/32")])],
        )],
    );
    let options = panorama_options(Context::DeviceGroup("o'brien".to_string()), IdScoping::Qualified);
    let (graph, diagnostics) = build(&doc, &options);

    assert_eq!(ids_of(&graph, NodeType::Address), vec!["address:o'brien/local"]);
    assert!(fallbacks(&diagnostics).is_empty());
}

#[test]
fn graph_can_be_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Graph<ElementId>>();
}
