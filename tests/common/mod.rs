#![allow(dead_code)]

use cfgraph::Element;

pub fn entry(name: &str) -> Element {
    Element::new("entry").with_attr("name", name)
}

pub fn text(tag: &str, value: &str) -> Element {
    Element::new(tag).with_text(value)
}

pub fn members(tag: &str, names: &[&str]) -> Element {
    Element::new(tag).with_children(names.iter().map(|n| text("member", n)))
}

pub fn section(tag: &str, entries: Vec<Element>) -> Element {
    Element::new(tag).with_children(entries)
}

pub fn address(name: &str, netmask: &str) -> Element {
    entry(name).with_child(text("ip-netmask", netmask))
}

pub fn address_group(name: &str, static_members: &[&str]) -> Element {
    entry(name).with_child(members("static", static_members))
}

pub fn service(name: &str, protocol: &str, port: &str) -> Element {
    entry(name).with_child(
        Element::new("protocol").with_child(Element::new(protocol).with_child(text("port", port))),
    )
}

pub fn service_group(name: &str, group_members: &[&str]) -> Element {
    entry(name).with_child(members("members", group_members))
}

/// Security rule from `trust` to `untrust`.
pub fn security_rule(
    name: &str,
    source: &[&str],
    destination: &[&str],
    service: &[&str],
    application: &[&str],
) -> Element {
    entry(name)
        .with_child(members("from", &["trust"]))
        .with_child(members("to", &["untrust"]))
        .with_child(members("source", source))
        .with_child(members("destination", destination))
        .with_child(members("service", service))
        .with_child(members("application", application))
        .with_child(text("action", "allow"))
}

pub fn nat_rule(name: &str, source: &[&str], destination: &[&str], service: &str) -> Element {
    entry(name)
        .with_child(members("from", &["trust"]))
        .with_child(members("to", &["untrust"]))
        .with_child(members("source", source))
        .with_child(members("destination", destination))
        .with_child(text("service", service))
}

pub fn rules(kind: &str, entries: Vec<Element>) -> Element {
    Element::new(kind).with_child(section("rules", entries))
}

/// `/config/devices/entry/vsys/entry[@name='vsys1']` holding `sections`.
pub fn firewall(sections: Vec<Element>) -> Element {
    Element::new("config").with_child(
        Element::new("devices").with_child(
            entry("localhost.localdomain").with_child(
                Element::new("vsys").with_child(entry("vsys1").with_children(sections)),
            ),
        ),
    )
}

pub fn firewall_rulebase(security: Vec<Element>, nat: Vec<Element>) -> Element {
    Element::new("rulebase")
        .with_child(rules("security", security))
        .with_child(rules("nat", nat))
}

pub fn pre_rulebase(security: Vec<Element>) -> Element {
    Element::new("pre-rulebase").with_child(rules("security", security))
}

pub fn post_rulebase(security: Vec<Element>) -> Element {
    Element::new("post-rulebase").with_child(rules("security", security))
}

pub fn device_group(name: &str, sections: Vec<Element>) -> Element {
    entry(name).with_children(sections)
}

pub fn panorama(shared: Vec<Element>, device_groups: Vec<Element>) -> Element {
    Element::new("config")
        .with_child(section("shared", shared))
        .with_child(
            Element::new("devices").with_child(
                entry("localhost.localdomain")
                    .with_child(section("device-group", device_groups)),
            ),
        )
}
