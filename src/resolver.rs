use std::fmt;
use std::str::FromStr;

use crate::error::ResolveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Address,
    AddressGroup,
    Service,
    ServiceGroup,
    SecurityRule,
    NatRule,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Address => "address",
            ObjectKind::AddressGroup => "address-group",
            ObjectKind::Service => "service",
            ObjectKind::ServiceGroup => "service-group",
            ObjectKind::SecurityRule => "security-rule",
            ObjectKind::NatRule => "nat-rule",
        }
    }

    /// Element tag under which entries of this kind are declared.
    fn container_tag(&self) -> &'static str {
        match self {
            ObjectKind::Address => "address",
            ObjectKind::AddressGroup => "address-group",
            ObjectKind::Service => "service",
            ObjectKind::ServiceGroup => "service-group",
            ObjectKind::SecurityRule => "security",
            ObjectKind::NatRule => "nat",
        }
    }

    fn is_rule(&self) -> bool {
        matches!(self, ObjectKind::SecurityRule | ObjectKind::NatRule)
    }

    /// Broad, version-agnostic expression used when resolution fails.
    pub fn fallback_location(&self) -> &'static str {
        match self {
            ObjectKind::Address => "//address/entry",
            ObjectKind::AddressGroup => "//address-group/entry",
            ObjectKind::Service => "//service/entry",
            ObjectKind::ServiceGroup => "//service-group/entry",
            ObjectKind::SecurityRule => "//security/rules/entry",
            ObjectKind::NatRule => "//nat/rules/entry",
        }
    }

    /// Rulebase path below a device group entry or `shared`, pre or post.
    pub fn rulebase_location(&self, post: bool) -> Option<String> {
        if !self.is_rule() {
            return None;
        }
        let rulebase = if post { "post-rulebase" } else { "pre-rulebase" };
        Some(format!("{rulebase}/{}/rules/entry", self.container_tag()))
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceType {
    #[default]
    Firewall,
    Panorama,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Firewall => f.write_str("firewall"),
            DeviceType::Panorama => f.write_str("panorama"),
        }
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "firewall" => Ok(DeviceType::Firewall),
            "panorama" => Ok(DeviceType::Panorama),
            other => Err(format!("unknown device type: {other}")),
        }
    }
}

/// Scoping context. `Auto` means `vsys1` on a firewall and `shared` on
/// Panorama.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Context {
    #[default]
    Auto,
    Shared,
    DeviceGroup(String),
    Vsys(String),
    Template(String),
}

impl Context {
    pub fn normalize(&self, device_type: DeviceType) -> Context {
        match (self, device_type) {
            (Context::Auto, DeviceType::Firewall) => Context::Vsys("vsys1".to_string()),
            (Context::Auto, DeviceType::Panorama) => Context::Shared,
            (other, _) => other.clone(),
        }
    }

    /// True when rules of every device group should be enumerated.
    pub fn fans_out(&self, device_type: DeviceType) -> bool {
        device_type == DeviceType::Panorama
            && matches!(self.normalize(device_type), Context::Shared)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Auto => f.write_str("auto"),
            Context::Shared => f.write_str("shared"),
            Context::DeviceGroup(name) => write!(f, "device-group:{name}"),
            Context::Vsys(name) => write!(f, "vsys:{name}"),
            Context::Template(name) => write!(f, "template:{name}"),
        }
    }
}

impl FromStr for Context {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None if s == "auto" => Ok(Context::Auto),
            None if s == "shared" => Ok(Context::Shared),
            Some(("device-group", name)) => Ok(Context::DeviceGroup(name.to_string())),
            Some(("vsys", name)) => Ok(Context::Vsys(name.to_string())),
            Some(("template", name)) => Ok(Context::Template(name.to_string())),
            _ => Err(format!(
                "unknown context `{s}` (expected auto, shared, device-group:NAME, vsys:NAME or template:NAME)"
            )),
        }
    }
}

pub trait ContextResolver {
    fn resolve(
        &self,
        kind: ObjectKind,
        device_type: DeviceType,
        context: &Context,
        version: &str,
    ) -> Result<String, ResolveError>;
}

const SHARED_OBJECTS: &str = "/config/shared/{tag}/entry";
const SHARED_PRE_RULES: &str = "/config/shared/pre-rulebase/{tag}/rules/entry";
const VSYS_OBJECTS: &str = "/config/devices/entry/vsys/entry[@name={param}]/{tag}/entry";
const VSYS_RULES: &str = "/config/devices/entry/vsys/entry[@name={param}]/rulebase/{tag}/rules/entry";
const DEVICE_GROUP_OBJECTS: &str =
    "/config/devices/entry/device-group/entry[@name={param}]/{tag}/entry";
const DEVICE_GROUP_PRE_RULES: &str =
    "/config/devices/entry/device-group/entry[@name={param}]/pre-rulebase/{tag}/rules/entry";
const TEMPLATE_OBJECTS: &str =
    "/config/devices/entry/template/entry[@name={param}]/config/shared/{tag}/entry";

/// PAN-OS style location templates for a fixed set of schema versions.
#[derive(Debug, Clone)]
pub struct PathTemplates {
    versions: Vec<String>,
}

impl Default for PathTemplates {
    fn default() -> Self {
        Self::new(["9.1", "10.0", "10.1", "10.2", "11.0", "11.1", "11.2"])
    }
}

impl PathTemplates {
    pub fn new<S: Into<String>>(versions: impl IntoIterator<Item = S>) -> Self {
        Self {
            versions: versions.into_iter().map(Into::into).collect(),
        }
    }

    /// Accepts `major.minor` with any patch suffix, e.g. `10.1.3`.
    pub fn supports(&self, version: &str) -> bool {
        let mut parts = version.trim().split('.');
        let major_minor = match (parts.next(), parts.next()) {
            (Some(major), Some(minor)) => format!("{major}.{minor}"),
            _ => return false,
        };
        self.versions.iter().any(|v| *v == major_minor)
    }

    fn template<'c>(
        &self,
        kind: ObjectKind,
        device_type: DeviceType,
        context: &'c Context,
    ) -> Option<(&'static str, Option<&'c str>)> {
        let template = match (device_type, context, kind.is_rule()) {
            (_, Context::Shared, false) => (SHARED_OBJECTS, None),
            (DeviceType::Panorama, Context::Shared, true) => (SHARED_PRE_RULES, None),
            (DeviceType::Firewall, Context::Vsys(v), false) => (VSYS_OBJECTS, Some(v.as_str())),
            (DeviceType::Firewall, Context::Vsys(v), true) => (VSYS_RULES, Some(v.as_str())),
            (DeviceType::Panorama, Context::DeviceGroup(d), false) => {
                (DEVICE_GROUP_OBJECTS, Some(d.as_str()))
            }
            (DeviceType::Panorama, Context::DeviceGroup(d), true) => {
                (DEVICE_GROUP_PRE_RULES, Some(d.as_str()))
            }
            (DeviceType::Panorama, Context::Template(t), false) => {
                (TEMPLATE_OBJECTS, Some(t.as_str()))
            }
            _ => return None,
        };
        Some(template)
    }
}

impl ContextResolver for PathTemplates {
    fn resolve(
        &self,
        kind: ObjectKind,
        device_type: DeviceType,
        context: &Context,
        version: &str,
    ) -> Result<String, ResolveError> {
        if !self.supports(version) {
            return Err(ResolveError::UnsupportedVersion(version.to_string()));
        }
        let context = context.normalize(device_type);
        let (template, param) = self
            .template(kind, device_type, &context)
            .ok_or_else(|| ResolveError::NoTemplate {
                kind: kind.to_string(),
                device_type: device_type.to_string(),
                context: context.to_string(),
            })?;

        let mut location = template.replace("{tag}", kind.container_tag());
        if let Some(param) = param {
            if param.trim().is_empty() {
                return Err(ResolveError::EmptyParameter(match &context {
                    Context::DeviceGroup(_) => "device_group",
                    Context::Vsys(_) => "vsys",
                    _ => "template",
                }));
            }
            let quoted = quote(param)
                .ok_or_else(|| ResolveError::UnquotableParameter(param.to_string()))?;
            location = location.replace("{param}", &quoted);
        }
        Ok(location)
    }
}

/// Quotes `value` as a predicate literal. Location literals have no escapes,
/// so a value holding both quote characters cannot be expressed.
fn quote(value: &str) -> Option<String> {
    if !value.contains('\'') {
        Some(format!("'{value}'"))
    } else if !value.contains('"') {
        Some(format!("\"{value}\""))
    } else {
        None
    }
}
