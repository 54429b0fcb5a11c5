// src/model/id.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between namespace and name in target and input IDs.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// Reference to the owning component inside a descriptor.
pub const SELF_REF: &str = "self";

/// `<component>::<target>` identity of a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetId {
    raw: String,
    split: usize,
}

impl TargetId {
    /// Build an ID from its parts. A `::` inside either part is replaced
    /// with `-`.
    pub fn new(namespace: &str, name: &str) -> Self {
        let namespace = sanitize(namespace);
        let name = sanitize(name);
        let split = namespace.len();
        Self {
            raw: format!("{namespace}{NAMESPACE_SEPARATOR}{name}"),
            split,
        }
    }

    /// Parse `namespace::name`. Both parts must be non-empty and the
    /// separator must occur exactly once.
    pub fn parse(s: &str) -> Result<Self, String> {
        let Some((namespace, name)) = s.split_once(NAMESPACE_SEPARATOR) else {
            return Err(format!(
                "target ID '{s}' must have the form <component>::<target>"
            ));
        };
        if namespace.is_empty() || name.is_empty() {
            return Err(format!("target ID '{s}' has an empty namespace or name"));
        }
        if name.contains(NAMESPACE_SEPARATOR) {
            return Err(format!("target ID '{s}' contains '::' more than once"));
        }
        Ok(Self {
            raw: s.to_string(),
            split: namespace.len(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.raw[..self.split]
    }

    pub fn name(&self) -> &str {
        &self.raw[self.split + NAMESPACE_SEPARATOR.len()..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.raw)
    }
}

impl TryFrom<String> for TargetId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TargetId::parse(&value)
    }
}

impl From<TargetId> for String {
    fn from(id: TargetId) -> Self {
        id.raw
    }
}

/// Identity of an input: `<component>::<input>`, or a bare `<component>`
/// standing for the whole component root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputId {
    component: String,
    input: Option<String>,
}

impl InputId {
    pub fn new(component: &str, input: &str) -> Self {
        Self {
            component: sanitize(component),
            input: Some(sanitize(input)),
        }
    }

    pub fn whole_component(component: &str) -> Self {
        Self {
            component: component.to_string(),
            input: None,
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        match s.split_once(NAMESPACE_SEPARATOR) {
            None if s.is_empty() => Err("input ID must not be empty".to_string()),
            None => Ok(Self::whole_component(s)),
            Some((component, input)) => {
                if component.is_empty() || input.is_empty() {
                    return Err(format!("input ID '{s}' has an empty namespace or name"));
                }
                if input.contains(NAMESPACE_SEPARATOR) {
                    return Err(format!("input ID '{s}' contains '::' more than once"));
                }
                Ok(Self {
                    component: component.to_string(),
                    input: Some(input.to_string()),
                })
            }
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Input name, or `None` when the ID refers to the whole component.
    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    pub fn is_whole_component(&self) -> bool {
        self.input.is_none()
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.input {
            Some(input) => write!(f, "{}{NAMESPACE_SEPARATOR}{input}", self.component),
            None => f.write_str(&self.component),
        }
    }
}

/// Rewrite `self` to `component` and `self::X` to `component::X`.
///
/// Any other form is returned unchanged, so applying this twice is the
/// same as applying it once.
pub fn normalize_ref(raw: &str, component: &str) -> String {
    if raw == SELF_REF {
        return component.to_string();
    }
    match raw.strip_prefix(SELF_REF) {
        Some(rest) if rest.starts_with(NAMESPACE_SEPARATOR) => format!("{component}{rest}"),
        _ => raw.to_string(),
    }
}

fn sanitize(part: &str) -> String {
    part.replace(NAMESPACE_SEPARATOR, "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_id_parts() {
        let id = TargetId::new("lib", "build");
        assert_eq!(id.as_str(), "lib::build");
        assert_eq!(id.namespace(), "lib");
        assert_eq!(id.name(), "build");
    }

    #[test]
    fn separator_in_name_is_replaced() {
        let id = TargetId::new("lib", "a::b");
        assert_eq!(id.as_str(), "lib::a-b");
        assert_eq!(id.name(), "a-b");
    }

    #[test]
    fn target_id_parse_rejects_bad_forms() {
        assert!(TargetId::parse("lib::build").is_ok());
        assert!(TargetId::parse("lib").is_err());
        assert!(TargetId::parse("::build").is_err());
        assert!(TargetId::parse("lib::").is_err());
        assert!(TargetId::parse("a::b::c").is_err());
    }

    #[test]
    fn input_id_forms() {
        let whole = InputId::parse("lib").unwrap();
        assert!(whole.is_whole_component());
        assert_eq!(whole.to_string(), "lib");

        let named = InputId::parse("lib::src").unwrap();
        assert_eq!(named.component(), "lib");
        assert_eq!(named.input(), Some("src"));
        assert_eq!(named.to_string(), "lib::src");

        assert!(InputId::parse("").is_err());
        assert!(InputId::parse("lib::").is_err());
    }

    #[test]
    fn normalize_self_references() {
        assert_eq!(normalize_ref("self", "lib"), "lib");
        assert_eq!(normalize_ref("self::build", "lib"), "lib::build");
        assert_eq!(normalize_ref("other::build", "lib"), "other::build");
        assert_eq!(normalize_ref("selfish::x", "lib"), "selfish::x");
    }

    #[test]
    fn target_id_serde_uses_plain_string() {
        let id = TargetId::new("lib", "build");
        let yaml = serde_yaml::to_string(&id).unwrap();
        assert_eq!(yaml.trim(), "lib::build");
        let back: TargetId = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, id);
    }
}
