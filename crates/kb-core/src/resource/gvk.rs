use serde::{Deserialize, Serialize};
use std::fmt;

/// Group/Version/Kind plus the domain the group lives under.
///
/// Fields are declared alphabetically to match the serialized key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Gvk {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    pub kind: String,
    pub version: String,
}

impl Gvk {
    pub fn new(
        group: impl Into<String>,
        domain: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            domain: domain.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// `group.domain`, dropping whichever half is empty.
    pub fn qualified_group(&self) -> String {
        match (self.group.is_empty(), self.domain.is_empty()) {
            (false, false) => format!("{}.{}", self.group, self.domain),
            (false, true) => self.group.clone(),
            (true, false) => self.domain.clone(),
            (true, true) => String::new(),
        }
    }

    pub fn is_equal_to(&self, other: &Gvk) -> bool {
        self.group == other.group
            && self.domain == other.domain
            && self.version == other.version
            && self.kind == other.kind
    }

    /// Copy with the domain cleared, for schemas that do not track it per resource.
    pub fn without_domain(&self) -> Gvk {
        Gvk {
            domain: String::new(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group = self.qualified_group();
        if group.is_empty() {
            write!(f, "{}, Kind={}", self.version, self.kind)
        } else {
            write!(f, "{}/{}, Kind={}", group, self.version, self.kind)
        }
    }
}
