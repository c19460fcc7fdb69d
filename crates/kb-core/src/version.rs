//! Version identifiers shared by project schemas and plugins.
//!
//! Both use a number plus an optional stability stage. Project versions are
//! written bare (`3`, `3-alpha`), plugin versions carry a `v` prefix
//! (`v4`, `v1-alpha`).

use crate::error::{KbError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Stage {
    Alpha,
    Beta,
    #[default]
    Stable,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Alpha => "alpha",
            Stage::Beta => "beta",
            Stage::Stable => "",
        }
    }

    fn parse(s: &str) -> Option<Stage> {
        match s {
            "alpha" => Some(Stage::Alpha),
            "beta" => Some(Stage::Beta),
            "" => Some(Stage::Stable),
            _ => None,
        }
    }
}

fn split_stage(s: &str) -> Option<(u32, Stage)> {
    let (number, stage) = match s.split_once('-') {
        Some((n, st)) => (n, Stage::parse(st)?),
        None => (s, Stage::Stable),
    };
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number = number.parse().ok()?;
    if number == 0 {
        return None;
    }
    Some((number, stage))
}

fn write_version(f: &mut fmt::Formatter<'_>, number: u32, stage: Stage) -> fmt::Result {
    match stage {
        Stage::Stable => write!(f, "{number}"),
        other => write!(f, "{number}-{}", other.as_str()),
    }
}

// ---------------------------------------------------------------------------
// ProjectVersion
// ---------------------------------------------------------------------------

/// Selects the schema used for the rest of the project document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectVersion {
    pub number: u32,
    pub stage: Stage,
}

impl ProjectVersion {
    pub const fn stable(number: u32) -> Self {
        Self {
            number,
            stage: Stage::Stable,
        }
    }
}

impl fmt::Display for ProjectVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_version(f, self.number, self.stage)
    }
}

impl FromStr for ProjectVersion {
    type Err = KbError;

    fn from_str(s: &str) -> Result<Self> {
        split_stage(s)
            .map(|(number, stage)| ProjectVersion { number, stage })
            .ok_or_else(|| KbError::UnknownVersion(s.to_string()))
    }
}

impl Serialize for ProjectVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Hand-edited files sometimes carry `version: 3` unquoted.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Text(String),
    Number(u64),
}

impl<'de> Deserialize<'de> for ProjectVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = match RawVersion::deserialize(deserializer)? {
            RawVersion::Text(s) => s,
            RawVersion::Number(n) => n.to_string(),
        };
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// PluginVersion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginVersion {
    pub number: u32,
    pub stage: Stage,
}

impl PluginVersion {
    pub const fn new(number: u32, stage: Stage) -> Self {
        Self { number, stage }
    }
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("v")?;
        write_version(f, self.number, self.stage)
    }
}

impl FromStr for PluginVersion {
    type Err = KbError;

    fn from_str(s: &str) -> Result<Self> {
        s.strip_prefix('v')
            .and_then(split_stage)
            .map(|(number, stage)| PluginVersion { number, stage })
            .ok_or_else(|| KbError::InvalidPluginKey {
                key: s.to_string(),
                reason: "version must look like v1, v2-alpha or v3-beta".to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
