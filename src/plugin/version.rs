//! Semantic-version precedence and the agent compatibility constraint.

use crate::error::PluginError;
use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const DEVELOPMENT: &str = "development";

/// Orders two versions by semantic-version precedence.
///
/// Major, minor and patch compare numerically. A version with a pre-release
/// sorts below the same version without one. Pre-release identifiers compare
/// left to right: numeric ones numerically, numeric below alphanumeric,
/// alphanumeric ones in ASCII order, and a shorter identifier list sorts first
/// when all shared identifiers are equal. Build metadata is ignored.
pub fn cmp_precedence(a: &Version, b: &Version) -> Ordering {
    a.major
        .cmp(&b.major)
        .then(a.minor.cmp(&b.minor))
        .then(a.patch.cmp(&b.patch))
        .then_with(|| cmp_prerelease(a.pre.as_str(), b.pre.as_str()))
}

fn cmp_prerelease(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = cmp_identifier(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

fn cmp_identifier(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    match (numeric(a), numeric(b)) {
        // No leading zeros in valid numeric identifiers, so length orders first.
        (true, true) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

pub fn parse_version(input: &str) -> Result<Version, PluginError> {
    Version::parse(input.trim().trim_start_matches('v')).map_err(|source| {
        PluginError::InvalidVersion {
            input: input.to_string(),
            source,
        }
    })
}

/// The agent version a repository index is built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompatibilityVersion {
    Concrete(Version),
    /// Built from a development tree; accepts any agent version.
    Development,
}

impl CompatibilityVersion {
    pub fn accepts(&self, agent_version: &Version) -> bool {
        match self {
            CompatibilityVersion::Development => true,
            CompatibilityVersion::Concrete(version) => {
                cmp_precedence(version, agent_version) == Ordering::Equal
            }
        }
    }
}

impl From<Version> for CompatibilityVersion {
    fn from(version: Version) -> Self {
        CompatibilityVersion::Concrete(version)
    }
}

impl FromStr for CompatibilityVersion {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case(DEVELOPMENT) {
            return Ok(CompatibilityVersion::Development);
        }
        parse_version(s).map(CompatibilityVersion::Concrete)
    }
}

impl TryFrom<&str> for CompatibilityVersion {
    type Error = PluginError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for CompatibilityVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompatibilityVersion::Concrete(version) => write!(f, "{}", version),
            CompatibilityVersion::Development => write!(f, "{}", DEVELOPMENT),
        }
    }
}

impl Serialize for CompatibilityVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CompatibilityVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
