//! Semantic version parsing and component-wise ordering.
//!
//! A small hand-rolled comparator rather than the `semver` crate's full
//! range-matching machinery (see `DESIGN.md`): this core only needs to
//! store, echo, and order versions, not resolve dependency ranges.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A parsed `major.minor.patch[-prerelease][+build]` version.
///
/// Ordered by component-wise comparison of major, minor, patch, then
/// prerelease (a version with a prerelease is lower than the same
/// version without one, per semver precedence rules); build metadata
/// is informational only and never affects ordering.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemVer {
    /// Major version component.
    pub major: u64,
    /// Minor version component.
    pub minor: u64,
    /// Patch version component.
    pub patch: u64,
    /// Optional prerelease suffix (e.g. `rc.1`).
    pub prerelease: Option<String>,
    /// Optional build metadata (e.g. `build.5`). Not used in ordering.
    pub build: Option<String>,
}

impl SemVer {
    /// Parse a version string.
    pub fn parse(s: &str) -> Result<Self, ProtocolError> {
        let (core_and_pre, build) = match s.split_once('+') {
            Some((a, b)) => (a, Some(b.to_string())),
            None => (s, None),
        };
        let (core, prerelease) = match core_and_pre.split_once('-') {
            Some((a, b)) => (a, Some(b.to_string())),
            None => (core_and_pre, None),
        };
        let mut parts = core.split('.');
        let invalid = || ProtocolError::InvalidVersion(format!("malformed version: {s:?}"));
        let major: u64 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let minor: u64 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let patch: u64 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self {
            major,
            minor,
            patch,
            prerelease,
            build,
        })
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{pre}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for SemVer {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SemVer> for String {
    fn from(v: SemVer) -> Self {
        v.to_string()
    }
}

impl PartialEq for SemVer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_triple() {
        let v = SemVer::parse("1.2.3").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 2, 3));
    }

    #[test]
    fn parses_prerelease_and_build() {
        let v = SemVer::parse("1.2.3-rc.1+build.7").unwrap();
        assert_eq!(v.prerelease.as_deref(), Some("rc.1"));
        assert_eq!(v.build.as_deref(), Some("build.7"));
    }

    #[test]
    fn rejects_malformed() {
        assert!(SemVer::parse("1.2").is_err());
        assert!(SemVer::parse("a.b.c").is_err());
        assert!(SemVer::parse("1.2.3.4").is_err());
    }

    #[test]
    fn orders_component_wise() {
        assert!(SemVer::parse("1.2.3").unwrap() < SemVer::parse("1.10.0").unwrap());
        assert!(SemVer::parse("2.0.0").unwrap() > SemVer::parse("1.99.99").unwrap());
    }

    #[test]
    fn prerelease_sorts_before_release() {
        assert!(SemVer::parse("1.0.0-rc.1").unwrap() < SemVer::parse("1.0.0").unwrap());
    }

    #[test]
    fn build_metadata_ignored_in_ordering() {
        assert_eq!(
            SemVer::parse("1.0.0+a").unwrap(),
            SemVer::parse("1.0.0+b").unwrap()
        );
    }

    #[test]
    fn display_roundtrips_core() {
        let v = SemVer::parse("1.2.3-rc.1").unwrap();
        assert_eq!(v.to_string(), "1.2.3-rc.1");
    }
}
