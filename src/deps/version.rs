//! Factorio version numbers and dependency constraints

use std::cmp::Ordering;
use std::fmt;

/// Comparison operator in a dependency constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOp {
    Equal,
    GreaterOrEqual,
    LessOrEqual,
    Greater,
    Less,
    NotEqual,
}

impl VersionOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(VersionOp::Equal),
            ">=" => Some(VersionOp::GreaterOrEqual),
            "<=" => Some(VersionOp::LessOrEqual),
            ">" => Some(VersionOp::Greater),
            "<" => Some(VersionOp::Less),
            "!=" => Some(VersionOp::NotEqual),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VersionOp::Equal => "=",
            VersionOp::GreaterOrEqual => ">=",
            VersionOp::LessOrEqual => "<=",
            VersionOp::Greater => ">",
            VersionOp::Less => "<",
            VersionOp::NotEqual => "!=",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            VersionOp::Equal => ordering == Ordering::Equal,
            VersionOp::GreaterOrEqual => ordering != Ordering::Less,
            VersionOp::LessOrEqual => ordering != Ordering::Greater,
            VersionOp::Greater => ordering == Ordering::Greater,
            VersionOp::Less => ordering == Ordering::Less,
            VersionOp::NotEqual => ordering != Ordering::Equal,
        }
    }
}

impl fmt::Display for VersionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<op> <version>` part of a dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    pub op: VersionOp,
    pub version: String,
}

impl VersionConstraint {
    /// Check an installed version against this constraint.
    ///
    /// Versions that cannot be parsed are treated as satisfying the constraint.
    pub fn matches(&self, installed: &str) -> bool {
        match (parse_version(installed), parse_version(&self.version)) {
            (Some(have), Some(want)) => self.op.accepts(have.cmp(&want)),
            _ => true,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.version)
    }
}

/// Parse a Factorio version (`major.minor[.patch]`).
///
/// Factorio versions allow leading zeros and two-part forms, so components are
/// read as integers and normalised before building a `semver::Version`.
pub fn parse_version(raw: &str) -> Option<semver::Version> {
    let parts: Vec<u64> = raw
        .trim()
        .split('.')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;

    match parts.as_slice() {
        [major] => Some(semver::Version::new(*major, 0, 0)),
        [major, minor] => Some(semver::Version::new(*major, *minor, 0)),
        [major, minor, patch] => Some(semver::Version::new(*major, *minor, *patch)),
        _ => None,
    }
}

/// Order two version strings, falling back to string order when unparsable
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_version(a), parse_version(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Compare two version strings for equality (`1.1` equals `1.1.0`)
pub fn versions_equal(a: &str, b: &str) -> bool {
    compare_versions(a, b) == Ordering::Equal
}
