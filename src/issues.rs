//! Core issue model for the sanitizer.
//!
//! Everything a linter reports is expressed with these types:
//! - `Severity` - ordered issue levels (`Ok < Info < Warn < Error`)
//! - `ResourceId` - canonical `"namespace/name"` resource identity
//! - `Issue` - a single finding, optionally carrying per-container sub-issues
//! - `Outcome` - per-scan mapping of resource identity to its issue list

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Severity levels for sanitizer findings.
///
/// The declaration order is load-bearing: max-severity roll-ups and
/// threshold comparisons rely on the integer ordering
/// `Ok < Info < Warn < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No issue found.
    #[default]
    Ok,
    /// Informational finding, likely harmless.
    Info,
    /// Issue that should be addressed.
    Warn,
    /// Issue that must be fixed.
    Error,
}

impl Severity {
    /// Parse a severity from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ok" => Some(Self::Ok),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Index into a per-severity counter array.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully-qualified resource identity.
///
/// Renders as `"namespace/name"` for namespaced resources and bare
/// `"name"` for cluster-scoped ones. This is the only map-key form used
/// across outcomes, reference indexes, and persisted reports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId {
    /// Namespace, `None` for cluster-scoped resources.
    pub namespace: Option<String>,
    /// Resource name.
    pub name: String,
}

impl ResourceId {
    /// Identity for a namespaced resource.
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Identity for a cluster-scoped resource.
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// The canonical string rendering.
    pub fn fqn(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.clone(),
        }
    }

    /// Parse an identity from its canonical rendering.
    pub fn parse(s: &str) -> Self {
        match s.split_once('/') {
            Some((ns, name)) => Self::namespaced(ns, name),
            None => Self::cluster(s),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.fqn())
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Err(D::Error::custom("empty resource identity"));
        }
        Ok(Self::parse(&s))
    }
}

/// A single sanitizer finding.
///
/// Immutable once created. `sub_issues` lets one top-level issue (for
/// example "container issues") aggregate findings keyed by container name
/// while exposing a single rolled-up severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Severity of the finding (already rolled up over sub-issues).
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
    /// Findings keyed by sub-resource name (per-container detail).
    #[serde(default, skip_serializing_if = "Outcome::is_empty")]
    pub sub_issues: Outcome,
}

impl Issue {
    /// Create a new issue with no sub-issues.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            sub_issues: Outcome::new(),
        }
    }

    /// Create an aggregate issue from per-sub-resource findings.
    ///
    /// The top-level severity is the maximum severity found across the
    /// sub-issues (or `Ok` if they are all clean).
    pub fn aggregate(message: impl Into<String>, sub_issues: Outcome) -> Self {
        let severity = sub_issues.max_severity();
        Self {
            severity,
            message: message.into(),
            sub_issues,
        }
    }
}

/// Mapping from resource identity to the ordered list of issues found
/// for that resource.
///
/// Every resource seen by a linter has an entry, even when clean: an
/// empty list means "no issues". Issue order per resource is preserved
/// for display but carries no semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outcome(BTreeMap<ResourceId, Vec<Issue>>);

impl Outcome {
    /// Create an empty outcome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource, creating an empty issue list if absent.
    pub fn ensure(&mut self, id: ResourceId) -> &mut Self {
        self.0.entry(id).or_default();
        self
    }

    /// Append an issue for a resource, registering it if needed.
    pub fn push(&mut self, id: ResourceId, issue: Issue) -> &mut Self {
        self.0.entry(id).or_default().push(issue);
        self
    }

    /// Append every issue in `issues` for a resource.
    pub fn extend(&mut self, id: ResourceId, issues: Vec<Issue>) -> &mut Self {
        self.0.entry(id).or_default().extend(issues);
        self
    }

    /// Merge another outcome into this one.
    ///
    /// Entries under the same identity are concatenated, so per-kind
    /// linters with distinct top-level keys merge without conflicts.
    pub fn merge(&mut self, other: Outcome) -> &mut Self {
        for (id, issues) in other.0 {
            self.0.entry(id).or_default().extend(issues);
        }
        self
    }

    /// Issues recorded for a resource, if any entry exists.
    pub fn get(&self, id: &ResourceId) -> Option<&[Issue]> {
        self.0.get(id).map(|v| v.as_slice())
    }

    /// Whether the outcome has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of resources tracked.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over `(identity, issues)` entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, &Vec<Issue>)> {
        self.0.iter()
    }

    /// Maximum severity across every issue in the outcome.
    pub fn max_severity(&self) -> Severity {
        self.0
            .values()
            .flatten()
            .map(|i| i.severity)
            .max()
            .unwrap_or(Severity::Ok)
    }
}

impl FromIterator<(ResourceId, Vec<Issue>)> for Outcome {
    fn from_iter<T: IntoIterator<Item = (ResourceId, Vec<Issue>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
