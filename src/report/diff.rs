//! Two-report diff engine.
//!
//! Compares the two most recent scans of a cluster: score movement,
//! per-section tally deltas, and per-resource added/resolved issues.
//! Pods churn between scans, so resource matching falls back to a
//! name-prefix heuristic when an exact identity match fails.

use crate::issues::{Issue, Outcome, ResourceId, Severity};
use crate::tally::Report;
use once_cell::sync::Lazy;
use regex::Regex;

/// Movement of one counter between two scans.
///
/// `inverse` flips the reading: for Error/Warn/Info counts an increase
/// is a regression, for Ok counts and scores an increase is an
/// improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaScore {
    pub severity: Severity,
    pub old: u64,
    pub new: u64,
    pub inverse: bool,
}

impl DeltaScore {
    pub fn new(severity: Severity, old: u64, new: u64, inverse: bool) -> Self {
        Self {
            severity,
            old,
            new,
            inverse,
        }
    }

    /// Whether the counter moved at all.
    pub fn changed(&self) -> bool {
        self.old != self.new
    }

    /// Whether the movement is an improvement.
    pub fn better(&self) -> bool {
        if self.inverse {
            self.new < self.old
        } else {
            self.new > self.old
        }
    }

    /// Whether the movement is a regression.
    pub fn worst(&self) -> bool {
        self.changed() && !self.better()
    }

    /// Signed difference, new minus old.
    pub fn delta(&self) -> i64 {
        self.new as i64 - self.old as i64
    }

    /// One-word reading of the movement.
    pub fn summarize(&self) -> &'static str {
        if !self.changed() {
            "not changed"
        } else if self.better() {
            "improved"
        } else {
            "worsened"
        }
    }
}

/// Per-section diff: tally movements plus added and resolved issues
/// keyed by resource identity.
#[derive(Debug, Clone, Default)]
pub struct SectionDelta {
    pub title: String,
    pub tallies: Vec<DeltaScore>,
    pub added: Outcome,
    pub resolved: Outcome,
}

impl SectionDelta {
    /// Whether the section moved in any direction.
    pub fn changed(&self) -> bool {
        !self.tallies.is_empty() || !self.added.is_empty() || !self.resolved.is_empty()
    }
}

/// Full diff between two scans of the same cluster.
#[derive(Debug, Clone)]
pub struct DiffReport {
    /// Overall score movement (higher is better).
    pub overall: DeltaScore,
    pub sections: Vec<SectionDelta>,
    /// Resolution failures: sections or resources the older report
    /// does not know about.
    pub errors: Vec<String>,
}

/// Diff two reports, oldest first.
pub fn diff(old: &Report, new: &Report) -> DiffReport {
    let mut sections = Vec::new();
    let mut errors = Vec::new();

    for new_section in &new.sections {
        let Some(old_section) = old.section(&new_section.title) else {
            errors.push(format!(
                "Previous sanitizer missing section {}",
                new_section.title
            ));
            continue;
        };

        let mut delta = SectionDelta {
            title: new_section.title.clone(),
            ..Default::default()
        };

        for severity in [Severity::Ok, Severity::Info, Severity::Warn, Severity::Error] {
            let old_count = old_section.tally.count(severity) as u64;
            let new_count = new_section.tally.count(severity) as u64;
            if old_count != new_count {
                delta.tallies.push(DeltaScore::new(
                    severity,
                    old_count,
                    new_count,
                    severity != Severity::Ok,
                ));
            }
        }

        for (id, new_issues) in new_section.outcome.iter() {
            let old_issues = match old_section.outcome.get(id) {
                Some(issues) => Some(issues),
                None => fallback_match(&old_section.outcome, id),
            };
            let Some(old_issues) = old_issues else {
                errors.push(format!("Previous sanitizer missing resource ID {}", id));
                continue;
            };

            let (added, resolved) = compare_issues(old_issues, new_issues);
            if !added.is_empty() {
                delta.added.extend(id.clone(), added);
            }
            if !resolved.is_empty() {
                delta.resolved.extend(id.clone(), resolved);
            }
        }

        sections.push(delta);
    }

    DiffReport {
        overall: DeltaScore::new(Severity::Ok, old.score as u64, new.score as u64, false),
        sections,
        errors,
    }
}

/// Issues present on one side only, Ok-level entries excluded.
fn compare_issues(old: &[Issue], new: &[Issue]) -> (Vec<Issue>, Vec<Issue>) {
    let old_actionable: Vec<&Issue> =
        old.iter().filter(|i| i.severity > Severity::Ok).collect();
    let new_actionable: Vec<&Issue> =
        new.iter().filter(|i| i.severity > Severity::Ok).collect();

    let added = new_actionable
        .iter()
        .filter(|issue| !old_actionable.contains(issue))
        .map(|issue| (*issue).clone())
        .collect();
    let resolved = old_actionable
        .iter()
        .filter(|issue| !new_actionable.contains(issue))
        .map(|issue| (*issue).clone())
        .collect();
    (added, resolved)
}

/// Pod-identity fallback: a pod recreated between scans keeps its
/// workload-derived name prefix but swaps its generated suffixes, so
/// match on the stable prefix within the same namespace.
fn fallback_match<'a>(old: &'a Outcome, id: &ResourceId) -> Option<&'a [Issue]> {
    id.namespace.as_deref()?;
    let prefix = stable_prefix(&id.name);

    old.iter()
        .find(|(old_id, _)| {
            old_id.namespace == id.namespace && stable_prefix(&old_id.name) == prefix
        })
        .map(|(_, issues)| issues.as_slice())
}

/// Generated name suffixes are lowercase alphanumeric runs containing
/// at least one digit (replica-set hashes, random pod suffixes).
static GENERATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]*[0-9][a-z0-9]*$").unwrap()
});

/// The name with trailing generated segments stripped.
fn stable_prefix(name: &str) -> &str {
    let mut end = name.len();
    for segment in name.rsplit('-') {
        if segment.len() == end || !GENERATED.is_match(segment) {
            break;
        }
        // Drop the segment and its leading hyphen.
        end -= segment.len() + 1;
    }
    &name[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tally::Section;

    fn report(score_outcomes: Vec<(&str, Outcome)>) -> Report {
        let sections = score_outcomes
            .into_iter()
            .map(|(title, outcome)| Section::new(title, outcome))
            .collect();
        Report::new("test", sections, vec![])
    }

    fn outcome(entries: &[(&str, &[(Severity, &str)])]) -> Outcome {
        let mut o = Outcome::new();
        for (key, issues) in entries {
            let id = ResourceId::parse(key);
            o.ensure(id.clone());
            for (severity, message) in *issues {
                o.push(id.clone(), Issue::new(*severity, *message));
            }
        }
        o
    }

    #[test]
    fn delta_score_directionality() {
        assert!(DeltaScore::new(Severity::Ok, 10, 15, false).better());
        assert!(!DeltaScore::new(Severity::Error, 10, 15, true).better());
        assert!(DeltaScore::new(Severity::Error, 10, 15, true).worst());
        assert!(!DeltaScore::new(Severity::Warn, 7, 7, true).changed());
        assert_eq!(DeltaScore::new(Severity::Ok, 10, 15, false).delta(), 5);
        assert_eq!(DeltaScore::new(Severity::Ok, 15, 10, false).delta(), -5);
        assert_eq!(DeltaScore::new(Severity::Warn, 3, 1, true).summarize(), "improved");
        assert_eq!(DeltaScore::new(Severity::Warn, 1, 3, true).summarize(), "worsened");
        assert_eq!(DeltaScore::new(Severity::Warn, 2, 2, true).summarize(), "not changed");
    }

    #[test]
    fn stable_prefix_strips_generated_suffixes() {
        assert_eq!(stable_prefix("fred-abc12-xy789"), "fred");
        assert_eq!(stable_prefix("fred"), "fred");
        assert_eq!(stable_prefix("web-server"), "web-server");
        // Ordinals strip too; exact matching runs before the fallback,
        // so stable statefulset names never reach this path.
        assert_eq!(stable_prefix("web-0"), "web");
    }

    #[test]
    fn pod_churn_matches_through_fallback() {
        let old = report(vec![(
            "pods",
            outcome(&[("default/fred-abc12-xy789", &[(Severity::Warn, "No liveness probe")])]),
        )]);
        let new = report(vec![(
            "pods",
            outcome(&[("default/fred-def34-zz111", &[(Severity::Warn, "No liveness probe")])]),
        )]);

        let d = diff(&old, &new);
        assert!(d.errors.is_empty());
        assert!(d.sections[0].added.is_empty());
        assert!(d.sections[0].resolved.is_empty());
    }

    #[test]
    fn unmatched_resource_records_an_error() {
        let old = report(vec![("pods", outcome(&[("default/alice", &[])]))]);
        let new = report(vec![("pods", outcome(&[("default/bob", &[])]))]);

        let d = diff(&old, &new);
        assert_eq!(d.errors.len(), 1);
        assert!(d.errors[0].contains("missing resource ID default/bob"));
    }

    #[test]
    fn added_and_resolved_issues() {
        let old = report(vec![(
            "pods",
            outcome(&[(
                "default/web",
                &[(Severity::Warn, "No readiness probe"), (Severity::Ok, "fine")],
            )]),
        )]);
        let new = report(vec![(
            "pods",
            outcome(&[(
                "default/web",
                &[(Severity::Error, "Pod is not ready"), (Severity::Ok, "fine")],
            )]),
        )]);

        let d = diff(&old, &new);
        let section = &d.sections[0];
        let id = ResourceId::namespaced("default", "web");
        assert_eq!(section.added.get(&id).unwrap()[0].message, "Pod is not ready");
        assert_eq!(
            section.resolved.get(&id).unwrap()[0].message,
            "No readiness probe"
        );
    }

    #[test]
    fn tally_deltas_carry_inversion() {
        let old = report(vec![(
            "pods",
            outcome(&[("default/a", &[(Severity::Error, "x")]), ("default/b", &[])]),
        )]);
        let new = report(vec![(
            "pods",
            outcome(&[("default/a", &[]), ("default/b", &[])]),
        )]);

        let d = diff(&old, &new);
        assert!(d.overall.better());

        let tallies = &d.sections[0].tallies;
        let error_delta = tallies.iter().find(|t| t.severity == Severity::Error).unwrap();
        assert!(error_delta.inverse);
        assert!(error_delta.better());
        let ok_delta = tallies.iter().find(|t| t.severity == Severity::Ok).unwrap();
        assert!(!ok_delta.inverse);
        assert!(ok_delta.better());
    }

    #[test]
    fn missing_section_records_an_error() {
        let old = report(vec![("pods", outcome(&[("default/a", &[])]))]);
        let new = report(vec![("nodes", outcome(&[("n1", &[])]))]);

        let d = diff(&old, &new);
        assert!(d.errors.iter().any(|e| e.contains("missing section nodes")));
        assert!(d.sections.is_empty());
    }
}
