//! Severity tallies, scoring, and report snapshots.
//!
//! A `Tally` rolls one linter's `Outcome` up into per-severity counters
//! and a 0-100 score. A `Report` is the immutable snapshot of a whole
//! scan: one `Section` per resource kind plus the derived overall score
//! and letter grade. Reports are the persisted interchange format the
//! diff engine consumes, so the field layout here is compatibility
//! sensitive.

use crate::issues::{Outcome, Severity};
use serde::{Deserialize, Serialize};

/// Per-section severity counters and derived score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Counters indexed by `Severity` (`[ok, info, warn, error]`).
    pub counts: [usize; 4],
    /// Derived 0-100 score.
    pub score: u32,
    /// False only when no resource was rolled up (section skipped).
    pub valid: bool,
}

impl Tally {
    /// Roll an outcome up into a tally.
    ///
    /// A resource with an empty issue list counts once as `Ok`; a
    /// resource with issues counts once per issue at that issue's
    /// severity, so one resource can land in several buckets.
    pub fn rollup(outcome: &Outcome) -> Self {
        let mut counts = [0usize; 4];
        let mut seen = false;

        for (_, issues) in outcome.iter() {
            seen = true;
            if issues.is_empty() {
                counts[Severity::Ok.index()] += 1;
            } else {
                for issue in issues {
                    counts[issue.severity.index()] += 1;
                }
            }
        }

        let mut tally = Self {
            counts,
            score: 0,
            valid: seen,
        };
        tally.score = tally.compute_score();
        tally
    }

    /// Total issue and ok events recorded.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Count for one severity bucket.
    pub fn count(&self, severity: Severity) -> usize {
        self.counts[severity.index()]
    }

    /// Score as the rounded percentage of non-actionable events
    /// (`ok` + `info`) over all events.
    fn compute_score(&self) -> u32 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        let fine = self.count(Severity::Ok) + self.count(Severity::Info);
        ((fine as f64 / total as f64) * 100.0).round() as u32
    }

    /// Letter grade for this tally's score.
    pub fn grade(&self) -> &'static str {
        grade(self.score)
    }
}

impl Default for Tally {
    fn default() -> Self {
        Self {
            counts: [0; 4],
            score: 0,
            valid: false,
        }
    }
}

/// Letter grade for a 0-100 score.
pub fn grade(score: u32) -> &'static str {
    match score {
        90..=u32::MAX => "A",
        80..=89 => "B",
        70..=79 => "C",
        60..=69 => "D",
        50..=59 => "E",
        _ => "F",
    }
}

/// One scanned resource kind: its title, tally, and detailed outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Section title (the sanitizer name, e.g. `"pods"`).
    pub title: String,
    /// Rolled-up severity counters.
    pub tally: Tally,
    /// Per-resource findings.
    pub outcome: Outcome,
}

impl Section {
    /// Build a section from a linter outcome.
    pub fn new(title: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            title: title.into(),
            tally: Tally::rollup(&outcome),
            outcome,
        }
    }
}

/// Immutable snapshot of one full scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Cluster the scan ran against.
    pub cluster: String,
    /// Scan completion time (UTC).
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Overall score: integer mean of the valid section scores.
    pub score: u32,
    /// Letter grade for the overall score.
    pub grade: String,
    /// One section per scanned resource kind.
    pub sections: Vec<Section>,
    /// Section-level failures (fetch errors and the like).
    #[serde(default)]
    pub errors: Vec<String>,
}

impl Report {
    /// Assemble a report, deriving the overall score and grade.
    ///
    /// Sections that rolled up zero resources are excluded from the
    /// score denominator, not treated as zero.
    pub fn new(cluster: impl Into<String>, sections: Vec<Section>, errors: Vec<String>) -> Self {
        let valid: Vec<u32> = sections
            .iter()
            .filter(|s| s.tally.valid)
            .map(|s| s.tally.score)
            .collect();
        let score = if valid.is_empty() {
            0
        } else {
            valid.iter().sum::<u32>() / valid.len() as u32
        };

        Self {
            cluster: cluster.into(),
            timestamp: chrono::Utc::now(),
            score,
            grade: grade(score).to_string(),
            sections,
            errors,
        }
    }

    /// Look a section up by title.
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }

    /// Maximum severity found anywhere in the report.
    pub fn max_severity(&self) -> Severity {
        self.sections
            .iter()
            .map(|s| s.outcome.max_severity())
            .max()
            .unwrap_or(Severity::Ok)
    }
}
