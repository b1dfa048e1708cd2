//! Diffing persisted report snapshots through the store.

use kube_sanitize::report::{diff, ReportStore};
use kube_sanitize::tally::{Report, Section};
use kube_sanitize::{Issue, Outcome, ResourceId, Severity};
use chrono::{Duration, TimeZone, Utc};

fn pods_section(entries: &[(&str, &[(Severity, &str)])]) -> Section {
    let mut outcome = Outcome::new();
    for (key, issues) in entries {
        let id = ResourceId::parse(key);
        outcome.ensure(id.clone());
        for (severity, message) in *issues {
            outcome.push(id.clone(), Issue::new(*severity, *message));
        }
    }
    Section::new("pods", outcome)
}

fn report_at(section: Section, offset_secs: i64) -> Report {
    let mut report = Report::new("prod", vec![section], vec![]);
    report.timestamp =
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(offset_secs);
    report
}

#[test]
fn diff_of_persisted_snapshots_survives_serialization() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ReportStore::new(tmp.path()).unwrap();

    store
        .save(&report_at(
            pods_section(&[("default/web", &[(Severity::Warn, "No liveness probe")])]),
            0,
        ))
        .unwrap();
    store
        .save(&report_at(pods_section(&[("default/web", &[])]), 60))
        .unwrap();

    let (previous, latest) = store.last_two("prod").unwrap().unwrap();
    let d = diff(&previous, &latest);

    assert!(d.errors.is_empty());
    assert!(d.overall.better());
    let section = &d.sections[0];
    assert!(section.added.is_empty());
    assert_eq!(
        section
            .resolved
            .get(&ResourceId::namespaced("default", "web"))
            .unwrap()[0]
            .message,
        "No liveness probe"
    );
}

#[test]
fn recreated_pod_matches_previous_scan_by_name_prefix() {
    let old = report_at(
        pods_section(&[(
            "default/fred-abc12-xy789",
            &[(Severity::Warn, "No readiness probe")],
        )]),
        0,
    );
    let new = report_at(
        pods_section(&[(
            "default/fred-def34-zz111",
            &[(Severity::Warn, "No readiness probe")],
        )]),
        60,
    );

    let d = diff(&old, &new);
    assert!(d.errors.is_empty());
    assert!(!d.sections[0].changed());
}

#[test]
fn regression_shows_as_added_issue_and_worsened_tally() {
    let old = report_at(pods_section(&[("default/web", &[])]), 0);
    let new = report_at(
        pods_section(&[("default/web", &[(Severity::Error, "Pod is not ready")])]),
        60,
    );

    let d = diff(&old, &new);
    let section = &d.sections[0];

    assert_eq!(
        section
            .added
            .get(&ResourceId::namespaced("default", "web"))
            .unwrap()[0]
            .message,
        "Pod is not ready"
    );
    let error_delta = section
        .tallies
        .iter()
        .find(|t| t.severity == Severity::Error)
        .unwrap();
    assert!(error_delta.worst());
    assert_eq!(error_delta.summarize(), "worsened");
    assert!(!d.overall.better());
}

#[test]
fn retention_prunes_oldest_snapshots() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ReportStore::new(tmp.path()).unwrap();
    for i in 0..4 {
        store
            .save(&report_at(pods_section(&[("default/web", &[])]), i * 60))
            .unwrap();
    }

    store.prune("prod", 3).unwrap();
    assert_eq!(store.list("prod").unwrap().len(), 3);

    // The two most recent snapshots still diff cleanly.
    let (previous, latest) = store.last_two("prod").unwrap().unwrap();
    assert!(previous.timestamp < latest.timestamp);
    assert!(diff(&previous, &latest).errors.is_empty());
}
