//! PersistentVolume sanitizer: phase state machine.

use crate::issues::{Issue, Outcome, Severity};
use crate::linters::meta_id;
use k8s_openapi::api::core::v1::PersistentVolume;

/// Lint every persistent volume. Volumes are cluster-scoped, so no
/// namespace filtering applies.
pub fn lint(volumes: &[PersistentVolume]) -> Outcome {
    let mut outcome = Outcome::new();
    for pv in volumes {
        let id = meta_id(&pv.metadata);
        outcome.ensure(id.clone());

        let phase = pv
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or_default();
        let issue = match phase {
            "Bound" => None,
            "Available" => Some(Issue::new(
                Severity::Info,
                "Volume is unbound but available",
            )),
            "Pending" => Some(Issue::new(Severity::Error, "Volume is in pending state")),
            "Lost" => Some(Issue::new(Severity::Error, "Volume is lost")),
            "Failed" => Some(Issue::new(Severity::Error, "Volume provisioning failed")),
            _ => None,
        };
        if let Some(issue) = issue {
            outcome.push(id, issue);
        }
    }
    outcome
}
