//! PersistentVolumeClaim sanitizer: phase and pod reference check.

use crate::issues::{Issue, Outcome, ResourceId, Severity};
use crate::linters::meta_id;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use std::collections::BTreeSet;

/// Lint every in-scope claim. A bound claim no pod volume references
/// is likely dead weight.
pub fn lint(claims: &[PersistentVolumeClaim], pods: &[Pod]) -> Outcome {
    let referenced = claim_refs(pods);

    let mut outcome = Outcome::new();
    for pvc in claims {
        let id = meta_id(&pvc.metadata);
        outcome.ensure(id.clone());

        let phase = pvc
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or_default();
        match phase {
            "Bound" => {
                if !referenced.contains(&id) {
                    outcome.push(id.clone(), Issue::new(Severity::Warn, "Used?"));
                }
            }
            "Pending" => {
                outcome.push(id.clone(), Issue::new(Severity::Error, "Claim is in pending state"));
            }
            "Lost" => {
                outcome.push(id.clone(), Issue::new(Severity::Error, "Claim is lost"));
            }
            _ => {}
        }
    }
    outcome
}

/// Claims referenced by any pod volume, namespace-qualified.
fn claim_refs(pods: &[Pod]) -> BTreeSet<ResourceId> {
    let mut refs = BTreeSet::new();
    for pod in pods {
        let Some(ns) = pod.metadata.namespace.as_deref() else {
            continue;
        };
        let volumes = pod
            .spec
            .as_ref()
            .and_then(|s| s.volumes.as_deref())
            .unwrap_or_default();
        for volume in volumes {
            if let Some(claim) = &volume.persistent_volume_claim {
                refs.insert(ResourceId::namespaced(ns, &claim.claim_name));
            }
        }
    }
    refs
}
