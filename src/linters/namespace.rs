//! Namespace sanitizer: phase health and usage.

use crate::config::ScanConfig;
use crate::issues::{Issue, Outcome, ResourceId, Severity};
use k8s_openapi::api::core::v1::{Namespace, Pod};
use std::collections::BTreeSet;

/// Lint every in-scope namespace against the full pod set.
pub fn lint(namespaces: &[Namespace], all_pods: &[Pod], config: &ScanConfig) -> Outcome {
    let populated: BTreeSet<&str> = all_pods
        .iter()
        .filter_map(|pod| pod.metadata.namespace.as_deref())
        .collect();

    let mut outcome = Outcome::new();
    for ns in namespaces {
        let Some(name) = ns.metadata.name.as_deref() else {
            continue;
        };
        let id = ResourceId::cluster(name);
        outcome.ensure(id.clone());

        let phase = ns
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("Active");
        if phase != "Active" {
            outcome.push(id.clone(), Issue::new(Severity::Error, "Namespace is inactive"));
        }

        // System namespaces are expected to sit empty on small clusters.
        if !populated.contains(name) && !config.system_namespace(name) {
            outcome.push(id, Issue::new(Severity::Info, "Used?"));
        }
    }
    outcome
}
