//! Deployment sanitizer: scale health, template hygiene, allocation.

use crate::client::PodMetrics;
use crate::config::ScanConfig;
use crate::issues::{Issue, Outcome, ResourceId, Severity};
use crate::linters::{meta_id, template_issues, workload_allocation};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;

/// Lint every in-scope deployment against the pod set and observed
/// container metrics.
pub fn lint(
    deployments: &[Deployment],
    pods: &[Pod],
    metrics: &BTreeMap<ResourceId, PodMetrics>,
    config: &ScanConfig,
) -> Outcome {
    let mut outcome = Outcome::new();
    for deployment in deployments {
        let id = meta_id(&deployment.metadata);
        outcome.ensure(id.clone());

        let spec = match &deployment.spec {
            Some(spec) => spec,
            None => continue,
        };
        let replicas = spec.replicas.unwrap_or(0);
        if replicas == 0 {
            outcome.push(id.clone(), Issue::new(Severity::Info, "Zero scale detected"));
        }

        if let Some(status) = &deployment.status {
            if status.available_replicas.unwrap_or(0) == 0 {
                outcome.push(id.clone(), Issue::new(Severity::Warn, "Used?"));
            }
            if let Some(collisions) = status.collision_count.filter(|c| *c > 0) {
                outcome.push(
                    id.clone(),
                    Issue::new(
                        Severity::Error,
                        format!("ReplicaSet collisions detected ({})", collisions),
                    ),
                );
            }
        }

        if let Some(issue) = template_issues(&spec.template) {
            outcome.push(id.clone(), issue);
        }

        outcome.extend(
            id,
            workload_allocation(
                &spec.selector,
                &spec.template,
                replicas as u64,
                pods,
                metrics,
                config,
            ),
        );
    }
    outcome
}
