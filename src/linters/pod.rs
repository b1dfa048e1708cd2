//! Pod sanitizer: phase, container-status roll-up, per-container
//! checks, and service-account hygiene.

use crate::client::PodMetrics;
use crate::config::ScanConfig;
use crate::issues::{Issue, Outcome, ResourceId, Severity};
use crate::linters::container::{
    check_container, check_init_container, check_utilization, diagnose_statuses, tally_statuses,
};
use crate::linters::meta_id;
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;

/// Lint every in-scope pod against observed container metrics.
pub fn lint(
    pods: &[Pod],
    metrics: &BTreeMap<ResourceId, PodMetrics>,
    config: &ScanConfig,
) -> Outcome {
    let mut outcome = Outcome::new();
    for pod in pods {
        let id = meta_id(&pod.metadata);
        outcome.ensure(id.clone());

        check_phase(pod, &id, &mut outcome);
        check_statuses(pod, &id, config, &mut outcome);
        check_containers(pod, &id, metrics.get(&id), config, &mut outcome);

        let has_sa = pod
            .spec
            .as_ref()
            .and_then(|s| s.service_account_name.as_deref())
            .is_some_and(|name| !name.is_empty());
        if !has_sa {
            outcome.push(
                id,
                Issue::new(Severity::Info, "No service account specified"),
            );
        }
    }
    outcome
}

fn check_phase(pod: &Pod, id: &ResourceId, outcome: &mut Outcome) {
    let phase = pod
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or("Unknown");
    if phase != "Running" && phase != "Succeeded" {
        outcome.push(
            id.clone(),
            Issue::new(
                Severity::Error,
                format!("Pod is in an unhappy phase ({})", phase),
            ),
        );
    }
}

fn check_statuses(pod: &Pod, id: &ResourceId, config: &ScanConfig, outcome: &mut Outcome) {
    let Some(status) = &pod.status else {
        return;
    };

    if let Some(statuses) = status.init_container_statuses.as_deref() {
        let counts = tally_statuses(statuses);
        if let Some(issue) = diagnose_statuses(&counts, true, config.restarts_limit) {
            outcome.push(id.clone(), issue);
        }
    }
    if let Some(statuses) = status.container_statuses.as_deref() {
        let counts = tally_statuses(statuses);
        if let Some(issue) = diagnose_statuses(&counts, false, config.restarts_limit) {
            outcome.push(id.clone(), issue);
        }
    }
}

/// Per-container findings are grouped under one aggregate issue keyed
/// by container name, so a pod stays a single outcome entry.
fn check_containers(
    pod: &Pod,
    id: &ResourceId,
    metrics: Option<&PodMetrics>,
    config: &ScanConfig,
    outcome: &mut Outcome,
) {
    let Some(spec) = &pod.spec else {
        return;
    };

    let mut subs = Outcome::new();
    for container in spec.init_containers.as_deref().unwrap_or_default() {
        let issues = check_init_container(container);
        if !issues.is_empty() {
            subs.extend(ResourceId::cluster(&container.name), issues);
        }
    }
    for container in &spec.containers {
        let mut issues = check_container(container);
        issues.extend(check_utilization(
            container,
            metrics.and_then(|m| m.container(&container.name)),
            config,
        ));
        if !issues.is_empty() {
            subs.extend(ResourceId::cluster(&container.name), issues);
        }
    }

    if !subs.is_empty() {
        outcome.push(id.clone(), Issue::aggregate("Container issues", subs));
    }
}
