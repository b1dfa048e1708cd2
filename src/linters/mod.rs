//! Resource sanitizers.
//!
//! One linter per resource kind, each a pure function from already
//! fetched, in-memory collections to an `Outcome`. No linter performs
//! I/O; the orchestrator in `scan` gathers their inputs through the
//! `Lister` and hands them over.

pub mod configmap;
pub mod container;
pub mod deployment;
pub mod hpa;
pub mod namespace;
pub mod node;
pub mod pod;
pub mod pv;
pub mod pvc;
pub mod secret;
pub mod service;
pub mod serviceaccount;
pub mod statefulset;
pub mod utilization;

use crate::client::PodMetrics;
use crate::config::ScanConfig;
use crate::issues::{Issue, Outcome, ResourceId};
use crate::labels;
use k8s_openapi::api::core::v1::{Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

use crate::client::quantity::{quantity_cpu, quantity_mem};

/// Canonical identity for an object's metadata.
///
/// Objects without a namespace render as bare names (cluster-scoped).
pub fn meta_id(meta: &ObjectMeta) -> ResourceId {
    let name = meta.name.clone().unwrap_or_default();
    match &meta.namespace {
        Some(ns) => ResourceId::namespaced(ns, name),
        None => ResourceId::cluster(name),
    }
}

/// Requested CPU (millicores) and memory (bytes) for one pod spec,
/// summed over init and regular containers.
pub fn pod_requests(spec: &PodSpec) -> (u64, u64) {
    let containers = spec
        .init_containers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .chain(spec.containers.iter());

    let mut cpu = 0;
    let mut mem = 0;
    for container in containers {
        let Some(requests) = container
            .resources
            .as_ref()
            .and_then(|r| r.requests.as_ref())
        else {
            continue;
        };
        if let Some(q) = requests.get("cpu") {
            cpu += quantity_cpu(q);
        }
        if let Some(q) = requests.get("memory") {
            mem += quantity_mem(q);
        }
    }
    (cpu, mem)
}

/// Pods matching a workload's label selector.
///
/// A selector the matcher cannot evaluate yields an empty set and a
/// logged warning; the caller's utilization check degrades to skipped.
pub fn pods_for_selector<'a>(selector: &LabelSelector, pods: &'a [Pod]) -> Vec<&'a Pod> {
    let mut matched = Vec::new();
    for pod in pods {
        match labels::matches_selector(selector, pod.metadata.labels.as_ref()) {
            Ok(true) => matched.push(pod),
            Ok(false) => {}
            Err(e) => {
                log::warn!("Skipping selector match: {}", e);
                return Vec::new();
            }
        }
    }
    matched
}

/// Aggregate static container checks over a workload's pod template.
///
/// Returns one aggregate issue keyed by container name, or `None` when
/// every container is clean.
pub fn template_issues(template: &k8s_openapi::api::core::v1::PodTemplateSpec) -> Option<Issue> {
    let spec = template.spec.as_ref()?;

    let mut subs = Outcome::new();
    for c in spec.init_containers.as_deref().unwrap_or_default() {
        let issues = container::check_init_container(c);
        if !issues.is_empty() {
            subs.extend(ResourceId::cluster(&c.name), issues);
        }
    }
    for c in &spec.containers {
        let issues = container::check_container(c);
        if !issues.is_empty() {
            subs.extend(ResourceId::cluster(&c.name), issues);
        }
    }

    if subs.is_empty() {
        None
    } else {
        Some(Issue::aggregate("Container issues", subs))
    }
}

/// Two-sided allocation check for one workload: total requested
/// resources (per-pod request times replica count) against observed
/// usage across the pods its selector matches.
///
/// Skipped when nothing is requested or no pods match.
pub fn workload_allocation(
    selector: &LabelSelector,
    template: &k8s_openapi::api::core::v1::PodTemplateSpec,
    replicas: u64,
    pods: &[Pod],
    metrics: &BTreeMap<ResourceId, PodMetrics>,
    config: &ScanConfig,
) -> Vec<Issue> {
    let Some(spec) = template.spec.as_ref() else {
        return Vec::new();
    };
    let matched = pods_for_selector(selector, pods);
    if matched.is_empty() {
        return Vec::new();
    }

    let (cpu_per_pod, mem_per_pod) = pod_requests(spec);
    let (cpu_used, mem_used) = observed_usage(&matched, metrics);

    let mut issues = Vec::new();
    if let Some(issue) = utilization::check_allocation(
        "CPU",
        cpu_per_pod * replicas,
        cpu_used,
        config.cpu_allocation_limits,
    ) {
        issues.push(issue);
    }
    if let Some(issue) = utilization::check_allocation(
        "Memory",
        mem_per_pod * replicas,
        mem_used,
        config.mem_allocation_limits,
    ) {
        issues.push(issue);
    }
    issues
}

/// Observed CPU/memory usage summed over a set of pods.
pub fn observed_usage(pods: &[&Pod], metrics: &BTreeMap<ResourceId, PodMetrics>) -> (u64, u64) {
    let mut cpu = 0;
    let mut mem = 0;
    for pod in pods {
        let id = meta_id(&pod.metadata);
        if let Some(pm) = metrics.get(&id) {
            for c in &pm.containers {
                cpu += c.cpu_millis;
                mem += c.mem_bytes;
            }
        }
    }
    (cpu, mem)
}
