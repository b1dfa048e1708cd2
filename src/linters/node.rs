//! Node sanitizer: condition health, taint coverage, and utilization.

use crate::client::NodeMetrics;
use crate::client::quantity::quantity_cpu;
use crate::client::quantity::quantity_mem;
use crate::config::ScanConfig;
use crate::issues::{Issue, Outcome, ResourceId, Severity};
use crate::linters::utilization;
use k8s_openapi::api::core::v1::{Node, Pod, Taint, Toleration};
use std::collections::BTreeMap;

/// Lint every in-scope node. Taint coverage is assessed against the
/// tolerations of every pod in the cluster, not just in-scope ones.
pub fn lint(
    nodes: &[Node],
    all_pods: &[Pod],
    metrics: &BTreeMap<String, NodeMetrics>,
    config: &ScanConfig,
) -> Outcome {
    let tolerations: Vec<&Toleration> = all_pods
        .iter()
        .filter_map(|pod| pod.spec.as_ref())
        .flat_map(|spec| spec.tolerations.as_deref().unwrap_or_default())
        .collect();

    let mut outcome = Outcome::new();
    for node in nodes {
        let Some(name) = node.metadata.name.as_deref() else {
            continue;
        };
        let id = ResourceId::cluster(name);
        outcome.ensure(id.clone());

        let (ready, issues) = check_conditions(node);
        outcome.extend(id.clone(), issues);
        if !ready {
            continue;
        }

        for taint in node
            .spec
            .as_ref()
            .and_then(|s| s.taints.as_deref())
            .unwrap_or_default()
        {
            if !tolerated(taint, &tolerations) {
                outcome.push(
                    id.clone(),
                    Issue::new(
                        Severity::Warn,
                        format!("Found taint `{}` but no pod can tolerate", taint.key),
                    ),
                );
            }
        }

        outcome.extend(id, check_utilization(node, metrics.get(name), config));
    }
    outcome
}

/// Walk node conditions. A `Ready=False` condition is terminal: the
/// node is reported not ready and no further checks run against it.
fn check_conditions(node: &Node) -> (bool, Vec<Issue>) {
    let mut issues = Vec::new();
    let conditions = node
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default();

    for condition in conditions {
        if condition.status == "Unknown" {
            issues.push(Issue::new(Severity::Error, "Unable to assess node health"));
            continue;
        }
        let active = condition.status == "True";
        match condition.type_.as_str() {
            "Ready" => {
                if !active {
                    issues.push(Issue::new(Severity::Error, "Node is not in ready state"));
                    return (false, issues);
                }
            }
            "OutOfDisk" if active => {
                issues.push(Issue::new(Severity::Error, "Out of disk space"));
            }
            "PIDPressure" if active => {
                issues.push(Issue::new(Severity::Error, "Insufficient available PIDs"));
            }
            "NetworkUnavailable" if active => {
                issues.push(Issue::new(Severity::Error, "No network configured"));
            }
            "MemoryPressure" if active => {
                issues.push(Issue::new(Severity::Warn, "Insufficient memory"));
            }
            "DiskPressure" if active => {
                issues.push(Issue::new(Severity::Warn, "Insufficient disk space"));
            }
            _ => {}
        }
    }
    (true, issues)
}

fn tolerated(taint: &Taint, tolerations: &[&Toleration]) -> bool {
    tolerations.iter().any(|tol| {
        // An absent toleration key matches every taint key.
        let key_ok = tol.key.as_deref().map_or(true, |k| k == taint.key);
        let effect_ok = tol
            .effect
            .as_deref()
            .map_or(true, |e| e.is_empty() || e == taint.effect);
        let value_ok = match tol.operator.as_deref().unwrap_or("Equal") {
            "Exists" => true,
            _ => tol.value.as_deref() == taint.value.as_deref(),
        };
        key_ok && effect_ok && value_ok
    })
}

fn check_utilization(node: &Node, metrics: Option<&NodeMetrics>, config: &ScanConfig) -> Vec<Issue> {
    let Some(metrics) = metrics else {
        return vec![Issue::new(Severity::Warn, "No node metrics available")];
    };

    let allocatable = node.status.as_ref().and_then(|s| s.allocatable.as_ref());
    let cpu_avail = allocatable
        .and_then(|a| a.get("cpu"))
        .map(quantity_cpu)
        .unwrap_or(0);
    let mem_avail = allocatable
        .and_then(|a| a.get("memory"))
        .map(quantity_mem)
        .unwrap_or(0);

    let mut issues = Vec::new();
    if let Some(issue) =
        utilization::check_threshold("CPU", metrics.cpu_millis, cpu_avail, config.node_cpu_limit)
    {
        issues.push(issue);
    }
    if let Some(issue) =
        utilization::check_threshold("Memory", metrics.mem_bytes, mem_avail, config.node_mem_limit)
    {
        issues.push(issue);
    }
    issues
}
