//! HorizontalPodAutoscaler sanitizer: burst-capacity projection.
//!
//! For each HPA the projector simulates a scale-out to `maxReplicas`
//! and compares the burst total (not the delta beyond current replicas)
//! against available cluster capacity. A cluster-wide aggregate assumes
//! every HPA bursts at the same time; that is a deliberately pessimistic
//! worst case, and it counts each HPA's demand on top of the per-target
//! findings already emitted.

use crate::client::quantity::{format_cpu, format_mem};
use crate::issues::{Issue, Outcome, ResourceId, Severity};
use crate::linters::{meta_id, pod_requests};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::PodSpec;

/// Project every in-scope HPA against available cluster CPU
/// (millicores) and memory (bytes).
pub fn lint(
    hpas: &[HorizontalPodAutoscaler],
    deployments: &[Deployment],
    stateful_sets: &[StatefulSet],
    available_cpu: u64,
    available_mem: u64,
) -> Outcome {
    let mut outcome = Outcome::new();
    let mut total_cpu: u64 = 0;
    let mut total_mem: u64 = 0;

    for hpa in hpas {
        let id = meta_id(&hpa.metadata);
        outcome.ensure(id.clone());

        let Some(spec) = &hpa.spec else {
            continue;
        };
        let ns = hpa.metadata.namespace.as_deref().unwrap_or_default();
        let target = &spec.scale_target_ref;

        let Some(template) = resolve_target(&target.kind, ns, &target.name, deployments, stateful_sets)
        else {
            outcome.push(
                id,
                Issue::new(
                    Severity::Error,
                    format!(
                        "Used? Unable to locate scale target {} {}/{}",
                        target.kind, ns, target.name
                    ),
                ),
            );
            continue;
        };

        let (cpu_per_pod, mem_per_pod) = pod_requests(template);
        let max = spec.max_replicas.max(0) as u64;
        let projected_cpu = cpu_per_pod * max;
        let projected_mem = mem_per_pod * max;
        total_cpu += projected_cpu;
        total_mem += projected_mem;

        if projected_cpu > available_cpu {
            outcome.push(
                id.clone(),
                Issue::new(
                    Severity::Warn,
                    format!(
                        "At burst, CPU will exceed cluster capacity by {}",
                        format_cpu(projected_cpu - available_cpu)
                    ),
                ),
            );
        }
        if projected_mem > available_mem {
            outcome.push(
                id,
                Issue::new(
                    Severity::Warn,
                    format!(
                        "At burst, Memory will exceed cluster capacity by {}",
                        format_mem(projected_mem - available_mem)
                    ),
                ),
            );
        }
    }

    let mut overages = Vec::new();
    if total_cpu > available_cpu {
        overages.push(format!("CPU by {}", format_cpu(total_cpu - available_cpu)));
    }
    if total_mem > available_mem {
        overages.push(format!("Memory by {}", format_mem(total_mem - available_mem)));
    }
    if !overages.is_empty() {
        outcome.push(
            ResourceId::cluster("cluster"),
            Issue::new(
                Severity::Warn,
                format!(
                    "If all HPAs triggered, cluster capacity would be exceeded: {}",
                    overages.join(", ")
                ),
            ),
        );
    }
    outcome
}

/// Pod template spec of the HPA's scale target, if it resolves.
fn resolve_target<'a>(
    kind: &str,
    ns: &str,
    name: &str,
    deployments: &'a [Deployment],
    stateful_sets: &'a [StatefulSet],
) -> Option<&'a PodSpec> {
    match kind {
        "Deployment" => deployments
            .iter()
            .find(|d| named(&d.metadata, ns, name))
            .and_then(|d| d.spec.as_ref())
            .and_then(|s| s.template.spec.as_ref()),
        "StatefulSet" => stateful_sets
            .iter()
            .find(|sts| named(&sts.metadata, ns, name))
            .and_then(|sts| sts.spec.as_ref())
            .and_then(|s| s.template.spec.as_ref()),
        _ => None,
    }
}

fn named(
    meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta,
    ns: &str,
    name: &str,
) -> bool {
    meta.namespace.as_deref() == Some(ns) && meta.name.as_deref() == Some(name)
}
