//! StatefulSet sanitizer: scale health, template hygiene, allocation.

use crate::client::PodMetrics;
use crate::config::ScanConfig;
use crate::issues::{Issue, Outcome, ResourceId, Severity};
use crate::linters::{meta_id, template_issues, workload_allocation};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;

/// Lint every in-scope statefulset against the pod set and observed
/// container metrics.
pub fn lint(
    stateful_sets: &[StatefulSet],
    pods: &[Pod],
    metrics: &BTreeMap<ResourceId, PodMetrics>,
    config: &ScanConfig,
) -> Outcome {
    let mut outcome = Outcome::new();
    for sts in stateful_sets {
        let id = meta_id(&sts.metadata);
        outcome.ensure(id.clone());

        let spec = match &sts.spec {
            Some(spec) => spec,
            None => continue,
        };
        let replicas = spec.replicas.unwrap_or(0);
        if replicas == 0 {
            outcome.push(id.clone(), Issue::new(Severity::Info, "Zero scale detected"));
        }

        if let Some(status) = &sts.status {
            if status.current_replicas.unwrap_or(0) == 0 {
                outcome.push(id.clone(), Issue::new(Severity::Warn, "Used?"));
            }
            if let Some(collisions) = status.collision_count.filter(|c| *c > 0) {
                outcome.push(
                    id.clone(),
                    Issue::new(
                        Severity::Error,
                        format!("Revision collisions detected ({})", collisions),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linters::fixtures::{container, meta};
    use k8s_openapi::api::apps::v1::{StatefulSetSpec, StatefulSetStatus};
    use k8s_openapi::api::core::v1::{PodSpec, PodTemplateSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

    fn stateful_set(replicas: i32, current: i32) -> StatefulSet {
        StatefulSet {
            metadata: meta("default", "db"),
            spec: Some(StatefulSetSpec {
                replicas: Some(replicas),
                selector: LabelSelector {
                    match_labels: Some([("app".to_string(), "db".to_string())].into()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        containers: vec![container("c1", "postgres:16.4")],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            status: Some(StatefulSetStatus {
                current_replicas: Some(current),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn zero_scale_and_zero_current_flag_independently() {
        let outcome = lint(
            &[stateful_set(0, 0)],
            &[],
            &BTreeMap::new(),
            &ScanConfig::default(),
        );
        let issues = outcome
            .get(&ResourceId::namespaced("default", "db"))
            .unwrap();
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Info && i.message == "Zero scale detected"));
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Warn && i.message == "Used?"));
    }

    #[test]
    fn healthy_scale_keeps_scale_checks_quiet() {
        let outcome = lint(
            &[stateful_set(3, 3)],
            &[],
            &BTreeMap::new(),
            &ScanConfig::default(),
        );
        let issues = outcome
            .get(&ResourceId::namespaced("default", "db"))
            .unwrap();
        assert!(!issues.iter().any(|i| i.message == "Zero scale detected"));
        assert!(!issues.iter().any(|i| i.message == "Used?"));
    }

    #[test]
    fn collision_count_is_an_error() {
        let mut sts = stateful_set(1, 1);
        sts.status.as_mut().unwrap().collision_count = Some(1);
        let outcome = lint(&[sts], &[], &BTreeMap::new(), &ScanConfig::default());
        let issues = outcome
            .get(&ResourceId::namespaced("default", "db"))
            .unwrap();
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message.contains("collisions")));
    }
}
