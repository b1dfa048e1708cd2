//! Per-container checks shared by the Pod, Deployment, and StatefulSet
//! sanitizers, plus the container-status roll-up state machine.

use crate::client::ContainerMetrics;
use crate::client::quantity::{quantity_cpu, quantity_mem};
use crate::config::ScanConfig;
use crate::issues::{Issue, Severity};
use crate::linters::utilization;
use k8s_openapi::api::core::v1::{Container, ContainerStatus, Probe};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeSet;

/// Static checks for one container spec: image tagging, probes,
/// resource declarations, and port naming.
pub fn check_container(container: &Container) -> Vec<Issue> {
    let mut issues = Vec::new();
    check_image(container, &mut issues);
    check_probes(container, &mut issues);
    check_resources(container, &mut issues);
    check_ports(container, &mut issues);
    issues
}

/// Static checks for an init container. Init containers run to
/// completion, so probe checks do not apply.
pub fn check_init_container(container: &Container) -> Vec<Issue> {
    let mut issues = Vec::new();
    check_image(container, &mut issues);
    check_resources(container, &mut issues);
    issues
}

/// Observed usage against declared limits for one container.
///
/// No issue when metrics are unavailable for the container.
pub fn check_utilization(
    container: &Container,
    metrics: Option<&ContainerMetrics>,
    config: &ScanConfig,
) -> Vec<Issue> {
    let Some(metrics) = metrics else {
        return Vec::new();
    };
    let limits = container.resources.as_ref().and_then(|r| r.limits.as_ref());
    let cpu_limit = limits
        .and_then(|l| l.get("cpu"))
        .map(quantity_cpu)
        .unwrap_or(0);
    let mem_limit = limits
        .and_then(|l| l.get("memory"))
        .map(quantity_mem)
        .unwrap_or(0);

    let mut issues = Vec::new();
    if let Some(issue) =
        utilization::check_threshold("CPU", metrics.cpu_millis, cpu_limit, config.pod_cpu_limit)
    {
        issues.push(issue);
    }
    if let Some(issue) =
        utilization::check_threshold("Memory", metrics.mem_bytes, mem_limit, config.pod_mem_limit)
    {
        issues.push(issue);
    }
    issues
}

fn check_image(container: &Container, issues: &mut Vec<Issue>) {
    let image = container.image.as_deref().unwrap_or_default();
    // The tag lives after the last path segment's colon; registries may
    // carry their own port colon (reg:5000/app).
    let tag = image
        .rsplit('/')
        .next()
        .and_then(|last| last.split_once(':'))
        .map(|(_, tag)| tag);

    match tag {
        None => issues.push(Issue::new(Severity::Error, "Untagged docker image in use")),
        Some("latest") => issues.push(Issue::new(
            Severity::Warn,
            "Image tagged \"latest\" in use",
        )),
        Some(_) => {}
    }
}

fn check_probes(container: &Container, issues: &mut Vec<Issue>) {
    if container.liveness_probe.is_none() {
        issues.push(Issue::new(Severity::Warn, "No liveness probe"));
    }
    if container.readiness_probe.is_none() {
        issues.push(Issue::new(Severity::Warn, "No readiness probe"));
    }
}

fn check_resources(container: &Container, issues: &mut Vec<Issue>) {
    let resources = container.resources.as_ref();
    let has_requests = resources
        .and_then(|r| r.requests.as_ref())
        .is_some_and(|m| !m.is_empty());
    let has_limits = resources
        .and_then(|r| r.limits.as_ref())
        .is_some_and(|m| !m.is_empty());

    if !has_requests && !has_limits {
        issues.push(Issue::new(
            Severity::Warn,
            "No resource requests or limits defined",
        ));
    } else if has_requests && !has_limits {
        issues.push(Issue::new(Severity::Warn, "No resource limits defined"));
    }
    // Limits without requests default the requests; nothing to flag.
}

fn check_ports(container: &Container, issues: &mut Vec<Issue>) {
    // Ports a probe addresses numerically do not need a name.
    let probe_ports = numeric_probe_ports(container);

    for port in container.ports.as_deref().unwrap_or_default() {
        if port.name.is_none() && !probe_ports.contains(&port.container_port) {
            issues.push(Issue::new(
                Severity::Warn,
                format!("Unnamed port {}", port.container_port),
            ));
        }
    }
}

fn numeric_probe_ports(container: &Container) -> BTreeSet<i32> {
    let mut ports = BTreeSet::new();
    for probe in [&container.liveness_probe, &container.readiness_probe]
        .into_iter()
        .flatten()
    {
        if let Some(port) = probe_port(probe) {
            ports.insert(port);
        }
    }
    ports
}

fn probe_port(probe: &Probe) -> Option<i32> {
    let port = probe
        .http_get
        .as_ref()
        .map(|h| &h.port)
        .or_else(|| probe.tcp_socket.as_ref().map(|t| &t.port))?;
    match port {
        IntOrString::Int(n) => Some(*n),
        IntOrString::String(_) => None,
    }
}

/// Rolled-up counts across a pod's container statuses.
#[derive(Debug, Default, Clone)]
pub struct StatusCounts {
    pub total: usize,
    pub ready: usize,
    pub waiting: usize,
    pub terminated: usize,
    pub restarts: i32,
    /// Reason strings from waiting/terminated states, for display.
    pub reasons: Vec<String>,
}

/// Tally one set of container statuses.
pub fn tally_statuses(statuses: &[ContainerStatus]) -> StatusCounts {
    let mut counts = StatusCounts {
        total: statuses.len(),
        ..Default::default()
    };

    for status in statuses {
        if status.ready {
            counts.ready += 1;
        }
        counts.restarts += status.restart_count;
        let Some(state) = &status.state else {
            continue;
        };
        if let Some(waiting) = &state.waiting {
            counts.waiting += 1;
            if let Some(reason) = &waiting.reason {
                counts.reasons.push(reason.clone());
            }
        }
        if let Some(terminated) = &state.terminated {
            counts.terminated += 1;
            if let Some(reason) = &terminated.reason {
                counts.reasons.push(reason.clone());
            }
        }
    }
    counts
}

/// Diagnose a pod's health from rolled-up container-status counts.
///
/// Emits at most one issue. A fully terminated set (nothing ready) is
/// not actionable and yields nothing.
pub fn diagnose_statuses(counts: &StatusCounts, is_init: bool, restarts_limit: i32) -> Option<Issue> {
    let issue = if counts.terminated > 0 && counts.ready > 0 && !is_init {
        Issue::new(
            Severity::Warn,
            format!("Pod is terminating [{}/{}]", counts.ready, counts.total),
        )
    } else if counts.terminated > 0 && counts.ready == 0 {
        return None;
    } else if counts.waiting > 0 {
        Issue::new(
            Severity::Error,
            format!("Pod is waiting [{}/{}]", counts.ready, counts.total),
        )
    } else if counts.ready == 0 {
        Issue::new(Severity::Error, "Pod is not ready")
    } else if counts.restarts > restarts_limit {
        Issue::new(
            Severity::Warn,
            format!("Pod was restarted ({}) time(s)", counts.restarts),
        )
    } else {
        return None;
    };

    if counts.reasons.is_empty() {
        Some(issue)
    } else {
        Some(Issue::new(
            issue.severity,
            format!("{} ({})", issue.message, counts.reasons.join(", ")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linters::fixtures::{container, resources};
    use k8s_openapi::api::core::v1::{
        ContainerPort, ContainerState, ContainerStateWaiting, HTTPGetAction, ResourceRequirements,
    };

    fn status(name: &str, ready: bool, restarts: i32) -> ContainerStatus {
        ContainerStatus {
            name: name.to_string(),
            ready,
            restart_count: restarts,
            ..Default::default()
        }
    }

    #[test]
    fn latest_tag_warns_untagged_errors() {
        let issues = check_container(&container("c1", "nginx:latest"));
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Warn && i.message.contains("latest")));

        let issues = check_container(&container("c1", "nginx"));
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message.contains("Untagged")));

        // Registry port colon is not a tag separator.
        let issues = check_container(&container("c1", "registry:5000/nginx"));
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message.contains("Untagged")));
    }

    #[test]
    fn bare_container_yields_three_warns() {
        // No probes, no resources: probes (x2) plus resources (x1).
        let issues = check_container(&container("c1", "nginx:1.27"));
        let warns = issues
            .iter()
            .filter(|i| i.severity == Severity::Info || i.severity == Severity::Warn)
            .count();
        assert_eq!(warns, 3);
        assert!(!issues.iter().any(|i| i.severity == Severity::Error));
    }

    #[test]
    fn requests_without_limits_warn() {
        let mut c = container("c1", "nginx:1.27");
        c.resources = Some(ResourceRequirements {
            requests: Some(resources(Some("100m"), Some("128Mi"))),
            ..Default::default()
        });
        let issues = check_container(&c);
        assert!(issues.iter().any(|i| i.message == "No resource limits defined"));

        // Limits only is acceptable.
        let mut c = container("c1", "nginx:1.27");
        c.resources = Some(ResourceRequirements {
            limits: Some(resources(Some("100m"), Some("128Mi"))),
            ..Default::default()
        });
        let issues = check_container(&c);
        assert!(!issues.iter().any(|i| i.message.contains("resource")));
    }

    #[test]
    fn unnamed_port_warns_unless_probed_numerically() {
        let mut c = container("c1", "nginx:1.27");
        c.ports = Some(vec![ContainerPort {
            container_port: 8080,
            ..Default::default()
        }]);
        let issues = check_container(&c);
        assert!(issues.iter().any(|i| i.message == "Unnamed port 8080"));

        c.liveness_probe = Some(Probe {
            http_get: Some(HTTPGetAction {
                port: IntOrString::Int(8080),
                ..Default::default()
            }),
            ..Default::default()
        });
        let issues = check_container(&c);
        assert!(!issues.iter().any(|i| i.message.starts_with("Unnamed port")));
    }

    #[test]
    fn utilization_flags_cpu_over_limit() {
        let mut c = container("c1", "nginx:1.27");
        c.resources = Some(ResourceRequirements {
            limits: Some(resources(Some("100m"), Some("128Mi"))),
            ..Default::default()
        });
        let metrics = ContainerMetrics {
            name: "c1".to_string(),
            cpu_millis: 95,
            mem_bytes: 10 * 1024 * 1024,
        };
        let issues = check_utilization(&c, Some(&metrics), &ScanConfig::default());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("CPU"));

        // No metrics, no issue.
        assert!(check_utilization(&c, None, &ScanConfig::default()).is_empty());
    }

    #[test]
    fn status_machine_waiting_is_an_error() {
        let mut waiting = status("c1", false, 0);
        waiting.state = Some(ContainerState {
            waiting: Some(ContainerStateWaiting {
                reason: Some("CrashLoopBackOff".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let counts = tally_statuses(&[status("c0", true, 0), waiting]);
        let issue = diagnose_statuses(&counts, false, 3).unwrap();
        assert_eq!(issue.severity, Severity::Error);
        assert!(issue.message.contains("Pod is waiting [1/2]"));
        assert!(issue.message.contains("CrashLoopBackOff"));
    }

    #[test]
    fn status_machine_not_ready_and_restarts() {
        let counts = tally_statuses(&[status("c1", false, 0)]);
        let issue = diagnose_statuses(&counts, false, 3).unwrap();
        assert_eq!(issue.severity, Severity::Error);
        assert_eq!(issue.message, "Pod is not ready");

        let counts = tally_statuses(&[status("c1", true, 5)]);
        let issue = diagnose_statuses(&counts, false, 3).unwrap();
        assert_eq!(issue.severity, Severity::Warn);
        assert!(issue.message.contains("restarted (5)"));

        let counts = tally_statuses(&[status("c1", true, 3)]);
        assert!(diagnose_statuses(&counts, false, 3).is_none());
    }

    #[test]
    fn status_machine_terminated() {
        let mut terminated = status("c1", false, 0);
        terminated.state = Some(ContainerState {
            terminated: Some(Default::default()),
            ..Default::default()
        });

        // Fully gone: not actionable.
        let counts = tally_statuses(&[terminated.clone()]);
        assert!(diagnose_statuses(&counts, false, 3).is_none());

        // Partially terminated while others are ready: terminating.
        let counts = tally_statuses(&[status("c0", true, 0), terminated.clone()]);
        let issue = diagnose_statuses(&counts, false, 3).unwrap();
        assert_eq!(issue.severity, Severity::Warn);
        assert!(issue.message.contains("terminating"));

        // Init containers terminate by design.
        let counts = tally_statuses(&[status("c0", true, 0), terminated]);
        assert!(diagnose_statuses(&counts, true, 3).is_none());
    }
}
