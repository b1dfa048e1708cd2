//! Service sanitizer: selector resolution, port wiring, and endpoints.

use crate::issues::{Issue, Outcome, ResourceId, Severity};
use crate::labels;
use crate::linters::meta_id;
use k8s_openapi::api::core::v1::{Container, Endpoints, Pod, Service, ServicePort};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// Lint every in-scope service against the pod set and the cluster's
/// Endpoints objects.
pub fn lint(
    services: &[Service],
    pods: &[Pod],
    endpoints: &BTreeMap<ResourceId, Endpoints>,
) -> Outcome {
    let mut outcome = Outcome::new();
    for service in services {
        let id = meta_id(&service.metadata);
        outcome.ensure(id.clone());

        let spec = match &service.spec {
            Some(spec) => spec,
            None => continue,
        };

        if spec.type_.as_deref() == Some("LoadBalancer") {
            outcome.push(
                id.clone(),
                Issue::new(
                    Severity::Info,
                    "Type Loadbalancer detected. Could be expensive",
                ),
            );
        }

        let selector = match spec.selector.as_ref().filter(|s| !s.is_empty()) {
            Some(selector) => selector,
            // Selector-less services (e.g. ExternalName) wire their own
            // endpoints; nothing to resolve.
            None => continue,
        };

        let pod = pods
            .iter()
            .find(|pod| labels::matches_labels(selector, pod.metadata.labels.as_ref()));
        match pod {
            None => {
                outcome.push(
                    id.clone(),
                    Issue::new(Severity::Error, "No pods match service selector"),
                );
            }
            Some(pod) => {
                for port in spec.ports.as_deref().unwrap_or_default() {
                    if let Some(issue) = check_port(port, pod) {
                        outcome.push(id.clone(), issue);
                    }
                }
            }
        }

        let has_subsets = endpoints
            .get(&id)
            .and_then(|ep| ep.subsets.as_ref())
            .is_some_and(|subsets| !subsets.is_empty());
        if !has_subsets {
            outcome.push(
                id.clone(),
                Issue::new(Severity::Error, "No associated endpoints"),
            );
        }
    }
    outcome
}

/// Match one declared service port against the resolved pod's container
/// ports. A missing match is an error; a match on a different protocol
/// is a wiring bug.
fn check_port(port: &ServicePort, pod: &Pod) -> Option<Issue> {
    let spec = pod.spec.as_ref()?;
    // targetPort defaults to the service port number.
    let target = port
        .target_port
        .clone()
        .unwrap_or(IntOrString::Int(port.port));

    let matched = spec
        .containers
        .iter()
        .find_map(|container| container_port(container, &target));

    let Some(container_protocol) = matched else {
        return Some(Issue::new(
            Severity::Error,
            format!("No container port matches service port {}", port.port),
        ));
    };

    let service_protocol = port.protocol.as_deref().unwrap_or("TCP");
    if container_protocol != service_protocol {
        return Some(Issue::new(
            Severity::Error,
            format!(
                "Port {} protocol mismatch: service says {} but container exposes {}",
                port.port, service_protocol, container_protocol
            ),
        ));
    }
    None
}

/// Protocol of the container port matching `target`, if any.
fn container_port(container: &Container, target: &IntOrString) -> Option<String> {
    for port in container.ports.as_deref().unwrap_or_default() {
        let hit = match target {
            IntOrString::Int(n) => port.container_port == *n,
            IntOrString::String(name) => port.name.as_deref() == Some(name),
        };
        if hit {
            return Some(port.protocol.clone().unwrap_or_else(|| "TCP".to_string()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linters::fixtures::{container, labeled_meta, meta};
    use k8s_openapi::api::core::v1::{ContainerPort, EndpointSubset, PodSpec, ServiceSpec};

    fn web_pod() -> Pod {
        let mut c = container("c1", "nginx:1.27");
        c.ports = Some(vec![ContainerPort {
            container_port: 8080,
            name: Some("http".to_string()),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]);
        Pod {
            metadata: labeled_meta("default", "web-1", &[("app", "web")]),
            spec: Some(PodSpec {
                containers: vec![c],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn web_service(ports: Vec<ServicePort>) -> Service {
        Service {
            metadata: meta("default", "web"),
            spec: Some(ServiceSpec {
                selector: Some([("app".to_string(), "web".to_string())].into()),
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn live_endpoints() -> BTreeMap<ResourceId, Endpoints> {
        let mut map = BTreeMap::new();
        map.insert(
            ResourceId::namespaced("default", "web"),
            Endpoints {
                metadata: meta("default", "web"),
                subsets: Some(vec![EndpointSubset::default()]),
            },
        );
        map
    }

    #[test]
    fn healthy_service_is_clean() {
        let svc = web_service(vec![ServicePort {
            port: 80,
            target_port: Some(IntOrString::String("http".to_string())),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]);
        let outcome = lint(&[svc], &[web_pod()], &live_endpoints());
        assert!(outcome
            .get(&ResourceId::namespaced("default", "web"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn selector_without_pods_is_an_error() {
        let svc = web_service(vec![]);
        let outcome = lint(&[svc], &[], &live_endpoints());
        let issues = outcome
            .get(&ResourceId::namespaced("default", "web"))
            .unwrap();
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message == "No pods match service selector"));
    }

    #[test]
    fn protocol_mismatch_is_an_error() {
        let svc = web_service(vec![ServicePort {
            port: 80,
            target_port: Some(IntOrString::Int(8080)),
            protocol: Some("UDP".to_string()),
            ..Default::default()
        }]);
        let outcome = lint(&[svc], &[web_pod()], &live_endpoints());
        let issues = outcome
            .get(&ResourceId::namespaced("default", "web"))
            .unwrap();
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message.contains("protocol mismatch")));
    }

    #[test]
    fn unmatched_target_port_is_an_error() {
        let svc = web_service(vec![ServicePort {
            port: 9999,
            ..Default::default()
        }]);
        let outcome = lint(&[svc], &[web_pod()], &live_endpoints());
        let issues = outcome
            .get(&ResourceId::namespaced("default", "web"))
            .unwrap();
        assert!(issues
            .iter()
            .any(|i| i.message == "No container port matches service port 9999"));
    }

    #[test]
    fn missing_endpoints_is_an_error() {
        let svc = web_service(vec![]);
        let outcome = lint(&[svc], &[web_pod()], &BTreeMap::new());
        let issues = outcome
            .get(&ResourceId::namespaced("default", "web"))
            .unwrap();
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message == "No associated endpoints"));
    }

    #[test]
    fn load_balancer_is_informational() {
        let mut svc = web_service(vec![]);
        svc.spec.as_mut().unwrap().type_ = Some("LoadBalancer".to_string());
        let outcome = lint(&[svc], &[web_pod()], &live_endpoints());
        let issues = outcome
            .get(&ResourceId::namespaced("default", "web"))
            .unwrap();
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Info && i.message.contains("Loadbalancer")));
    }
}
