//! ServiceAccount sanitizer: RBAC-bound accounts no pod uses.

use crate::config::ScanConfig;
use crate::issues::{Issue, Outcome, Severity};
use crate::issues::ResourceId;
use crate::linters::meta_id;
use k8s_openapi::api::core::v1::{Pod, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding, Subject};
use std::collections::{BTreeMap, BTreeSet};

/// Lint service accounts against RBAC bindings and actual pod usage.
///
/// An account a binding grants rights to but no pod runs as is an
/// over-provisioned credential and flagged at Error.
pub fn lint(
    service_accounts: &[ServiceAccount],
    pods: &[Pod],
    role_bindings: &[RoleBinding],
    cluster_role_bindings: &[ClusterRoleBinding],
    config: &ScanConfig,
) -> Outcome {
    let mut outcome = Outcome::new();
    for sa in service_accounts {
        outcome.ensure(meta_id(&sa.metadata));
    }

    let used = used_accounts(pods);
    for (id, binding) in bound_accounts(role_bindings, cluster_role_bindings, config) {
        if !used.contains(&id) {
            outcome.push(
                id,
                Issue::new(
                    Severity::Error,
                    format!("Used? referenced by binding `{}`", binding),
                ),
            );
        }
    }
    outcome
}

/// Accounts pods actually run as, namespace-qualified.
fn used_accounts(pods: &[Pod]) -> BTreeSet<ResourceId> {
    let mut used = BTreeSet::new();
    for pod in pods {
        let Some(ns) = pod.metadata.namespace.as_deref() else {
            continue;
        };
        let name = pod
            .spec
            .as_ref()
            .and_then(|s| s.service_account_name.as_deref())
            .filter(|n| !n.is_empty())
            .unwrap_or("default");
        used.insert(ResourceId::namespaced(ns, name));
    }
    used
}

/// Accounts granted rights through bindings, mapped to the first
/// binding naming them. Subjects in system namespaces are skipped.
fn bound_accounts(
    role_bindings: &[RoleBinding],
    cluster_role_bindings: &[ClusterRoleBinding],
    config: &ScanConfig,
) -> BTreeMap<ResourceId, String> {
    let mut bound = BTreeMap::new();

    let subjects = role_bindings
        .iter()
        .flat_map(|rb| {
            let name = rb.metadata.name.clone().unwrap_or_default();
            let ns = rb.metadata.namespace.clone();
            rb.subjects
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(move |s| (s, ns.clone(), name.clone()))
        })
        .chain(cluster_role_bindings.iter().flat_map(|crb| {
            let name = crb.metadata.name.clone().unwrap_or_default();
            crb.subjects
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(move |s| (s, None, name.clone()))
        }));

    for (subject, binding_ns, binding) in subjects {
        let Some(id) = subject_id(subject, binding_ns.as_deref()) else {
            continue;
        };
        if id
            .namespace
            .as_deref()
            .is_some_and(|ns| config.system_namespace(ns))
        {
            continue;
        }
        bound.entry(id).or_insert(binding);
    }
    bound
}

fn subject_id(subject: &Subject, binding_ns: Option<&str>) -> Option<ResourceId> {
    if subject.kind != "ServiceAccount" {
        return None;
    }
    let ns = subject.namespace.as_deref().or(binding_ns)?;
    Some(ResourceId::namespaced(ns, &subject.name))
}
