//! Filtered, configuration-aware views over a `Fetcher`.
//!
//! Linters never see resources from excluded namespaces or nodes; the
//! `Lister` applies those filters once, on top of the fetcher's memoized
//! raw lists, and carries the thresholds each linter needs.

use super::{FetchError, Fetcher, NodeMetrics, PodMetrics};
use crate::config::{AllocationLimits, ScanConfig};
use crate::issues::ResourceId;
use crate::labels;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod, Secret,
    Service, ServiceAccount,
};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding};
use std::collections::BTreeMap;

/// Namespace- and exclusion-aware resource views plus configuration
/// accessors, built atop a raw `Fetcher`.
pub struct Lister<F> {
    fetcher: F,
    config: ScanConfig,
}

impl<F: Fetcher> Lister<F> {
    /// Wrap a fetcher with a scan configuration.
    pub fn new(fetcher: F, config: ScanConfig) -> Self {
        Self { fetcher, config }
    }

    /// Cluster identity for report filenames.
    pub fn cluster(&self) -> &str {
        self.fetcher.cluster()
    }

    /// The injected scan configuration.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    fn in_scope(&self, namespace: Option<&str>) -> bool {
        match namespace {
            Some(ns) => !self.config.excluded_ns(ns),
            None => true,
        }
    }

    fn filter_namespaced<T: Clone>(&self, items: &[T], namespace_of: impl Fn(&T) -> Option<&str>) -> Vec<T> {
        items
            .iter()
            .filter(|item| self.in_scope(namespace_of(item)))
            .cloned()
            .collect()
    }

    /// Namespaces in scope for this scan.
    pub async fn list_namespaces(&self) -> Result<Vec<Namespace>, FetchError> {
        let all = self.fetcher.namespaces().await?;
        Ok(all
            .iter()
            .filter(|ns| {
                ns.metadata
                    .name
                    .as_deref()
                    .is_some_and(|name| !self.config.excluded_ns(name))
            })
            .cloned()
            .collect())
    }

    /// Nodes not excluded by configuration.
    pub async fn list_nodes(&self) -> Result<Vec<Node>, FetchError> {
        let all = self.fetcher.nodes().await?;
        Ok(all
            .iter()
            .filter(|node| {
                node.metadata
                    .name
                    .as_deref()
                    .is_some_and(|name| !self.config.excluded_node(name))
            })
            .cloned()
            .collect())
    }

    /// Pods in scope for this scan.
    pub async fn list_pods(&self) -> Result<Vec<Pod>, FetchError> {
        let all = self.fetcher.pods().await?;
        Ok(self.filter_namespaced(all, |p| p.metadata.namespace.as_deref()))
    }

    /// Every pod in the cluster, ignoring namespace scoping. The node
    /// sanitizer needs the full set to assess taint coverage, and the
    /// reference index needs it to see cross-namespace consumers.
    pub async fn list_all_pods(&self) -> Result<Vec<Pod>, FetchError> {
        Ok(self.fetcher.pods().await?.to_vec())
    }

    /// Services in scope, minus the configured skip-list.
    pub async fn list_services(&self) -> Result<Vec<Service>, FetchError> {
        let all = self.fetcher.services().await?;
        Ok(all
            .iter()
            .filter(|svc| {
                let ns = svc.metadata.namespace.as_deref();
                let name = svc.metadata.name.as_deref().unwrap_or_default();
                let fqn = match ns {
                    Some(ns) => format!("{}/{}", ns, name),
                    None => name.to_string(),
                };
                self.in_scope(ns) && !self.config.excluded_service(&fqn)
            })
            .cloned()
            .collect())
    }

    /// Endpoints objects keyed by `namespace/name`.
    pub async fn endpoints_by_id(&self) -> Result<BTreeMap<ResourceId, Endpoints>, FetchError> {
        let all = self.fetcher.endpoints().await?;
        Ok(all
            .iter()
            .filter_map(|ep| {
                let ns = ep.metadata.namespace.as_deref()?;
                let name = ep.metadata.name.as_deref()?;
                Some((ResourceId::namespaced(ns, name), ep.clone()))
            })
            .collect())
    }

    /// ConfigMaps in scope.
    pub async fn list_config_maps(&self) -> Result<Vec<ConfigMap>, FetchError> {
        let all = self.fetcher.config_maps().await?;
        Ok(self.filter_namespaced(all, |cm| cm.metadata.namespace.as_deref()))
    }

    /// Secrets in scope.
    pub async fn list_secrets(&self) -> Result<Vec<Secret>, FetchError> {
        let all = self.fetcher.secrets().await?;
        Ok(self.filter_namespaced(all, |s| s.metadata.namespace.as_deref()))
    }

    /// ServiceAccounts in scope.
    pub async fn list_service_accounts(&self) -> Result<Vec<ServiceAccount>, FetchError> {
        let all = self.fetcher.service_accounts().await?;
        Ok(self.filter_namespaced(all, |sa| sa.metadata.namespace.as_deref()))
    }

    /// PersistentVolumes (cluster-scoped, unfiltered).
    pub async fn list_persistent_volumes(&self) -> Result<Vec<PersistentVolume>, FetchError> {
        Ok(self.fetcher.persistent_volumes().await?.to_vec())
    }

    /// PersistentVolumeClaims in scope.
    pub async fn list_persistent_volume_claims(
        &self,
    ) -> Result<Vec<PersistentVolumeClaim>, FetchError> {
        let all = self.fetcher.persistent_volume_claims().await?;
        Ok(self.filter_namespaced(all, |pvc| pvc.metadata.namespace.as_deref()))
    }

    /// Deployments in scope.
    pub async fn list_deployments(&self) -> Result<Vec<Deployment>, FetchError> {
        let all = self.fetcher.deployments().await?;
        Ok(self.filter_namespaced(all, |d| d.metadata.namespace.as_deref()))
    }

    /// StatefulSets in scope.
    pub async fn list_stateful_sets(&self) -> Result<Vec<StatefulSet>, FetchError> {
        let all = self.fetcher.stateful_sets().await?;
        Ok(self.filter_namespaced(all, |sts| sts.metadata.namespace.as_deref()))
    }

    /// HorizontalPodAutoscalers in scope.
    pub async fn list_horizontal_pod_autoscalers(
        &self,
    ) -> Result<Vec<HorizontalPodAutoscaler>, FetchError> {
        let all = self.fetcher.horizontal_pod_autoscalers().await?;
        Ok(self.filter_namespaced(all, |hpa| hpa.metadata.namespace.as_deref()))
    }

    /// RoleBindings in scope.
    pub async fn list_role_bindings(&self) -> Result<Vec<RoleBinding>, FetchError> {
        let all = self.fetcher.role_bindings().await?;
        Ok(self.filter_namespaced(all, |rb| rb.metadata.namespace.as_deref()))
    }

    /// ClusterRoleBindings (cluster-scoped, unfiltered).
    pub async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>, FetchError> {
        Ok(self.fetcher.cluster_role_bindings().await?.to_vec())
    }

    /// Pods in scope matching a plain equality selector.
    pub async fn list_pods_by_labels(
        &self,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>, FetchError> {
        let pods = self.list_pods().await?;
        Ok(pods
            .into_iter()
            .filter(|pod| labels::matches_labels(selector, pod.metadata.labels.as_ref()))
            .collect())
    }

    /// First in-scope pod matching a plain equality selector.
    pub async fn get_pod(
        &self,
        selector: &BTreeMap<String, String>,
    ) -> Result<Option<Pod>, FetchError> {
        Ok(self.list_pods_by_labels(selector).await?.into_iter().next())
    }

    /// Whether the cluster serves metrics at all.
    pub async fn cluster_has_metrics(&self) -> bool {
        self.fetcher.cluster_has_metrics().await
    }

    /// Pod usage keyed by pod identity.
    pub async fn pod_metrics(&self) -> Result<BTreeMap<ResourceId, PodMetrics>, FetchError> {
        let all = self.fetcher.pod_metrics().await?;
        Ok(all
            .iter()
            .map(|pm| (ResourceId::namespaced(&pm.namespace, &pm.name), pm.clone()))
            .collect())
    }

    /// Node usage keyed by node name.
    pub async fn node_metrics(&self) -> Result<BTreeMap<String, NodeMetrics>, FetchError> {
        let all = self.fetcher.node_metrics().await?;
        Ok(all
            .iter()
            .map(|nm| (nm.name.clone(), nm.clone()))
            .collect())
    }

    /// Per-container CPU threshold (percent of limit).
    pub fn pod_cpu_limit(&self) -> u32 {
        self.config.pod_cpu_limit
    }

    /// Per-container memory threshold (percent of limit).
    pub fn pod_mem_limit(&self) -> u32 {
        self.config.pod_mem_limit
    }

    /// Node CPU threshold (percent of allocatable).
    pub fn node_cpu_limit(&self) -> u32 {
        self.config.node_cpu_limit
    }

    /// Node memory threshold (percent of allocatable).
    pub fn node_mem_limit(&self) -> u32 {
        self.config.node_mem_limit
    }

    /// Tolerated container restarts.
    pub fn restarts_limit(&self) -> i32 {
        self.config.restarts_limit
    }

    /// Workload CPU allocation thresholds.
    pub fn cpu_resource_limits(&self) -> AllocationLimits {
        self.config.cpu_allocation_limits
    }

    /// Workload memory allocation thresholds.
    pub fn mem_resource_limits(&self) -> AllocationLimits {
        self.config.mem_allocation_limits
    }
}
