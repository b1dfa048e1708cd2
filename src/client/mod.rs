//! Cluster access boundary.
//!
//! The scan core never talks to the Kubernetes API directly: it consumes
//! a `Fetcher` (raw, unfiltered list calls plus metrics probing) through
//! a `Lister` (namespace- and exclusion-aware views). The live
//! implementation is `KubeFetcher`; tests supply in-memory fixtures.

pub mod kube;
pub mod lister;
pub mod quantity;

pub use self::kube::KubeFetcher;
pub use self::lister::Lister;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod, Secret,
    Service, ServiceAccount,
};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding};
use serde::{Deserialize, Serialize};

/// Errors from the cluster transport.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to create Kubernetes client: {0}")]
    ClientCreation(#[from] ::kube::Error),

    #[error("Failed to infer Kubernetes config: {0}")]
    Config(#[from] ::kube::config::InferConfigError),

    #[error("Failed to read kubeconfig: {0}")]
    Kubeconfig(#[from] ::kube::config::KubeconfigError),

    #[error("Metrics server not available or not installed")]
    MetricsUnavailable,

    #[error("API request failed: {0}")]
    Api(String),
}

/// Observed usage for one container, parsed from the metrics API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerMetrics {
    /// Container name.
    pub name: String,
    /// CPU usage in millicores.
    pub cpu_millis: u64,
    /// Memory usage in bytes.
    pub mem_bytes: u64,
}

/// Observed usage for one pod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodMetrics {
    /// Pod name.
    pub name: String,
    /// Pod namespace.
    pub namespace: String,
    /// Per-container usage.
    pub containers: Vec<ContainerMetrics>,
}

impl PodMetrics {
    /// Usage for one container of this pod.
    pub fn container(&self, name: &str) -> Option<&ContainerMetrics> {
        self.containers.iter().find(|c| c.name == name)
    }
}

/// Observed usage for one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetrics {
    /// Node name.
    pub name: String,
    /// CPU usage in millicores.
    pub cpu_millis: u64,
    /// Memory usage in bytes.
    pub mem_bytes: u64,
}

/// Raw, unfiltered list/get access to one cluster.
///
/// Implementations must be idempotent and memoized per kind: the scan
/// calls overlapping accessors from several linters and expects one
/// underlying API call per kind per scan. No namespace or exclusion
/// filtering happens here; that is the `Lister`'s job.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    /// Cluster identity used in report filenames.
    fn cluster(&self) -> &str;

    async fn namespaces(&self) -> Result<&[Namespace], FetchError>;
    async fn nodes(&self) -> Result<&[Node], FetchError>;
    async fn pods(&self) -> Result<&[Pod], FetchError>;
    async fn services(&self) -> Result<&[Service], FetchError>;
    async fn endpoints(&self) -> Result<&[Endpoints], FetchError>;
    async fn config_maps(&self) -> Result<&[ConfigMap], FetchError>;
    async fn secrets(&self) -> Result<&[Secret], FetchError>;
    async fn service_accounts(&self) -> Result<&[ServiceAccount], FetchError>;
    async fn persistent_volumes(&self) -> Result<&[PersistentVolume], FetchError>;
    async fn persistent_volume_claims(&self) -> Result<&[PersistentVolumeClaim], FetchError>;
    async fn deployments(&self) -> Result<&[Deployment], FetchError>;
    async fn stateful_sets(&self) -> Result<&[StatefulSet], FetchError>;
    async fn horizontal_pod_autoscalers(&self) -> Result<&[HorizontalPodAutoscaler], FetchError>;
    async fn role_bindings(&self) -> Result<&[RoleBinding], FetchError>;
    async fn cluster_role_bindings(&self) -> Result<&[ClusterRoleBinding], FetchError>;

    /// Whether the cluster serves `metrics.k8s.io`.
    async fn cluster_has_metrics(&self) -> bool;

    /// Pod usage from the metrics server. Implementations should return
    /// an empty slice (not an error) when metrics are absent.
    async fn pod_metrics(&self) -> Result<&[PodMetrics], FetchError>;

    /// Node usage from the metrics server.
    async fn node_metrics(&self) -> Result<&[NodeMetrics], FetchError>;
}
