//! Live cluster fetcher backed by the Kubernetes API.
//!
//! Each resource kind is listed at most once per scan: list results land
//! in per-kind `OnceCell` caches, so repeated accessor calls are
//! idempotent. Metrics come from `metrics.k8s.io` via raw API requests,
//! since the metrics API is not part of the core OpenAPI surface.
//!
//! # Prerequisites
//!
//! - A valid kubeconfig (default context or one picked with
//!   `with_context`)
//! - RBAC read permissions for the scanned kinds
//! - metrics-server, optionally; its absence degrades utilization
//!   checks instead of failing the scan

use super::quantity;
use super::{ContainerMetrics, FetchError, Fetcher, NodeMetrics, PodMetrics};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod, Secret,
    Service, ServiceAccount,
};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding};
use kube::api::{Api, ListParams};
use kube::{Client, Config};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt::Debug;
use tokio::sync::OnceCell;

/// Live `Fetcher` over one cluster connection.
pub struct KubeFetcher {
    client: Client,
    cluster: String,

    namespaces: OnceCell<Vec<Namespace>>,
    nodes: OnceCell<Vec<Node>>,
    pods: OnceCell<Vec<Pod>>,
    services: OnceCell<Vec<Service>>,
    endpoints: OnceCell<Vec<Endpoints>>,
    config_maps: OnceCell<Vec<ConfigMap>>,
    secrets: OnceCell<Vec<Secret>>,
    service_accounts: OnceCell<Vec<ServiceAccount>>,
    persistent_volumes: OnceCell<Vec<PersistentVolume>>,
    persistent_volume_claims: OnceCell<Vec<PersistentVolumeClaim>>,
    deployments: OnceCell<Vec<Deployment>>,
    stateful_sets: OnceCell<Vec<StatefulSet>>,
    hpas: OnceCell<Vec<HorizontalPodAutoscaler>>,
    role_bindings: OnceCell<Vec<RoleBinding>>,
    cluster_role_bindings: OnceCell<Vec<ClusterRoleBinding>>,

    has_metrics: OnceCell<bool>,
    pod_metrics: OnceCell<Vec<PodMetrics>>,
    node_metrics: OnceCell<Vec<NodeMetrics>>,
}

impl KubeFetcher {
    /// Connect using the default kubeconfig context.
    pub async fn new() -> Result<Self, FetchError> {
        let config = Config::infer().await?;
        let cluster = config.cluster_url.host().unwrap_or("cluster").to_string();
        let client = Client::try_from(config)?;
        Ok(Self::with_client(client, cluster))
    }

    /// Connect using a specific kubeconfig context.
    pub async fn with_context(context: &str) -> Result<Self, FetchError> {
        let kubeconfig = kube::config::Kubeconfig::read()?;
        let config = Config::from_custom_kubeconfig(
            kubeconfig,
            &kube::config::KubeConfigOptions {
                context: Some(context.to_string()),
                ..Default::default()
            },
        )
        .await?;
        let client = Client::try_from(config)?;
        Ok(Self::with_client(client, context.to_string()))
    }

    /// Name of the current kubeconfig context, if any.
    pub fn current_context() -> Result<String, FetchError> {
        let kubeconfig = kube::config::Kubeconfig::read()?;
        Ok(kubeconfig
            .current_context
            .unwrap_or_else(|| "default".to_string()))
    }

    fn with_client(client: Client, cluster: String) -> Self {
        Self {
            client,
            cluster,
            namespaces: OnceCell::new(),
            nodes: OnceCell::new(),
            pods: OnceCell::new(),
            services: OnceCell::new(),
            endpoints: OnceCell::new(),
            config_maps: OnceCell::new(),
            secrets: OnceCell::new(),
            service_accounts: OnceCell::new(),
            persistent_volumes: OnceCell::new(),
            persistent_volume_claims: OnceCell::new(),
            deployments: OnceCell::new(),
            stateful_sets: OnceCell::new(),
            hpas: OnceCell::new(),
            role_bindings: OnceCell::new(),
            cluster_role_bindings: OnceCell::new(),
            has_metrics: OnceCell::new(),
            pod_metrics: OnceCell::new(),
            node_metrics: OnceCell::new(),
        }
    }

    /// List a kind cluster-wide, memoizing the result.
    async fn list_cached<'a, K>(
        &self,
        cell: &'a OnceCell<Vec<K>>,
    ) -> Result<&'a [K], FetchError>
    where
        K: kube::Resource + Clone + DeserializeOwned + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let items = cell
            .get_or_try_init(|| async {
                let api: Api<K> = Api::all(self.client.clone());
                log::debug!("Listing {}", K::kind(&Default::default()));
                api.list(&ListParams::default())
                    .await
                    .map(|list| list.items)
                    .map_err(|e| {
                        FetchError::Api(format!(
                            "Failed to list {}: {}",
                            K::kind(&Default::default()),
                            e
                        ))
                    })
            })
            .await?;
        Ok(items.as_slice())
    }

    async fn raw_get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let request = http::Request::builder()
            .method("GET")
            .uri(path)
            .body(Vec::new())
            .map_err(|e| FetchError::Api(format!("Failed to build request: {}", e)))?;

        self.client.request::<T>(request).await.map_err(|e| {
            let msg = e.to_string();
            if msg.contains("404") || msg.contains("not found") {
                FetchError::MetricsUnavailable
            } else {
                FetchError::Api(format!("Metrics API error: {}", msg))
            }
        })
    }
}

impl Fetcher for KubeFetcher {
    fn cluster(&self) -> &str {
        &self.cluster
    }

    async fn namespaces(&self) -> Result<&[Namespace], FetchError> {
        self.list_cached(&self.namespaces).await
    }

    async fn nodes(&self) -> Result<&[Node], FetchError> {
        self.list_cached(&self.nodes).await
    }

    async fn pods(&self) -> Result<&[Pod], FetchError> {
        self.list_cached(&self.pods).await
    }

    async fn services(&self) -> Result<&[Service], FetchError> {
        self.list_cached(&self.services).await
    }

    async fn endpoints(&self) -> Result<&[Endpoints], FetchError> {
        self.list_cached(&self.endpoints).await
    }

    async fn config_maps(&self) -> Result<&[ConfigMap], FetchError> {
        self.list_cached(&self.config_maps).await
    }

    async fn secrets(&self) -> Result<&[Secret], FetchError> {
        self.list_cached(&self.secrets).await
    }

    async fn service_accounts(&self) -> Result<&[ServiceAccount], FetchError> {
        self.list_cached(&self.service_accounts).await
    }

    async fn persistent_volumes(&self) -> Result<&[PersistentVolume], FetchError> {
        self.list_cached(&self.persistent_volumes).await
    }

    async fn persistent_volume_claims(&self) -> Result<&[PersistentVolumeClaim], FetchError> {
        self.list_cached(&self.persistent_volume_claims).await
    }

    async fn deployments(&self) -> Result<&[Deployment], FetchError> {
        self.list_cached(&self.deployments).await
    }

    async fn stateful_sets(&self) -> Result<&[StatefulSet], FetchError> {
        self.list_cached(&self.stateful_sets).await
    }

    async fn horizontal_pod_autoscalers(&self) -> Result<&[HorizontalPodAutoscaler], FetchError> {
        self.list_cached(&self.hpas).await
    }

    async fn role_bindings(&self) -> Result<&[RoleBinding], FetchError> {
        self.list_cached(&self.role_bindings).await
    }

    async fn cluster_role_bindings(&self) -> Result<&[ClusterRoleBinding], FetchError> {
        self.list_cached(&self.cluster_role_bindings).await
    }

    async fn cluster_has_metrics(&self) -> bool {
        *self
            .has_metrics
            .get_or_init(|| async {
                self.raw_get::<serde_json::Value>("/apis/metrics.k8s.io/v1beta1")
                    .await
                    .is_ok()
            })
            .await
    }

    async fn pod_metrics(&self) -> Result<&[PodMetrics], FetchError> {
        let items = self
            .pod_metrics
            .get_or_try_init(|| async {
                if !self.cluster_has_metrics().await {
                    return Ok::<_, FetchError>(Vec::new());
                }
                let list: PodMetricsList =
                    self.raw_get("/apis/metrics.k8s.io/v1beta1/pods").await?;
                Ok(list
                    .items
                    .into_iter()
                    .map(|item| PodMetrics {
                        name: item.metadata.name,
                        namespace: item.metadata.namespace.unwrap_or_default(),
                        containers: item
                            .containers
                            .into_iter()
                            .map(|c| ContainerMetrics {
                                name: c.name,
                                cpu_millis: quantity::cpu_millis(&c.usage.cpu),
                                mem_bytes: quantity::mem_bytes(&c.usage.memory),
                            })
                            .collect(),
                    })
                    .collect())
            })
            .await?;
        Ok(items.as_slice())
    }

    async fn node_metrics(&self) -> Result<&[NodeMetrics], FetchError> {
        let items = self
            .node_metrics
            .get_or_try_init(|| async {
                if !self.cluster_has_metrics().await {
                    return Ok::<_, FetchError>(Vec::new());
                }
                let list: NodeMetricsList =
                    self.raw_get("/apis/metrics.k8s.io/v1beta1/nodes").await?;
                Ok(list
                    .items
                    .into_iter()
                    .map(|item| NodeMetrics {
                        name: item.metadata.name,
                        cpu_millis: quantity::cpu_millis(&item.usage.cpu),
                        mem_bytes: quantity::mem_bytes(&item.usage.memory),
                    })
                    .collect())
            })
            .await?;
        Ok(items.as_slice())
    }
}

// ----------------------------------------------------------------------
// Wire types for the metrics.k8s.io responses
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PodMetricsList {
    items: Vec<PodMetricsItem>,
}

#[derive(Debug, Deserialize)]
struct PodMetricsItem {
    metadata: MetricsMetadata,
    containers: Vec<ContainerMetricsItem>,
}

#[derive(Debug, Deserialize)]
struct NodeMetricsList {
    items: Vec<NodeMetricsItem>,
}

#[derive(Debug, Deserialize)]
struct NodeMetricsItem {
    metadata: MetricsMetadata,
    usage: ResourceUsage,
}

#[derive(Debug, Deserialize)]
struct MetricsMetadata {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContainerMetricsItem {
    name: String,
    usage: ResourceUsage,
}

#[derive(Debug, Deserialize)]
struct ResourceUsage {
    cpu: String,
    memory: String,
}
