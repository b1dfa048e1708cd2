//! Scan orchestration.
//!
//! The scanner walks every section in a fixed order, hands each linter
//! its pre-filtered inputs through the `Lister`, and rolls the outcomes
//! into a `Report`. A fetch failure sinks only the section that needed
//! the data; the rest of the scan proceeds and the failure is recorded
//! on the report.

use crate::client::quantity::{quantity_cpu, quantity_mem};
use crate::client::{FetchError, Fetcher, Lister};
use crate::issues::Outcome;
use crate::linters;
use crate::refs::References;
use crate::tally::{Report, Section};
use k8s_openapi::api::core::v1::{Node, Pod};

/// Scanned resource kinds, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Namespaces,
    Nodes,
    Pods,
    Services,
    Deployments,
    StatefulSets,
    PersistentVolumes,
    PersistentVolumeClaims,
    ServiceAccounts,
    ConfigMaps,
    Secrets,
    HorizontalPodAutoscalers,
}

impl SectionKind {
    /// Every section, in report order.
    pub fn all() -> [SectionKind; 12] {
        [
            Self::Namespaces,
            Self::Nodes,
            Self::Pods,
            Self::Services,
            Self::Deployments,
            Self::StatefulSets,
            Self::PersistentVolumes,
            Self::PersistentVolumeClaims,
            Self::ServiceAccounts,
            Self::ConfigMaps,
            Self::Secrets,
            Self::HorizontalPodAutoscalers,
        ]
    }

    /// Section title used in reports and diffs.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Namespaces => "namespaces",
            Self::Nodes => "nodes",
            Self::Pods => "pods",
            Self::Services => "services",
            Self::Deployments => "deployments",
            Self::StatefulSets => "statefulsets",
            Self::PersistentVolumes => "persistentvolumes",
            Self::PersistentVolumeClaims => "persistentvolumeclaims",
            Self::ServiceAccounts => "serviceaccounts",
            Self::ConfigMaps => "configmaps",
            Self::Secrets => "secrets",
            Self::HorizontalPodAutoscalers => "horizontalpodautoscalers",
        }
    }
}

/// Drives a full scan over one cluster connection.
pub struct Scanner<F> {
    lister: Lister<F>,
}

impl<F: Fetcher> Scanner<F> {
    /// Build a scanner over a configured lister.
    pub fn new(lister: Lister<F>) -> Self {
        Self { lister }
    }

    /// Run every section and assemble the report.
    pub async fn scan(&self) -> Report {
        let mut sections = Vec::new();
        let mut errors = Vec::new();

        for kind in SectionKind::all() {
            match self.run_section(kind).await {
                Ok(outcome) => sections.push(Section::new(kind.title(), outcome)),
                Err(e) => {
                    log::warn!("Section {} failed: {}", kind.title(), e);
                    errors.push(format!("{}: {}", kind.title(), e));
                    sections.push(Section::new(kind.title(), Outcome::new()));
                }
            }
        }

        Report::new(self.lister.cluster(), sections, errors)
    }

    async fn run_section(&self, kind: SectionKind) -> Result<Outcome, FetchError> {
        let lister = &self.lister;
        let config = lister.config();

        let outcome = match kind {
            SectionKind::Namespaces => linters::namespace::lint(
                &lister.list_namespaces().await?,
                &lister.list_all_pods().await?,
                config,
            ),
            SectionKind::Nodes => linters::node::lint(
                &lister.list_nodes().await?,
                &lister.list_all_pods().await?,
                &lister.node_metrics().await?,
                config,
            ),
            SectionKind::Pods => linters::pod::lint(
                &lister.list_pods().await?,
                &lister.pod_metrics().await?,
                config,
            ),
            SectionKind::Services => linters::service::lint(
                &lister.list_services().await?,
                &lister.list_pods().await?,
                &lister.endpoints_by_id().await?,
            ),
            SectionKind::Deployments => linters::deployment::lint(
                &lister.list_deployments().await?,
                &lister.list_pods().await?,
                &lister.pod_metrics().await?,
                config,
            ),
            SectionKind::StatefulSets => linters::statefulset::lint(
                &lister.list_stateful_sets().await?,
                &lister.list_pods().await?,
                &lister.pod_metrics().await?,
                config,
            ),
            SectionKind::PersistentVolumes => {
                linters::pv::lint(&lister.list_persistent_volumes().await?)
            }
            SectionKind::PersistentVolumeClaims => linters::pvc::lint(
                &lister.list_persistent_volume_claims().await?,
                &lister.list_pods().await?,
            ),
            SectionKind::ServiceAccounts => linters::serviceaccount::lint(
                &lister.list_service_accounts().await?,
                &lister.list_all_pods().await?,
                &lister.list_role_bindings().await?,
                &lister.list_cluster_role_bindings().await?,
                config,
            ),
            SectionKind::ConfigMaps => {
                let references = self.references().await?;
                linters::configmap::lint(&lister.list_config_maps().await?, &references)
            }
            SectionKind::Secrets => {
                let references = self.references().await?;
                linters::secret::lint(&lister.list_secrets().await?, &references)
            }
            SectionKind::HorizontalPodAutoscalers => {
                let (cpu, mem) = self.available_capacity().await?;
                linters::hpa::lint(
                    &lister.list_horizontal_pod_autoscalers().await?,
                    &lister.list_deployments().await?,
                    &lister.list_stateful_sets().await?,
                    cpu,
                    mem,
                )
            }
        };
        Ok(outcome)
    }

    /// The cross-namespace reference index. Built from the full pod set
    /// so consumers outside the scan scope still count as usage.
    async fn references(&self) -> Result<References, FetchError> {
        Ok(References::build(
            &self.lister.list_all_pods().await?,
            &self.lister.list_service_accounts().await?,
        ))
    }

    /// Cluster capacity still available for burst scale-out: total
    /// allocatable across nodes minus what running pods already request.
    async fn available_capacity(&self) -> Result<(u64, u64), FetchError> {
        let (cap_cpu, cap_mem) = allocatable(&self.lister.list_nodes().await?);
        let (req_cpu, req_mem) = requested(&self.lister.list_all_pods().await?);
        Ok((cap_cpu.saturating_sub(req_cpu), cap_mem.saturating_sub(req_mem)))
    }
}

fn allocatable(nodes: &[Node]) -> (u64, u64) {
    let mut cpu = 0;
    let mut mem = 0;
    for node in nodes {
        let Some(alloc) = node.status.as_ref().and_then(|s| s.allocatable.as_ref()) else {
            continue;
        };
        if let Some(q) = alloc.get("cpu") {
            cpu += quantity_cpu(q);
        }
        if let Some(q) = alloc.get("memory") {
            mem += quantity_mem(q);
        }
    }
    (cpu, mem)
}

fn requested(pods: &[Pod]) -> (u64, u64) {
    let mut cpu = 0;
    let mut mem = 0;
    for pod in pods {
        if let Some(spec) = &pod.spec {
            let (c, m) = linters::pod_requests(spec);
            cpu += c;
            mem += m;
        }
    }
    (cpu, mem)
}
