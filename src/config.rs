//! Scan configuration.
//!
//! All thresholds and exclusion lists live here and are injected into the
//! lister and linters; nothing in the scan core reads globals. The whole
//! struct deserializes from a YAML file so clusters can ship their own
//! tuning.

use crate::issues::Severity;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Two-sided thresholds for the workload allocation check, as
/// percentages of requested resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationLimits {
    /// Ratios strictly below this (and above zero) flag under-allocation.
    pub under_percent: u32,
    /// Ratios strictly above this flag over-allocation.
    pub over_percent: u32,
}

impl Default for AllocationLimits {
    fn default() -> Self {
        Self {
            under_percent: 50,
            over_percent: 100,
        }
    }
}

/// Configuration for one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    /// Restrict the scan to one namespace (`None` scans them all).
    #[serde(default)]
    pub namespace: Option<String>,

    /// Namespaces excluded from listing entirely.
    #[serde(default)]
    pub excluded_namespaces: Vec<String>,

    /// Nodes excluded from the node sanitizer.
    #[serde(default)]
    pub excluded_nodes: Vec<String>,

    /// Services (by `namespace/name`) skipped by the service sanitizer.
    #[serde(default = "default_excluded_services")]
    pub excluded_services: Vec<String>,

    /// Namespaces treated as system-owned: exempt from the "unused
    /// namespace" check and ignored when collecting RBAC subjects.
    #[serde(default = "default_system_namespaces")]
    pub system_namespaces: Vec<String>,

    /// Per-container CPU utilization threshold (percent of limit).
    #[serde(default = "default_utilization_limit")]
    pub pod_cpu_limit: u32,

    /// Per-container memory utilization threshold (percent of limit).
    #[serde(default = "default_utilization_limit")]
    pub pod_mem_limit: u32,

    /// Node CPU utilization threshold (percent of allocatable).
    #[serde(default = "default_utilization_limit")]
    pub node_cpu_limit: u32,

    /// Node memory utilization threshold (percent of allocatable).
    #[serde(default = "default_utilization_limit")]
    pub node_mem_limit: u32,

    /// Container restarts tolerated before flagging.
    #[serde(default = "default_restarts_limit")]
    pub restarts_limit: i32,

    /// Workload CPU allocation thresholds.
    #[serde(default)]
    pub cpu_allocation_limits: AllocationLimits,

    /// Workload memory allocation thresholds.
    #[serde(default)]
    pub mem_allocation_limits: AllocationLimits,

    /// Minimum severity that makes the binary exit non-zero
    /// (`None` = never fail).
    #[serde(default)]
    pub fail_level: Option<Severity>,

    /// Report snapshots kept per cluster before pruning.
    #[serde(default = "default_retention")]
    pub retention: usize,
}

fn default_excluded_services() -> Vec<String> {
    vec!["default/kubernetes".to_string()]
}

fn default_system_namespaces() -> Vec<String> {
    vec![
        "default".to_string(),
        "kube-system".to_string(),
        "kube-public".to_string(),
        "kube-node-lease".to_string(),
    ]
}

fn default_utilization_limit() -> u32 {
    80
}

fn default_restarts_limit() -> i32 {
    3
}

fn default_retention() -> usize {
    10
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            excluded_namespaces: Vec::new(),
            excluded_nodes: Vec::new(),
            excluded_services: default_excluded_services(),
            system_namespaces: default_system_namespaces(),
            pod_cpu_limit: default_utilization_limit(),
            pod_mem_limit: default_utilization_limit(),
            node_cpu_limit: default_utilization_limit(),
            node_mem_limit: default_utilization_limit(),
            restarts_limit: default_restarts_limit(),
            cpu_allocation_limits: AllocationLimits::default(),
            mem_allocation_limits: AllocationLimits::default(),
            fail_level: None,
            retention: default_retention(),
        }
    }
}

impl ScanConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e))?;
        let config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.display().to_string(), e))?;
        Ok(config)
    }

    /// Restrict the scan to one namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Exclude a namespace from listing.
    pub fn exclude_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.excluded_namespaces.push(namespace.into());
        self
    }

    /// Whether a namespace is excluded from the scan.
    pub fn excluded_ns(&self, namespace: &str) -> bool {
        if let Some(target) = &self.namespace {
            if target != namespace {
                return true;
            }
        }
        self.excluded_namespaces.iter().any(|ns| ns == namespace)
    }

    /// Whether a node is excluded from the node sanitizer.
    pub fn excluded_node(&self, node: &str) -> bool {
        self.excluded_nodes.iter().any(|n| n == node)
    }

    /// Whether a service (by FQN) is skipped.
    pub fn excluded_service(&self, fqn: &str) -> bool {
        self.excluded_services.iter().any(|s| s == fqn)
    }

    /// Whether a namespace is on the system allow-list.
    pub fn system_namespace(&self, namespace: &str) -> bool {
        self.system_namespaces.iter().any(|ns| ns == namespace)
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(String, #[source] std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(String, #[source] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.pod_cpu_limit, 80);
        assert_eq!(config.restarts_limit, 3);
        assert!(config.system_namespace("kube-system"));
        assert!(config.excluded_service("default/kubernetes"));
        assert!(!config.excluded_ns("apps"));
    }

    #[test]
    fn namespace_target_excludes_others() {
        let config = ScanConfig::default().with_namespace("apps");
        assert!(!config.excluded_ns("apps"));
        assert!(config.excluded_ns("default"));
    }

    #[test]
    fn parses_partial_yaml() {
        let yaml = r#"
podCpuLimit: 95
excludedNamespaces:
  - kube-system
cpuAllocationLimits:
  underPercent: 30
  overPercent: 120
"#;
        let config: ScanConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.pod_cpu_limit, 95);
        assert!(config.excluded_ns("kube-system"));
        assert_eq!(config.cpu_allocation_limits.over_percent, 120);
        // Untouched fields keep their defaults
        assert_eq!(config.node_mem_limit, 80);
    }
}
