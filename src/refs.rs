//! Cross-resource reference index for ConfigMaps and Secrets.
//!
//! Walks every Pod and ServiceAccount visible to the scan and records
//! which ConfigMaps/Secrets they consume, and through which mechanism
//! (volume mount, env var, envFrom, image pull secret, service-account
//! attachment). The ConfigMap and Secret sanitizers use the index to
//! flag resources and data keys that nothing references.
//!
//! This is a best-effort static analysis: references constructed
//! dynamically (e.g. by downstream controllers) are invisible to it, so
//! its findings stay at Info severity.

use crate::issues::ResourceId;
use k8s_openapi::api::core::v1::{Container, Pod, ServiceAccount};
use std::collections::{BTreeMap, BTreeSet};

/// How a ConfigMap or Secret is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefKind {
    /// Mounted as a volume.
    Volume,
    /// Single key pulled through `env[].valueFrom`.
    Env,
    /// Whole object injected through `envFrom`.
    EnvFrom,
    /// Pod `imagePullSecrets` entry (Secrets only).
    Pull,
    /// ServiceAccount `.secrets` entry (Secrets only).
    SaSecret,
    /// ServiceAccount `.imagePullSecrets` entry (Secrets only).
    SaPullSecret,
}

impl RefKind {
    /// Tag string used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Volume => "volume",
            Self::Env => "env",
            Self::EnvFrom => "envFrom",
            Self::Pull => "pull",
            Self::SaSecret => "sasec",
            Self::SaPullSecret => "sapullsec",
        }
    }
}

/// One recorded reference to a target ConfigMap or Secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Target object name.
    pub name: String,
    /// Every data key of the target counts as used.
    pub wholesale: bool,
    /// Specific data keys covered when not wholesale.
    pub keys: BTreeSet<String>,
}

/// References to one target, grouped by mechanism. Several mechanisms
/// can point at the same target (e.g. a ConfigMap both mounted and read
/// through an env var).
pub type TypedReferences = BTreeMap<RefKind, Reference>;

/// Reference index over every ConfigMap and Secret seen in pod and
/// service-account specs. Built once per scan, never persisted.
///
/// ConfigMaps and Secrets are tracked in separate maps: the two kinds
/// share the `namespace/name` identity space, so one combined map would
/// conflate a ConfigMap with a same-named Secret.
#[derive(Debug, Default)]
pub struct References {
    config_maps: BTreeMap<ResourceId, TypedReferences>,
    secrets: BTreeMap<ResourceId, TypedReferences>,
}

impl References {
    /// Build the index from the full pod and service-account sets.
    ///
    /// Optional references (`optional: true`) count as usage: treating
    /// them as unused would manufacture false positives for objects that
    /// are consumed only when present.
    pub fn build(pods: &[Pod], service_accounts: &[ServiceAccount]) -> Self {
        let mut refs = Self::default();
        for pod in pods {
            refs.index_pod(pod);
        }
        for sa in service_accounts {
            refs.index_service_account(sa);
        }
        refs
    }

    /// Recorded references to a ConfigMap.
    pub fn config_map(&self, id: &ResourceId) -> Option<&TypedReferences> {
        self.config_maps.get(id)
    }

    /// Recorded references to a Secret.
    pub fn secret(&self, id: &ResourceId) -> Option<&TypedReferences> {
        self.secrets.get(id)
    }

    fn index_pod(&mut self, pod: &Pod) {
        let ns = pod
            .metadata
            .namespace
            .as_deref()
            .unwrap_or("default")
            .to_string();
        let spec = match &pod.spec {
            Some(spec) => spec,
            None => return,
        };

        for volume in spec.volumes.as_deref().unwrap_or_default() {
            if let Some(cm) = &volume.config_map {
                let keys = cm
                    .items
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(|item| item.key.clone());
                self.record(
                    Target::ConfigMap,
                    &ns,
                    &cm.name,
                    RefKind::Volume,
                    cm.items.is_none(),
                    keys,
                );
            }
            if let Some(sec) = &volume.secret {
                if let Some(name) = sec.secret_name.as_deref() {
                    let keys = sec
                        .items
                        .as_deref()
                        .unwrap_or_default()
                        .iter()
                        .map(|item| item.key.clone());
                    self.record(
                        Target::Secret,
                        &ns,
                        name,
                        RefKind::Volume,
                        sec.items.is_none(),
                        keys,
                    );
                }
            }
        }

        let containers = spec
            .init_containers
            .as_deref()
            .unwrap_or_default()
            .iter()
            .chain(spec.containers.iter());
        for container in containers {
            self.index_container(&ns, container);
        }

        for pull in spec.image_pull_secrets.as_deref().unwrap_or_default() {
            self.record(Target::Secret, &ns, &pull.name, RefKind::Pull, true, None);
        }
    }

    fn index_container(&mut self, ns: &str, container: &Container) {
        for env in container.env.as_deref().unwrap_or_default() {
            let Some(source) = &env.value_from else {
                continue;
            };
            if let Some(cm_ref) = &source.config_map_key_ref {
                self.record(
                    Target::ConfigMap,
                    ns,
                    &cm_ref.name,
                    RefKind::Env,
                    false,
                    Some(cm_ref.key.clone()),
                );
            }
            if let Some(sec_ref) = &source.secret_key_ref {
                self.record(
                    Target::Secret,
                    ns,
                    &sec_ref.name,
                    RefKind::Env,
                    false,
                    Some(sec_ref.key.clone()),
                );
            }
        }

        for from in container.env_from.as_deref().unwrap_or_default() {
            if let Some(cm_ref) = &from.config_map_ref {
                self.record(Target::ConfigMap, ns, &cm_ref.name, RefKind::EnvFrom, true, None);
            }
            if let Some(sec_ref) = &from.secret_ref {
                self.record(Target::Secret, ns, &sec_ref.name, RefKind::EnvFrom, true, None);
            }
        }
    }

    fn index_service_account(&mut self, sa: &ServiceAccount) {
        let sa_ns = sa.metadata.namespace.as_deref().unwrap_or("default");

        for secret in sa.secrets.as_deref().unwrap_or_default() {
            if let Some(name) = secret.name.as_deref() {
                let ns = secret.namespace.as_deref().unwrap_or(sa_ns);
                self.record(Target::Secret, ns, name, RefKind::SaSecret, true, None);
            }
        }

        for pull in sa.image_pull_secrets.as_deref().unwrap_or_default() {
            self.record(Target::Secret, sa_ns, &pull.name, RefKind::SaPullSecret, true, None);
        }
    }

    /// Record one reference, merging with any existing reference of the
    /// same kind to the same target. A wholesale reference clears any
    /// previously collected key scoping; key-scoped references union
    /// their keys unless the kind is already wholesale.
    fn record(
        &mut self,
        target: Target,
        ns: &str,
        name: &str,
        kind: RefKind,
        wholesale: bool,
        keys: impl IntoIterator<Item = String>,
    ) {
        let map = match target {
            Target::ConfigMap => &mut self.config_maps,
            Target::Secret => &mut self.secrets,
        };
        let id = ResourceId::namespaced(ns, name);
        let entry = map
            .entry(id)
            .or_default()
            .entry(kind)
            .or_insert_with(|| Reference {
                name: name.to_string(),
                wholesale: false,
                keys: BTreeSet::new(),
            });

        if wholesale {
            entry.wholesale = true;
            entry.keys.clear();
        } else if !entry.wholesale {
            entry.keys.extend(keys);
        }
    }
}

enum Target {
    ConfigMap,
    Secret,
}

/// Whether a specific data key of a referenced object is used,
/// given every reference recorded against it.
pub fn key_used(refs: &TypedReferences, key: &str) -> bool {
    refs.values()
        .any(|reference| reference.wholesale || reference.keys.contains(key))
}
