//! ConfigMap sanitizer: unreferenced objects and unused data keys.
//!
//! Findings stay at Info: the reference index is a static analysis and
//! cannot see consumers wired up dynamically.

use crate::issues::{Issue, Outcome, Severity};
use crate::linters::meta_id;
use crate::refs::{self, References};
use k8s_openapi::api::core::v1::ConfigMap;

/// Lint every in-scope ConfigMap against the reference index.
pub fn lint(config_maps: &[ConfigMap], references: &References) -> Outcome {
    let mut outcome = Outcome::new();
    for cm in config_maps {
        let id = meta_id(&cm.metadata);
        outcome.ensure(id.clone());

        let Some(typed) = references.config_map(&id) else {
            outcome.push(id, Issue::new(Severity::Info, "Used?"));
            continue;
        };

        let keys = cm
            .data
            .iter()
            .flat_map(|d| d.keys())
            .chain(cm.binary_data.iter().flat_map(|d| d.keys()));
        for key in keys {
            if !refs::key_used(typed, key) {
                outcome.push(
                    id.clone(),
                    Issue::new(Severity::Info, format!("Unused key `{}`?", key)),
                );
            }
        }
    }
    outcome
}
