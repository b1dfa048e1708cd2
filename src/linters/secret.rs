//! Secret sanitizer: unreferenced objects and unused data keys.
//!
//! Same reference-index analysis as the ConfigMap sanitizer, over the
//! secret side of the index (pull secrets and service-account
//! attachments count as wholesale usage).

use crate::issues::{Issue, Outcome, Severity};
use crate::linters::meta_id;
use crate::refs::{self, References};
use k8s_openapi::api::core::v1::Secret;

/// Lint every in-scope Secret against the reference index.
pub fn lint(secrets: &[Secret], references: &References) -> Outcome {
    let mut outcome = Outcome::new();
    for secret in secrets {
        let id = meta_id(&secret.metadata);
        outcome.ensure(id.clone());

        let Some(typed) = references.secret(&id) else {
            outcome.push(id, Issue::new(Severity::Info, "Used?"));
            continue;
        };

        let keys = secret
            .data
            .iter()
            .flat_map(|d| d.keys())
            .chain(secret.string_data.iter().flat_map(|d| d.keys()));
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
