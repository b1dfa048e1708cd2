//! Label selector matching.
//!
//! Services select pods with a plain label map; Deployments,
//! StatefulSets, and HPAs use full `LabelSelector`s with match
//! expressions. A malformed expression degrades the one check that
//! needed it to "skipped" rather than failing the scan.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::collections::BTreeMap;

/// A selector expression the matcher cannot evaluate.
#[derive(Debug, thiserror::Error)]
#[error("Invalid label selector operator: {0}")]
pub struct SelectorError(pub String);

/// Whether a label map satisfies a plain equality selector
/// (every selector entry present with the same value).
///
/// An empty selector matches nothing: Kubernetes treats selector-less
/// services as manually managed.
pub fn matches_labels(
    selector: &BTreeMap<String, String>,
    labels: Option<&BTreeMap<String, String>>,
) -> bool {
    if selector.is_empty() {
        return false;
    }
    let Some(labels) = labels else {
        return false;
    };
    selector
        .iter()
        .all(|(k, v)| labels.get(k).is_some_and(|have| have == v))
}

/// Whether a label map satisfies a full `LabelSelector`
/// (`matchLabels` plus `In`/`NotIn`/`Exists`/`DoesNotExist`).
pub fn matches_selector(
    selector: &LabelSelector,
    labels: Option<&BTreeMap<String, String>>,
) -> Result<bool, SelectorError> {
    static EMPTY: BTreeMap<String, String> = BTreeMap::new();
    let labels = labels.unwrap_or(&EMPTY);

    if let Some(match_labels) = &selector.match_labels {
        for (k, v) in match_labels {
            if labels.get(k) != Some(v) {
                return Ok(false);
            }
        }
    }

    for expr in selector.match_expressions.as_deref().unwrap_or_default() {
        let value = labels.get(&expr.key);
        let values = expr.values.as_deref().unwrap_or_default();
        let matched = match expr.operator.as_str() {
            "In" => value.is_some_and(|v| values.iter().any(|want| want == v)),
            "NotIn" => !value.is_some_and(|v| values.iter().any(|want| want == v)),
            "Exists" => value.is_some(),
            "DoesNotExist" => value.is_none(),
            other => return Err(SelectorError(other.to_string())),
        };
        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;

    fn labels(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn plain_selector() {
        let selector = labels(&[("app", "web")]);
        assert!(matches_labels(&selector, Some(&labels(&[("app", "web"), ("tier", "fe")]))));
        assert!(!matches_labels(&selector, Some(&labels(&[("app", "db")]))));
        assert!(!matches_labels(&selector, None));
        assert!(!matches_labels(&BTreeMap::new(), Some(&labels(&[("app", "web")]))));
    }

    #[test]
    fn match_labels_and_expressions() {
        let selector = LabelSelector {
            match_labels: Some(labels(&[("app", "web")])),
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "tier".to_string(),
                operator: "In".to_string(),
                values: Some(vec!["fe".to_string(), "edge".to_string()]),
            }]),
        };

        let pod = labels(&[("app", "web"), ("tier", "fe")]);
        assert!(matches_selector(&selector, Some(&pod)).unwrap());

        let other = labels(&[("app", "web"), ("tier", "be")]);
        assert!(!matches_selector(&selector, Some(&other)).unwrap());
    }

    #[test]
    fn exists_operators() {
        let selector = LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "canary".to_string(),
                operator: "DoesNotExist".to_string(),
                values: None,
            }]),
        };
        assert!(matches_selector(&selector, Some(&labels(&[("app", "web")]))).unwrap());
        assert!(!matches_selector(&selector, Some(&labels(&[("canary", "y")]))).unwrap());
    }

    #[test]
    fn bad_operator_is_an_error() {
        let selector = LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "app".to_string(),
                operator: "Near".to_string(),
                values: None,
            }]),
        };
        assert!(matches_selector(&selector, None).is_err());
    }
}
