//! Targeted patches: a `PatchSelector` naming specific documents plus a
//! body whose format is auto-detected. The body is first parsed as an
//! RFC6902 JSON Patch (`json_patch::Patch`); if that fails, it is parsed as
//! a plain JSON/YAML value and applied as an RFC7396 merge patch
//! (`json_patch::merge`) instead.

use crate::api::common::PatchSelector;
use crate::util::errors::{Error, StdError};
use serde_json::Value;

fn selector_matches(document: &Value, selector: &PatchSelector) -> bool {
    let kind = document.get("kind").and_then(Value::as_str);
    let api_version = document.get("apiVersion").and_then(Value::as_str);
    let name = document.pointer("/metadata/name").and_then(Value::as_str);
    let namespace = document.pointer("/metadata/namespace").and_then(Value::as_str);

    let (group, version) = split_api_version(api_version);

    let field_matches = |wanted: &Option<String>, actual: Option<&str>| {
        wanted.as_deref().map(|w| Some(w) == actual).unwrap_or(true)
    };

    field_matches(&selector.group, group)
        && field_matches(&selector.version, version)
        && field_matches(&selector.kind, kind)
        && field_matches(&selector.name, name)
        && field_matches(&selector.namespace, namespace)
        && label_selector_matches(document, selector.label_selector.as_deref())
}

/// Checks `label_selector` (a comma-separated `key=value` equality list, the
/// same format `fetch::configmap::selector_to_query` produces) against the
/// document's `metadata.labels`. `None` matches everything.
fn label_selector_matches(document: &Value, label_selector: Option<&str>) -> bool {
    let Some(label_selector) = label_selector else { return true };
    let labels = document.pointer("/metadata/labels").and_then(Value::as_object);
    label_selector
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .all(|pair| match pair.split_once('=') {
            Some((key, value)) => labels.and_then(|l| l.get(key)).and_then(Value::as_str) == Some(value),
            None => false,
        })
}

fn split_api_version(api_version: Option<&str>) -> (Option<&str>, Option<&str>) {
    match api_version {
        None => (None, None),
        Some(v) => match v.split_once('/') {
            Some((group, version)) => (Some(group), Some(version)),
            None => (Some(""), Some(v)),
        },
    }
}

/// Applies `body` (auto-detected as RFC6902 or RFC7396) to every document
/// matched by `selector`.
pub fn apply_targeted_patch(documents: &mut [Value], selector: &PatchSelector, body: &str) -> Result<(), Error> {
    let parsed: Value = serde_yaml::from_str(body).map_err(|e| Error::StdError(StdError::YamlError(e)))?;

    if let Ok(ops) = serde_json::from_value::<json_patch::Patch>(parsed.clone()) {
        for document in documents.iter_mut() {
            if selector_matches(document, selector) {
                json_patch::patch(document, &ops)
                    .map_err(|e| Error::StdError(StdError::Render(format!("applying RFC6902 patch: {e}"))))?;
            }
        }
        return Ok(());
    }

    for document in documents.iter_mut() {
        if selector_matches(document, selector) {
            json_patch::merge(document, &parsed);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn selector(kind: &str) -> PatchSelector {
        PatchSelector { kind: Some(kind.to_string()), ..Default::default() }
    }

    #[test]
    fn detects_and_applies_rfc6902_patch() {
        let mut documents =
            vec![json!({"kind": "Deployment", "metadata": {"name": "manager"}, "spec": {"replicas": 1}})];
        let body = r#"[{"op": "replace", "path": "/spec/replicas", "value": 5}]"#;
        apply_targeted_patch(&mut documents, &selector("Deployment"), body).unwrap();
        assert_eq!(documents[0]["spec"]["replicas"], json!(5));
    }

    #[test]
    fn falls_back_to_merge_patch_when_not_an_operation_array() {
        let mut documents =
            vec![json!({"kind": "Deployment", "metadata": {"name": "manager"}, "spec": {"replicas": 1}})];
        let body = r#"{"spec": {"replicas": 7}}"#;
        apply_targeted_patch(&mut documents, &selector("Deployment"), body).unwrap();
        assert_eq!(documents[0]["spec"]["replicas"], json!(7));
    }

    #[test]
    fn selector_group_version_is_parsed_from_combined_api_version() {
        let document = json!({"kind": "X", "apiVersion": "apps/v1"});
        let selector = PatchSelector { group: Some("apps".into()), version: Some("v1".into()), ..Default::default() };
        assert!(selector_matches(&document, &selector));
        let wrong = PatchSelector { group: Some("batch".into()), ..Default::default() };
        assert!(!selector_matches(&document, &wrong));
    }

    #[test]
    fn label_selector_restricts_to_matching_documents() {
        let labeled = json!({"kind": "Service", "metadata": {"name": "s1", "labels": {"app": "docker"}}});
        let unlabeled = json!({"kind": "Service", "metadata": {"name": "s2"}});
        let selector = PatchSelector { label_selector: Some("app=docker".to_string()), ..Default::default() };
        assert!(selector_matches(&labeled, &selector));
        assert!(!selector_matches(&unlabeled, &selector));
    }

    #[test]
    fn label_selector_with_wrong_value_does_not_match() {
        let document = json!({"kind": "Service", "metadata": {"name": "s1", "labels": {"app": "aws"}}});
        let selector = PatchSelector { label_selector: Some("app=docker".to_string()), ..Default::default() };
        assert!(!selector_matches(&document, &selector));
    }
}
