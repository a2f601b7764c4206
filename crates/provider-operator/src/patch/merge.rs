//! Whole-document JSON-merge-patch engine: each patch document is merged
//! (RFC7396) into every rendered manifest document whose
//! `kind`/`apiVersion`/`metadata.name`/`metadata.namespace` match, via the
//! `json_patch` crate's `merge` function.

use crate::util::errors::{Error, StdError};
use serde_json::Value;

fn identity(document: &Value) -> (Option<&str>, Option<&str>, Option<&str>, Option<&str>) {
    (
        document.get("kind").and_then(Value::as_str),
        document.get("apiVersion").and_then(Value::as_str),
        document.pointer("/metadata/name").and_then(Value::as_str),
        document.pointer("/metadata/namespace").and_then(Value::as_str),
    )
}

fn matches(document: &Value, patch_doc: &Value) -> bool {
    let (kind, api_version, name, namespace) = identity(document);
    let (patch_kind, patch_api_version, patch_name, patch_namespace) = identity(patch_doc);

    let field_matches = |wanted: Option<&str>, actual: Option<&str>| wanted.map(|w| Some(w) == actual).unwrap_or(true);

    field_matches(patch_kind, kind)
        && field_matches(patch_api_version, api_version)
        && field_matches(patch_name, name)
        && field_matches(patch_namespace, namespace)
}

/// Applies every patch in `patches` (each a full merge-patch document,
/// itself identifying its targets by kind/apiVersion/name/namespace) to
/// every matching document in `documents`, in patch order.
pub fn apply_merge_patches(documents: &mut [Value], patches: &[String]) -> Result<(), Error> {
    for raw_patch in patches {
        let patch_doc: Value = serde_yaml::from_str(raw_patch)
            .map_err(|e| Error::StdError(StdError::YamlError(e)))?;
        for document in documents.iter_mut() {
            if matches(document, &patch_doc) {
                json_patch::merge(document, &patch_doc);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merges_only_into_matching_documents() {
        let mut documents = vec![
            json!({"kind": "Deployment", "apiVersion": "apps/v1", "metadata": {"name": "manager"}, "spec": {"replicas": 1}}),
            json!({"kind": "Service", "apiVersion": "v1", "metadata": {"name": "manager"}}),
        ];
        let patches = vec![serde_yaml::to_string(&json!({
            "kind": "Deployment",
            "spec": {"replicas": 3}
        }))
        .unwrap()];

        apply_merge_patches(&mut documents, &patches).unwrap();

        assert_eq!(documents[0]["spec"]["replicas"], json!(3));
        assert_eq!(documents[1].get("spec"), None);
    }
}
