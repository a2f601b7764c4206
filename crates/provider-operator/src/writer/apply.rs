//! Server-side apply and guarded delete for arbitrary rendered documents.
//! Uses `kube::discovery` to resolve each document's `ApiResource` at
//! runtime (providers render CRDs, RBAC, webhooks, and more — kinds that
//! cannot be enumerated as typed Rust structs ahead of time) and then
//! applies with `Patch::Apply` + `PatchParams::apply(..).force()`.

use crate::util::errors::{Error, StdError};
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::core::GroupVersionKind;
use kube::discovery;
use kube::Client;
use serde_json::Value;

pub const FIELD_MANAGER: &str = "capi-provider-operator";

const PROTECTED_NAMESPACES: &[&str] = &["default", "kube-system", "kube-public", "kube-node-lease"];

fn gvk_of(document: &Value) -> Result<GroupVersionKind, Error> {
    let api_version = document
        .get("apiVersion")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::StdError(StdError::IllegalDocument))?;
    let kind = document
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::StdError(StdError::IllegalDocument))?;
    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    };
    Ok(GroupVersionKind::gvk(group, version, kind))
}

async fn api_for(client: &Client, document: &Value) -> Result<(Api<DynamicObject>, String), Error> {
    let gvk = gvk_of(document)?;
    let (resource, capabilities) = discovery::pinned_kind(client, &gvk)
        .await
        .map_err(|e| Error::StdError(StdError::Apply(format!("discovering {gvk:?}: {e}"))))?;
    let name = document
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::StdError(StdError::IllegalDocument))?
        .to_string();

    let api = if capabilities.scope == discovery::Scope::Namespaced {
        let namespace = document.pointer("/metadata/namespace").and_then(Value::as_str).ok_or_else(|| {
            Error::StdError(StdError::IllegalDocument)
        })?;
        Api::namespaced_with(client.clone(), namespace, &resource)
    } else {
        Api::all_with(client.clone(), &resource)
    };
    Ok((api, name))
}

/// Applies `document`, falling back to an explicit get-then-create when the
/// cluster (or the resource's strategy) rejects server-side apply outright.
pub async fn apply_object(client: &Client, document: &Value) -> Result<(), Error> {
    let (api, name) = api_for(client, document).await?;
    let dynamic_object: DynamicObject = serde_json::from_value(document.clone())
        .map_err(|e| Error::StdError(StdError::JsonSerializationError(e)))?;

    let params = PatchParams::apply(FIELD_MANAGER).force();
    match api.patch(&name, &params, &Patch::Apply(&dynamic_object)).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 405 || e.code == 415 => {
            match api.get(&name).await {
                Ok(_) => api
                    .replace(&name, &Default::default(), &dynamic_object)
                    .await
                    .map(|_| ())
                    .map_err(|e| Error::StdError(StdError::KubeError(e))),
                Err(kube::Error::Api(e)) if e.code == 404 => api
                    .create(&Default::default(), &dynamic_object)
                    .await
                    .map(|_| ())
                    .map_err(|e| Error::StdError(StdError::KubeError(e))),
                Err(e) => Err(Error::StdError(StdError::KubeError(e))),
            }
        }
        Err(e) => Err(Error::StdError(StdError::KubeError(e))),
    }
}

/// Deletes `document`, refusing to delete a `Namespace` object named after
/// one of the cluster's protected system namespaces.
pub async fn delete_object(client: &Client, document: &Value) -> Result<(), Error> {
    let kind = document.get("kind").and_then(Value::as_str).unwrap_or_default();
    let name = document.pointer("/metadata/name").and_then(Value::as_str).unwrap_or_default();
    if kind == "Namespace" && (PROTECTED_NAMESPACES.contains(&name) || name.starts_with("kube-")) {
        return Err(Error::StdError(StdError::Apply(format!(
            "refusing to delete protected system namespace `{name}`"
        ))));
    }

    let (api, name) = api_for(client, document).await?;
    match api.delete(&name, &Default::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(Error::StdError(StdError::KubeError(e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_documents_missing_kind_or_api_version() {
        let document = json!({"metadata": {"name": "x"}});
        assert!(gvk_of(&document).is_err());
    }

    #[tokio::test]
    async fn refuses_to_delete_protected_namespaces() {
        let Ok(client) = Client::try_default().await else { return };
        let document = json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "kube-system"}});
        let result = delete_object(&client, &document).await;
        assert!(result.is_err());
    }
}
