//! ConfigMap fetch source: a provider's component manifest and metadata
//! staged in-cluster as a single labeled `ConfigMap`, selected via
//! `Api::namespaced` + a `ListParams` label selector and read from its
//! well-known `data.components`/`data.metadata` keys.

use crate::util::errors::{Error, StdError};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, ListParams};
use kube::Client;

const COMPONENTS_KEY: &str = "components";
const METADATA_KEY: &str = "metadata";

/// Reads the single ConfigMap in `namespace` matching `selector`, returning
/// its `data.metadata` and `data.components` contents. Exactly one match is
/// required: zero or multiple is ambiguous and rejected.
pub async fn fetch_labeled_documents(
    client: Client,
    namespace: &str,
    selector: &LabelSelector,
) -> Result<(String, String), Error> {
    let label_selector = selector_to_query(selector)?;
    let api: Api<ConfigMap> = Api::namespaced(client, namespace);
    let list = api
        .list(&ListParams::default().labels(&label_selector))
        .await
        .map_err(|e| Error::StdError(StdError::KubeError(e)))?;

    if list.items.len() != 1 {
        return Err(Error::StdError(StdError::Fetch(format!(
            "expected exactly one ConfigMap in {namespace} matching selector `{label_selector}`, found {}",
            list.items.len()
        ))));
    }

    let config_map = &list.items[0];
    let name = config_map.metadata.name.clone().unwrap_or_default();
    let data = config_map.data.as_ref();

    let components = data
        .and_then(|d| d.get(COMPONENTS_KEY))
        .ok_or_else(|| {
            Error::StdError(StdError::Fetch(format!(
                "ConfigMap {namespace}/{name} has no `{COMPONENTS_KEY}` data key"
            )))
        })?
        .clone();
    let metadata = data
        .and_then(|d| d.get(METADATA_KEY))
        .ok_or_else(|| {
            Error::StdError(StdError::MetadataMissing(format!(
                "ConfigMap {namespace}/{name} has no `{METADATA_KEY}` data key"
            )))
        })?
        .clone();

    Ok((metadata, components))
}

pub fn selector_to_query(selector: &LabelSelector) -> Result<String, Error> {
    let match_labels = selector.match_labels.clone().unwrap_or_default();
    if match_labels.is_empty() {
        return Err(Error::StdError(StdError::Validation(
            "ConfigMap fetch selector must set at least one matchLabels entry".to_string(),
        )));
    }
    Ok(match_labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn empty_selector_is_rejected() {
        let selector = LabelSelector::default();
        assert!(selector_to_query(&selector).is_err());
    }

    #[test]
    fn selector_renders_as_sorted_equality_list() {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "capi".to_string());
        let selector = LabelSelector { match_labels: Some(labels), ..Default::default() };
        assert_eq!(selector_to_query(&selector).unwrap(), "app=capi");
    }
}
