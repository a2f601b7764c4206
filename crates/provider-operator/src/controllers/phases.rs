//! One function per reconcile phase, run in order by `controllers::engine`:
//! preflight, fetch, render, old-components-deletion, apply, report,
//! delete. Each phase is a plain function a single engine loop drives for
//! every provider kind, rather than a per-kind sequential match chain.

use crate::api::common::ProviderStatus;
use crate::api::hub::{CoreProvider, ProviderSpecCommon};
use crate::fetch::{self, cache::Artifact};
use crate::render::{self, RenderInput};
use crate::types::ProviderKind;
use crate::util::conditions::{
    self, PreflightCheckReason, ProviderInstalledReason, ProviderUpgradedReason, PREFLIGHT_CHECK_PASSED,
    PROVIDER_INSTALLED, PROVIDER_UPGRADED, READY,
};
use crate::util::errors::{Error, StdError};
use crate::util::status::{is_status_condition_true, set_status_condition};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Api, ListParams};
use kube::Client;
use semver::Version;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Validates the provider resource before any I/O runs: fetch configuration exclusivity,
/// version format, downgrade protection, the Core provider singleton
/// invariant, the Core-readiness dependency for non-Core kinds, and
/// provider-name validation.
pub fn preflight(
    kind: ProviderKind,
    name: &str,
    common: &ProviderSpecCommon,
    core_already_exists: bool,
    core_provider_ready: bool,
    installed_version: Option<&str>,
) -> Result<(), Error> {
    if kind.is_singleton() && core_already_exists {
        return Err(Error::StdError(StdError::Validation(format!(
            "{}: a CoreProvider already exists; at most one may exist cluster-wide",
            PreflightCheckReason::MoreThanOneExists
        ))));
    }

    if !kind.is_singleton() && !core_provider_ready {
        return Err(Error::StdError(StdError::Validation(format!(
            "{}: waiting for the CoreProvider to become Ready",
            PreflightCheckReason::WaitingForCoreProviderReady
        ))));
    }

    if let Some(known) = kind.known_names() {
        if !known.contains(&name) {
            let reason = if kind == ProviderKind::Core {
                PreflightCheckReason::IncorrectCoreProviderName
            } else {
                PreflightCheckReason::UnknownProvider
            };
            return Err(Error::StdError(StdError::Validation(format!(
                "{reason}: `{name}` is not a recognized {kind} name"
            ))));
        }
    }

    if let Some(version) = &common.version {
        if Version::parse(version.trim_start_matches('v')).is_err() {
            return Err(Error::StdError(StdError::Validation(format!(
                "{}: `{version}` is not a valid semver version",
                PreflightCheckReason::IncorrectVersionFormat
            ))));
        }
    }

    if let (Some(version), Some(installed)) = (&common.version, installed_version) {
        if let (Ok(requested), Ok(current)) =
            (Version::parse(version.trim_start_matches('v')), Version::parse(installed.trim_start_matches('v')))
        {
            if requested < current {
                return Err(Error::StdError(StdError::Validation(format!(
                    "{}: requested version `{version}` is older than the installed version `{installed}`",
                    PreflightCheckReason::UnsupportedProviderDowngradeReason
                ))));
            }
        }
    }

    let fetch_config = common.fetch_config.as_ref().ok_or_else(|| {
        Error::StdError(StdError::Validation(format!(
            "{}: fetchConfig is required",
            PreflightCheckReason::FetchConfigValidationError
        )))
    })?;
    if fetch_config.set_count() != 1 {
        return Err(Error::StdError(StdError::Validation(format!(
            "{}: fetchConfig must set exactly one of url/oci/selector",
            PreflightCheckReason::FetchConfigValidationError
        ))));
    }

    Ok(())
}

/// Lists every `CoreProvider` cluster-wide and reports whether any carries
/// `Ready=True`, for the Core-readiness dependency non-Core kinds preflight
/// against.
pub async fn core_provider_ready(client: &Client) -> Result<bool, Error> {
    let api: Api<CoreProvider> = Api::all(client.clone());
    let list = api.list(&ListParams::default()).await.map_err(Error::from)?;
    Ok(list
        .items
        .iter()
        .any(|provider| provider.status.as_ref().map(|s| is_status_condition_true(&s.conditions, READY)).unwrap_or(false)))
}

/// Resolves and fetches the provider's component manifests, using the
/// shared cache to avoid refetching an already-known `(source, version)`.
pub async fn fetch_components(
    client: Client,
    namespace: &str,
    cache: &fetch::cache::FetchCache,
    common: &ProviderSpecCommon,
) -> Result<Arc<Artifact>, Error> {
    let fetch_config = common
        .fetch_config
        .as_ref()
        .ok_or_else(|| Error::StdError(StdError::Validation("fetchConfig is required".to_string())))?;
    fetch::fetch(client, namespace, cache, fetch_config, common.version.as_deref())
        .await
        .map_err(|e| Error::StdError(StdError::Fetch(e.to_string())))
}

/// Resolves the variables available to substitution: the operator's own
/// process environment, overridden by the provider's `configSecret` (which
/// takes precedence since it's the operator's explicit per-provider input).
pub async fn resolve_variables(
    client: &Client,
    namespace: &str,
    common: &ProviderSpecCommon,
) -> Result<BTreeMap<String, String>, Error> {
    let mut variables: BTreeMap<String, String> = std::env::vars().collect();
    if let Some(secret_ref) = &common.config_secret {
        let secret_namespace = secret_ref.namespace.as_deref().unwrap_or(namespace);
        let api: Api<Secret> = Api::namespaced(client.clone(), secret_namespace);
        let secret = api.get(&secret_ref.name).await.map_err(Error::from)?;
        for (key, value) in secret.data.into_iter().flatten() {
            if let Ok(text) = String::from_utf8(value.0) {
                variables.insert(key, text);
            }
        }
    }
    Ok(variables)
}

/// Runs the render pipeline over the fetched artifact, returning the
/// rendered documents and the CAPI contract resolved from the artifact's
/// metadata (when any was fetched).
pub fn render_components(
    artifact: &Artifact,
    common: &ProviderSpecCommon,
    namespace: &str,
    variables: &BTreeMap<String, String>,
) -> Result<(Vec<Value>, Option<String>), Error> {
    let documents = render::render(RenderInput {
        raw_documents: &artifact.documents,
        variables,
        namespace,
        spec: common,
        metadata: artifact.metadata.as_deref(),
    })?;
    let contract = artifact
        .metadata
        .as_deref()
        .map(|metadata| render::resolve_contract(metadata, common.version.as_deref().unwrap_or("0.0.0")))
        .transpose()?;
    Ok((documents, contract))
}

/// Reads back the previously applied render from the `{name}-components`
/// ConfigMap, or `None` if this is the provider's first reconcile.
pub async fn previous_rendered_components(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<Option<Vec<Value>>, Error> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    match api.get(&format!("{name}-components")).await {
        Ok(config_map) => {
            let mut documents = Vec::new();
            for yaml in config_map.data.into_iter().flatten().map(|(_, v)| v) {
                documents.push(serde_yaml::from_str(&yaml).map_err(Error::from)?);
            }
            Ok(Some(documents))
        }
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
        Err(e) => Err(Error::from(e)),
    }
}

/// Persists the current render as the `{name}-components` ConfigMap so the
/// next reconcile can diff against it.
pub async fn persist_rendered_components(client: &Client, namespace: &str, name: &str, documents: &[Value]) -> Result<(), Error> {
    let config_map = render::components_configmap(name, namespace, documents)?;
    let value = serde_json::to_value(&config_map).map_err(Error::from)?;
    crate::writer::apply_all(client, std::slice::from_ref(&value)).await
}

/// Deletes any previously-applied object that no longer appears in the
/// newly rendered set, keyed by `(apiVersion, kind, namespace, name)` — the
/// cleanup that runs between an old version's components and a new
/// version's on upgrade.
pub async fn delete_stale_components(
    client: &Client,
    previous: Option<&[Value]>,
    current: &[Value],
) -> Result<(), Error> {
    let Some(previous) = previous else { return Ok(()) };
    let current_keys: std::collections::HashSet<_> = current.iter().map(document_identity).collect();
    let stale: Vec<Value> = previous
        .iter()
        .filter(|doc| !current_keys.contains(&document_identity(doc)))
        .cloned()
        .collect();
    if stale.is_empty() {
        return Ok(());
    }
    crate::writer::delete_all(client, &stale).await.map_err(|errors| {
        Error::StdError(StdError::Apply(format!(
            "{}: {} stale objects failed to delete",
            ProviderInstalledReason::OldComponentsDeletionError,
            errors.len()
        )))
    })
}

fn document_identity(document: &Value) -> (String, String, String, String) {
    (
        document.get("apiVersion").and_then(Value::as_str).unwrap_or_default().to_string(),
        document.get("kind").and_then(Value::as_str).unwrap_or_default().to_string(),
        document.pointer("/metadata/namespace").and_then(Value::as_str).unwrap_or_default().to_string(),
        document.pointer("/metadata/name").and_then(Value::as_str).unwrap_or_default().to_string(),
    )
}

/// Applies every rendered document to the target cluster, in writer order.
pub async fn apply_components(client: &Client, documents: &[Value]) -> Result<(), Error> {
    crate::writer::apply_all(client, documents).await
}

/// Checks whether every `Deployment` among the rendered documents is
/// currently `Available=True` in the cluster. An empty set of Deployments
/// (a provider with none) is vacuously available.
pub async fn deployments_available(client: &Client, documents: &[Value]) -> Result<bool, Error> {
    for document in documents.iter().filter(|d| d.get("kind").and_then(Value::as_str) == Some("Deployment")) {
        let Some(namespace) = document.pointer("/metadata/namespace").and_then(Value::as_str) else { continue };
        let Some(name) = document.pointer("/metadata/name").and_then(Value::as_str) else { continue };
        let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
        let available = match api.get(name).await {
            Ok(deployment) => deployment
                .status
                .and_then(|s| s.conditions)
                .unwrap_or_default()
                .iter()
                .any(|c| c.type_ == "Available" && c.status == "True"),
            Err(kube::Error::Api(e)) if e.code == 404 => false,
            Err(e) => return Err(Error::from(e)),
        };
        if !available {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Builds the updated status object: preflight/installed/upgraded
/// conditions plus the aggregate `Ready` condition. `ProviderInstalled`
/// only turns `True` once every managed Deployment reports `Available`;
/// `ProviderUpgraded` tracks a version change until that happens, and
/// `installed_version`/`contract` only advance once it does.
pub fn report_status(
    previous: &ProviderStatus,
    generation: i64,
    resolved_version: Option<&str>,
    deployments_available: bool,
    contract: Option<String>,
) -> ProviderStatus {
    let (conditions, _) = set_status_condition(&previous.conditions, conditions::passed(PREFLIGHT_CHECK_PASSED, generation));

    let upgrade_in_progress =
        match (previous.installed_version.as_deref(), resolved_version) {
            (Some(installed), Some(resolved)) => installed != resolved,
            _ => false,
        };

    let installed_condition = if deployments_available {
        conditions::passed(PROVIDER_INSTALLED, generation)
    } else {
        conditions::failed(
            PROVIDER_INSTALLED,
            ProviderInstalledReason::NoDeploymentAvailableConditionReason,
            "waiting for the managed Deployment to become Available",
            generation,
        )
    };
    let (conditions, _) = set_status_condition(&conditions, installed_condition);

    let conditions = if upgrade_in_progress {
        let upgraded_condition = if deployments_available {
            conditions::passed(PROVIDER_UPGRADED, generation)
        } else {
            conditions::failed(
                PROVIDER_UPGRADED,
                ProviderUpgradedReason::ComponentsUpgradeError,
                "waiting for the upgraded Deployment to become Available",
                generation,
            )
        };
        let (conditions, _) = set_status_condition(&conditions, upgraded_condition);
        conditions
    } else {
        conditions
    };

    let ready = conditions::aggregate_ready(&conditions, upgrade_in_progress);
    let (conditions, _) = set_status_condition(
        &conditions,
        if ready { conditions::passed(READY, generation) } else { conditions::failed(READY, "NotReady", "", generation) },
    );

    let installed_version = if deployments_available {
        resolved_version.map(str::to_string).or_else(|| previous.installed_version.clone())
    } else {
        previous.installed_version.clone()
    };
    let contract = if deployments_available { contract.or_else(|| previous.contract.clone()) } else { previous.contract.clone() };

    ProviderStatus { conditions, installed_version, observed_generation: Some(generation), contract }
}

/// Deletes every applied component, in reverse writer order; called from
/// the finalizer cleanup path.
pub async fn delete_components(client: &Client, documents: &[Value]) -> Result<(), Vec<Error>> {
    crate::writer::delete_all(client, documents).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::common::FetchConfiguration;

    fn common_with_fetch(fetch_config: Option<FetchConfiguration>) -> ProviderSpecCommon {
        ProviderSpecCommon {
            version: None,
            fetch_config,
            config_secret: None,
            patches: Vec::new(),
            deployment: None,
            additional_manifests_ref: None,
            additional_deployments: Default::default(),
        }
    }

    #[test]
    fn preflight_rejects_missing_fetch_config() {
        let common = common_with_fetch(None);
        assert!(preflight(ProviderKind::Infrastructure, "docker", &common, false, true, None).is_err());
    }

    #[test]
    fn preflight_rejects_ambiguous_fetch_config() {
        let common = common_with_fetch(Some(FetchConfiguration {
            url: Some("https://example.invalid".into()),
            oci: Some("example.invalid/x:v1".into()),
            selector: None,
        }));
        assert!(preflight(ProviderKind::Infrastructure, "docker", &common, false, true, None).is_err());
    }

    #[test]
    fn preflight_rejects_second_core_provider() {
        let common = common_with_fetch(Some(FetchConfiguration {
            url: Some("https://example.invalid".into()),
            oci: None,
            selector: None,
        }));
        assert!(preflight(ProviderKind::Core, "cluster-api", &common, true, true, None).is_err());
    }

    #[test]
    fn preflight_rejects_non_core_kind_until_core_is_ready() {
        let common = common_with_fetch(Some(FetchConfiguration {
            url: Some("https://example.invalid".into()),
            oci: None,
            selector: None,
        }));
        assert!(preflight(ProviderKind::Infrastructure, "docker", &common, false, false, None).is_err());
    }

    #[test]
    fn preflight_rejects_unknown_bootstrap_provider_name() {
        let common = common_with_fetch(Some(FetchConfiguration {
            url: Some("https://example.invalid".into()),
            oci: None,
            selector: None,
        }));
        assert!(preflight(ProviderKind::Bootstrap, "made-up", &common, false, true, None).is_err());
    }

    #[test]
    fn preflight_rejects_incorrect_core_provider_name() {
        let common = common_with_fetch(Some(FetchConfiguration {
            url: Some("https://example.invalid".into()),
            oci: None,
            selector: None,
        }));
        assert!(preflight(ProviderKind::Core, "my-core", &common, false, true, None).is_err());
    }

    #[test]
    fn preflight_rejects_downgrade() {
        let mut common = common_with_fetch(Some(FetchConfiguration {
            url: Some("https://example.invalid".into()),
            oci: None,
            selector: None,
        }));
        common.version = Some("v1.7.0".to_string());
        assert!(preflight(ProviderKind::Infrastructure, "docker", &common, false, true, Some("v1.8.0")).is_err());
    }

    #[test]
    fn preflight_accepts_valid_spec() {
        let mut common = common_with_fetch(Some(FetchConfiguration {
            url: Some("https://example.invalid".into()),
            oci: None,
            selector: None,
        }));
        common.version = Some("v1.8.0".to_string());
        assert!(preflight(ProviderKind::Infrastructure, "docker", &common, false, true, None).is_ok());
        assert!(preflight(ProviderKind::Infrastructure, "docker", &common, false, true, Some("v1.7.0")).is_ok());
    }

    #[test]
    fn stale_component_diff_keys_on_gvk_and_name() {
        use serde_json::json;
        let a = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "x", "namespace": "ns"}});
        let b = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "y", "namespace": "ns"}});
        assert_ne!(document_identity(&a), document_identity(&b));
        assert_eq!(document_identity(&a), document_identity(&a.clone()));
    }

    #[test]
    fn report_status_holds_installed_until_deployment_available() {
        let previous = ProviderStatus::default();
        let status = report_status(&previous, 1, Some("v1.8.0"), false, None);
        assert!(!crate::util::status::is_status_condition_true(&status.conditions, PROVIDER_INSTALLED));
        assert!(!crate::util::status::is_status_condition_true(&status.conditions, READY));
        assert_eq!(status.installed_version, None);
    }

    #[test]
    fn report_status_advances_installed_version_once_available() {
        let previous = ProviderStatus::default();
        let status = report_status(&previous, 1, Some("v1.8.0"), true, Some("v1beta1".to_string()));
        assert!(crate::util::status::is_status_condition_true(&status.conditions, PROVIDER_INSTALLED));
        assert!(crate::util::status::is_status_condition_true(&status.conditions, READY));
        assert_eq!(status.installed_version.as_deref(), Some("v1.8.0"));
        assert_eq!(status.contract.as_deref(), Some("v1beta1"));
    }

    #[test]
    fn report_status_tracks_upgrade_in_progress() {
        let previous = ProviderStatus { installed_version: Some("v1.7.0".to_string()), ..Default::default() };
        let mid_upgrade = report_status(&previous, 2, Some("v1.8.0"), false, None);
        assert!(!crate::util::status::is_status_condition_true(&mid_upgrade.conditions, READY));
        assert_eq!(mid_upgrade.installed_version.as_deref(), Some("v1.7.0"));

        let done = report_status(&previous, 2, Some("v1.8.0"), true, Some("v1beta1".to_string()));
        assert!(crate::util::status::is_status_condition_true(&done.conditions, PROVIDER_UPGRADED));
        assert!(crate::util::status::is_status_condition_true(&done.conditions, READY));
        assert_eq!(done.installed_version.as_deref(), Some("v1.8.0"));
    }
}
