//! Runs the render steps in order: CAPI contract validation, variable
//! substitution, YAML parsing, namespace rewrite, deployment/container
//! overrides, patch application, then emits the final authoritative
//! components `ConfigMap`.

use crate::api::common::Patch;
use crate::api::hub::ProviderSpecCommon;
use crate::render::{overrides, variables};
use crate::util::conditions::PreflightCheckReason;
use crate::util::errors::{Error, StdError};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use semver::Version;
use serde::de::Error as _;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// The CAPI contract versions this operator's render pipeline supports; a
/// provider declaring any other contract in its metadata fails preflight
/// rather than deploying components this operator can't reason about.
const SUPPORTED_CONTRACTS: &[&str] = &["v1beta1"];

pub struct RenderInput<'a> {
    pub raw_documents: &'a [String],
    pub variables: &'a BTreeMap<String, String>,
    pub namespace: &'a str,
    pub spec: &'a ProviderSpecCommon,
    pub metadata: Option<&'a str>,
}

/// clusterctl's own `metadata.yaml` shape: a list of release series, each
/// naming the CAPI contract its major.minor line implements.
#[derive(Deserialize, Debug)]
struct ProviderMetadata {
    #[serde(rename = "releaseSeries", default)]
    release_series: Vec<ReleaseSeriesEntry>,
}

#[derive(Deserialize, Debug)]
struct ReleaseSeriesEntry {
    major: u64,
    minor: u64,
    contract: String,
}

fn parse_documents(text: &str) -> Result<Vec<Value>, Error> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document)
            .map_err(|e| Error::StdError(StdError::YamlError(serde_yaml::Error::custom(e.to_string()))))?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

/// Resolves `version`'s declared CAPI contract from `metadata` and checks it
/// against [`SUPPORTED_CONTRACTS`], returning the contract string on success.
pub fn resolve_contract(metadata: &str, version: &str) -> Result<String, Error> {
    let parsed: ProviderMetadata =
        serde_yaml::from_str(metadata).map_err(|e| Error::StdError(StdError::YamlError(e)))?;
    let parsed_version = Version::parse(version.trim_start_matches('v')).map_err(|e| {
        Error::StdError(StdError::Validation(format!("`{version}` is not a valid semver version: {e}")))
    })?;

    let entry = parsed
        .release_series
        .iter()
        .find(|e| e.major == parsed_version.major && e.minor == parsed_version.minor)
        .ok_or_else(|| {
            Error::StdError(StdError::Validation(format!(
                "{}: metadata declares no release series for {}.{}",
                PreflightCheckReason::CAPIVersionIncompatibility, parsed_version.major, parsed_version.minor
            )))
        })?;

    if !SUPPORTED_CONTRACTS.contains(&entry.contract.as_str()) {
        return Err(Error::StdError(StdError::Validation(format!(
            "{}: declared contract `{}` is not among the supported contracts {:?}",
            PreflightCheckReason::CAPIVersionIncompatibility, entry.contract, SUPPORTED_CONTRACTS
        ))));
    }

    Ok(entry.contract.clone())
}

/// Runs the full render pipeline and returns the final set of manifest
/// documents (as JSON values, ready to hand to the writer).
pub fn render(input: RenderInput<'_>) -> Result<Vec<Value>, Error> {
    if let Some(metadata) = input.metadata {
        let version = input.spec.version.as_deref().unwrap_or("0.0.0");
        resolve_contract(metadata, version)?;
    }

    let mut documents = Vec::new();
    for raw in input.raw_documents {
        let substituted = variables::substitute_required(raw, input.variables)?;
        documents.extend(parse_documents(&substituted)?);
    }

    overrides::rewrite_namespace(&mut documents, input.namespace);

    if let Some(deployment) = &input.spec.deployment {
        overrides::apply_deployment_override(&mut documents, "", deployment);
    }
    for (name, deployment) in &input.spec.additional_deployments {
        overrides::apply_deployment_override(&mut documents, name, deployment);
    }

    apply_patches(&mut documents, &input.spec.patches)?;

    Ok(documents)
}

fn apply_patches(documents: &mut [Value], patches: &[Patch]) -> Result<(), Error> {
    crate::patch::apply_hub_patches(documents, patches)
}

/// Builds the authoritative `ConfigMap` recording exactly the rendered
/// documents applied for this provider, keyed by an index per document.
pub fn components_configmap(name: &str, namespace: &str, documents: &[Value]) -> Result<ConfigMap, Error> {
    let mut data = BTreeMap::new();
    for (i, document) in documents.iter().enumerate() {
        let yaml = serde_yaml::to_string(document).map_err(|e| Error::StdError(StdError::YamlError(e)))?;
        data.insert(format!("{i:04}.yaml"), yaml);
    }

    Ok(ConfigMap {
        metadata: ObjectMeta {
            name: Some(format!("{name}-components")),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    })
}
