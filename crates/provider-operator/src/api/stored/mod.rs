//! The stored (`v1alpha2`) provider schema: the `ProviderSpec` shape with
//! an explicit `Manager` sub-object, persisted to etcd. This is the schema
//! version served by the Kubernetes API server; the hub schema
//! (`api::hub`) is the in-memory form the conversion webhook produces on
//! read.

pub mod manager;

pub use manager::Manager;

use crate::api::common::{
    AdditionalManifestsReference, ConfigSecretReference, DeploymentOverride, FetchConfiguration, ProviderStatus,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FINALIZER: &str = "provider.cluster.x-k8s.io";

/// Fields common to all seven provider kinds in the stored schema.
/// Flattened into each kind's generated `*Spec` struct so the
/// `kube::CustomResource` derive, which must run once per distinct kind,
/// does not require re-declaring every field per kind.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct ProviderSpecCommon {
    /// Semver string; empty/absent means "latest known".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_config: Option<FetchConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<ConfigSecretReference>,
    /// Ordered list of whole-document merge patches (stored schema only).
    #[serde(default)]
    pub manifest_patches: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_manifests_ref: Option<AdditionalManifestsReference>,
    #[serde(default)]
    pub additional_deployments: BTreeMap<String, DeploymentOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<Manager>,
}

macro_rules! define_provider {
    ($spec:ident, $kind:literal, $shortname:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
        #[cfg_attr(test, derive(Default))]
        #[kube(
            kind = $kind,
            group = "operator.cluster.x-k8s.io",
            version = "v1alpha2",
            namespaced
        )]
        #[kube(status = "ProviderStatus", shortname = $shortname)]
        pub struct $spec {
            #[serde(flatten)]
            pub common: ProviderSpecCommon,
        }
    };
}

define_provider!(
    CoreProviderSpec,
    "CoreProvider",
    "core",
    "The Core CAPI provider (stored schema). At most one may exist cluster-wide."
);
define_provider!(
    BootstrapProviderSpec,
    "BootstrapProvider",
    "bootstrap",
    "A Bootstrap provider (stored schema)."
);
define_provider!(
    ControlPlaneProviderSpec,
    "ControlPlaneProvider",
    "cp",
    "A ControlPlane provider (stored schema)."
);
define_provider!(
    InfrastructureProviderSpec,
    "InfrastructureProvider",
    "infra",
    "An Infrastructure provider (stored schema)."
);
define_provider!(IpamProviderSpec, "IPAMProvider", "ipam", "An IPAM provider (stored schema).");
define_provider!(AddonProviderSpec, "AddonProvider", "addon", "An Addon provider (stored schema).");
define_provider!(
    RuntimeExtensionProviderSpec,
    "RuntimeExtensionProvider",
    "re",
    "A RuntimeExtension provider (stored schema)."
);
