//! The hub (`v1alpha3`) provider schema: all manager tuning lives in the
//! args of a synthetic manager container inside `deployment.containers`
//! rather than a nested `Manager` object. This is the in-memory form the
//! generic reconciler operates on; `api::conversion` bridges it to the
//! stored schema on read/write.

use crate::api::common::{
    AdditionalManifestsReference, ConfigSecretReference, DeploymentOverride, FetchConfiguration, Patch,
    ProviderStatus,
};
use crate::types::ProviderKind;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Implemented by every generated provider wrapper type so the generic
/// reconciler (`controllers::engine`) can operate on all seven kinds
/// through one code path instead of seven near-identical ones.
pub trait ProviderResource:
    kube::Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>
    + Clone
    + std::fmt::Debug
    + Send
    + Sync
    + Serialize
    + serde::de::DeserializeOwned
    + 'static
{
    const KIND: ProviderKind;

    fn common(&self) -> &ProviderSpecCommon;
    fn status(&self) -> Option<&ProviderStatus>;
    fn set_status(&mut self, status: ProviderStatus);
}

/// Fields common to all seven provider kinds in the hub schema.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct ProviderSpecCommon {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_config: Option<FetchConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<ConfigSecretReference>,
    /// Ordered list of targeted patches (hub schema only).
    #[serde(default)]
    pub patches: Vec<Patch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_manifests_ref: Option<AdditionalManifestsReference>,
    #[serde(default)]
    pub additional_deployments: BTreeMap<String, DeploymentOverride>,
}

macro_rules! define_provider {
    ($spec:ident, $wrapper:ident, $kind:literal, $shortname:literal, $provider_kind:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
        #[cfg_attr(test, derive(Default))]
        #[kube(
            kind = $kind,
            group = "operator.cluster.x-k8s.io",
            version = "v1alpha3",
            namespaced
        )]
        #[kube(status = "ProviderStatus", shortname = $shortname)]
        pub struct $spec {
            #[serde(flatten)]
            pub common: ProviderSpecCommon,
        }

        impl ProviderResource for $wrapper {
            const KIND: ProviderKind = $provider_kind;

            fn common(&self) -> &ProviderSpecCommon {
                &self.spec.common
            }

            fn status(&self) -> Option<&ProviderStatus> {
                self.status.as_ref()
            }

            fn set_status(&mut self, status: ProviderStatus) {
                self.status = Some(status);
            }
        }
    };
}

define_provider!(
    CoreProviderSpec,
    CoreProvider,
    "CoreProvider",
    "core",
    ProviderKind::Core,
    "The Core CAPI provider (hub schema)."
);
define_provider!(
    BootstrapProviderSpec,
    BootstrapProvider,
    "BootstrapProvider",
    "bootstrap",
    ProviderKind::Bootstrap,
    "A Bootstrap provider (hub schema)."
);
define_provider!(
    ControlPlaneProviderSpec,
    ControlPlaneProvider,
    "ControlPlaneProvider",
    "cp",
    ProviderKind::ControlPlane,
    "A ControlPlane provider (hub schema)."
);
define_provider!(
    InfrastructureProviderSpec,
    InfrastructureProvider,
    "InfrastructureProvider",
    "infra",
    ProviderKind::Infrastructure,
    "An Infrastructure provider (hub schema)."
);
define_provider!(
    IpamProviderSpec,
    IPAMProvider,
    "IPAMProvider",
    "ipam",
    ProviderKind::Ipam,
    "An IPAM provider (hub schema)."
);
define_provider!(
    AddonProviderSpec,
    AddonProvider,
    "AddonProvider",
    "addon",
    ProviderKind::Addon,
    "An Addon provider (hub schema)."
);
define_provider!(
    RuntimeExtensionProviderSpec,
    RuntimeExtensionProvider,
    "RuntimeExtensionProvider",
    "re",
    ProviderKind::RuntimeExtension,
    "A RuntimeExtension provider (hub schema)."
);
