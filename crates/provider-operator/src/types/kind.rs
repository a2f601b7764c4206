//! The provider type registry: a closed mapping from [`ProviderKind`] to
//! its clusterctl type code, default target namespace, and plural
//! short-name, used by the CLI's provider-argument parser, the reconciler's
//! per-kind factory, and `capi-crdgen`.

use core::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    Core,
    Bootstrap,
    ControlPlane,
    Infrastructure,
    Ipam,
    Addon,
    RuntimeExtension,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 7] = [
        ProviderKind::Core,
        ProviderKind::Bootstrap,
        ProviderKind::ControlPlane,
        ProviderKind::Infrastructure,
        ProviderKind::Ipam,
        ProviderKind::Addon,
        ProviderKind::RuntimeExtension,
    ];

    /// The clusterctl type code used for upstream repository lookup.
    pub fn clusterctl_type(self) -> &'static str {
        match self {
            ProviderKind::Core => "CoreProvider",
            ProviderKind::Bootstrap => "BootstrapProvider",
            ProviderKind::ControlPlane => "ControlPlaneProvider",
            ProviderKind::Infrastructure => "InfrastructureProvider",
            ProviderKind::Ipam => "IPAMProvider",
            ProviderKind::Addon => "AddonProvider",
            ProviderKind::RuntimeExtension => "RuntimeExtensionProvider",
        }
    }

    pub fn default_namespace(self) -> &'static str {
        match self {
            ProviderKind::Core => "capi-system",
            ProviderKind::Bootstrap => "capi-kubeadm-bootstrap-system",
            ProviderKind::ControlPlane => "capi-kubeadm-control-plane-system",
            ProviderKind::Infrastructure => "capi-infra-system",
            ProviderKind::Ipam => "capi-ipam-system",
            ProviderKind::Addon => "capi-addon-system",
            ProviderKind::RuntimeExtension => "capi-runtime-extension-system",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            ProviderKind::Core => "coreproviders",
            ProviderKind::Bootstrap => "bootstrapproviders",
            ProviderKind::ControlPlane => "controlplaneproviders",
            ProviderKind::Infrastructure => "infrastructureproviders",
            ProviderKind::Ipam => "ipamproviders",
            ProviderKind::Addon => "addonproviders",
            ProviderKind::RuntimeExtension => "runtimeextensionproviders",
        }
    }

    /// At most one CR of this kind may ever exist cluster-wide.
    pub fn is_singleton(self) -> bool {
        matches!(self, ProviderKind::Core)
    }

    pub fn from_clusterctl_type(code: &str) -> Option<ProviderKind> {
        ProviderKind::ALL.into_iter().find(|k| k.clusterctl_type() == code)
    }

    /// The closed set of provider names clusterctl recognizes for kinds
    /// whose implementations are maintained in-tree. Kinds left open here
    /// (infrastructure, addon, IPAM, runtime extension) accept any name,
    /// matching their extensible real-world ecosystem.
    pub fn known_names(self) -> Option<&'static [&'static str]> {
        match self {
            ProviderKind::Core => Some(&["cluster-api"]),
            ProviderKind::Bootstrap => Some(&["kubeadm"]),
            ProviderKind::ControlPlane => Some(&["kubeadm"]),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.clusterctl_type())
    }
}
