//! Emits the CustomResourceDefinition YAML for all seven provider kinds.
//!
//! Each kind has two schema versions (`v1alpha2`, stored; `v1alpha3`, hub),
//! merged into a single multi-version CRD the way `clusterctl`-style
//! providers ship them, with conversion delegated to the conversion
//! webhook rather than handled in-cluster by the API server.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceConversion, CustomResourceDefinition, ServiceReference, WebhookClientConfig, WebhookConversion,
};
use kube::core::crd::merge_crds;
use kube::CustomResourceExt as _;
use provider_operator::api::{hub, stored};

const CONVERSION_WEBHOOK_SERVICE: &str = "capi-conversion-webhook";
const CONVERSION_WEBHOOK_NAMESPACE: &str = "capi-system";
const CONVERSION_WEBHOOK_PATH: &str = "/convert";

fn with_conversion_webhook(mut crd: CustomResourceDefinition) -> CustomResourceDefinition {
    crd.spec.conversion = Some(CustomResourceConversion {
        strategy: "Webhook".to_string(),
        webhook: Some(WebhookConversion {
            conversion_review_versions: vec!["v1".to_string()],
            client_config: Some(WebhookClientConfig {
                service: Some(ServiceReference {
                    name: CONVERSION_WEBHOOK_SERVICE.to_string(),
                    namespace: CONVERSION_WEBHOOK_NAMESPACE.to_string(),
                    path: Some(CONVERSION_WEBHOOK_PATH.to_string()),
                    port: Some(443),
                }),
                ..Default::default()
            }),
        }),
    });
    crd
}

fn merged<A: kube::CustomResourceExt, B: kube::CustomResourceExt>() -> CustomResourceDefinition {
    with_conversion_webhook(
        merge_crds(vec![A::crd(), B::crd()], "v1").expect("stored and hub CRDs share group/kind/plural"),
    )
}

fn main() {
    let crds = vec![
        merged::<stored::CoreProviderSpec, hub::CoreProviderSpec>(),
        merged::<stored::BootstrapProviderSpec, hub::BootstrapProviderSpec>(),
        merged::<stored::ControlPlaneProviderSpec, hub::ControlPlaneProviderSpec>(),
        merged::<stored::InfrastructureProviderSpec, hub::InfrastructureProviderSpec>(),
        merged::<stored::IpamProviderSpec, hub::IpamProviderSpec>(),
        merged::<stored::AddonProviderSpec, hub::AddonProviderSpec>(),
        merged::<stored::RuntimeExtensionProviderSpec, hub::RuntimeExtensionProviderSpec>(),
    ];

    for (i, crd) in crds.iter().enumerate() {
        if i > 0 {
            println!("---");
        }
        print!("{}", serde_yaml::to_string(crd).unwrap());
    }
}
