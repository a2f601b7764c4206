//! Harness for the live-cluster end-to-end scenarios in `tests/`. Requires
//! a real cluster reachable via the current kubeconfig context with the
//! provider CRDs and the operator already installed; every test using this
//! harness is `#[ignore]`d by default.

pub mod waiting;

use kube::{Client, ResourceExt};
use tracing::info;

pub use waiting::{wait_for, BackoffConfig};

pub struct TestEnv {
    pub client: Client,
    pub namespace: String,
}

impl TestEnv {
    pub async fn new(namespace: &str) -> anyhow::Result<Self> {
        rustls::crypto::CryptoProvider::install_default(rustls::crypto::aws_lc_rs::default_provider()).ok();
        let client = Client::try_default().await?;
        info!(namespace, "connected to cluster for end-to-end test");
        Ok(Self { client, namespace: namespace.to_string() })
    }

    pub async fn cleanup<K>(&self, name: &str)
    where
        K: kube::Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>
            + Clone
            + std::fmt::Debug
            + serde::de::DeserializeOwned
            + 'static,
    {
        let api: kube::Api<K> = kube::Api::namespaced(self.client.clone(), &self.namespace);
        if let Err(e) = api.delete(name, &kube::api::DeleteParams::default()).await {
            tracing::warn!(name, error = %e, "cleanup delete failed, continuing");
        }
    }
}

pub fn name_of<K: ResourceExt>(resource: &K) -> String {
    resource.name_any()
}
