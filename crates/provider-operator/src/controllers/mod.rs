//! The generic reconciler: a provider-kind-parameterized `Controller`
//! engine, driven once per kind from [`run_all`].

pub mod context;
pub mod engine;
pub mod phases;
pub mod watch;

pub use context::{Context, Diagnostics, State};

use crate::api::hub::{
    AddonProvider, BootstrapProvider, ControlPlaneProvider, CoreProvider, InfrastructureProvider, RuntimeExtensionProvider,
    IPAMProvider,
};
use kube::Client;

/// Runs all seven provider-kind controllers concurrently until the process
/// exits.
pub async fn run_all(client: Client, state: State) {
    futures::future::join_all(vec![
        tokio::spawn(watch::run_for_kind::<CoreProvider>(client.clone(), state.clone())),
        tokio::spawn(watch::run_for_kind::<BootstrapProvider>(client.clone(), state.clone())),
        tokio::spawn(watch::run_for_kind::<ControlPlaneProvider>(client.clone(), state.clone())),
        tokio::spawn(watch::run_for_kind::<InfrastructureProvider>(client.clone(), state.clone())),
        tokio::spawn(watch::run_for_kind::<IPAMProvider>(client.clone(), state.clone())),
        tokio::spawn(watch::run_for_kind::<AddonProvider>(client.clone(), state.clone())),
        tokio::spawn(watch::run_for_kind::<RuntimeExtensionProvider>(client, state)),
    ])
    .await;
}
