//! Per-kind `Controller` wiring: one generic function instantiated once
//! per provider kind rather than duplicated seven times.

use crate::api::hub::ProviderResource;
use crate::controllers::context::State;
use crate::controllers::engine::{error_policy, reconcile};
use futures::StreamExt;
use kube::runtime::{controller::Controller, watcher::Config};
use kube::{Api, Client};
use tracing::{error, info};

/// Starts one `Controller` for `K`, running until the process exits. Exits
/// the process if the CRD is not yet installed.
pub async fn run_for_kind<K: ProviderResource>(client: Client, state: State) {
    let api = Api::<K>::all(client.clone());
    if let Err(e) = api.list(&kube::api::ListParams::default().limit(1)).await {
        error!("{} CRD is not queryable; {e:?}. Is the CRD installed?", K::KIND);
        info!("Installation: capi-crdgen | kubectl apply -f -");
        std::process::exit(1);
    }

    Controller::new(api, Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile::<K>, error_policy::<K>, state.to_context(client))
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
}
