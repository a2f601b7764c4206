//! The generic reconciler: one `reconcile`/`error_policy`/`cleanup` triple
//! parameterized over [`ProviderResource`], replacing what would otherwise
//! be seven near-identical copies of the same reconcile/error-policy/cleanup
//! trio, one per provider kind.

use crate::api::hub::ProviderResource;
use crate::api::stored::FINALIZER;
use crate::controllers::context::Context;
use crate::controllers::phases;
use crate::types::ProviderKind;
use crate::util::errors::Error;
use kube::api::ListParams;
use kube::runtime::controller::Action;
use kube::runtime::events::{Event, EventType};
use kube::runtime::finalizer::{finalizer, Event as FinalizerEvent};
use kube::{Api, ResourceExt};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};

const REQUEUE_INTERVAL: Duration = Duration::from_secs(5 * 60);
const NOT_AVAILABLE_REQUEUE_INTERVAL: Duration = Duration::from_secs(10);

async fn apply_resource<K: ProviderResource>(resource: Arc<K>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = resource.name_any();
    let namespace = resource.namespace().unwrap_or_default();
    let generation = resource.meta().generation.unwrap_or(0);
    let common = resource.common().clone();
    let previous_status = resource.status().cloned().unwrap_or_default();

    info!(kind = %K::KIND, %name, %namespace, "reconciling provider");

    let core_already_exists = if K::KIND.is_singleton() {
        let all: Api<K> = Api::all(ctx.client.clone());
        let existing = all.list(&ListParams::default()).await.map_err(Error::from)?;
        existing.items.iter().any(|item| item.name_any() != name)
    } else {
        false
    };
    let core_ready =
        if K::KIND == ProviderKind::Core { true } else { phases::core_provider_ready(&ctx.client).await? };

    if let Err(e) = phases::preflight(
        K::KIND,
        &name,
        &common,
        core_already_exists,
        core_ready,
        previous_status.installed_version.as_deref(),
    ) {
        warn!("preflight failed for {name}: {e}");
        return Err(e);
    }

    let artifact = phases::fetch_components(ctx.client.clone(), &namespace, &ctx.fetch_cache, &common).await?;
    let variables = phases::resolve_variables(&ctx.client, &namespace, &common).await?;
    let (documents, contract) = phases::render_components(&artifact, &common, &namespace, &variables)?;

    let previous_documents = phases::previous_rendered_components(&ctx.client, &namespace, &name).await?;
    phases::delete_stale_components(&ctx.client, previous_documents.as_deref(), &documents).await?;
    phases::apply_components(&ctx.client, &documents).await?;
    phases::persist_rendered_components(&ctx.client, &namespace, &name, &documents).await?;

    let deployments_available = phases::deployments_available(&ctx.client, &documents).await?;
    let new_status =
        phases::report_status(&previous_status, generation, Some(artifact.version.as_str()), deployments_available, contract);

    let api: Api<K> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = kube::api::Patch::Merge(serde_json::json!({ "status": new_status }));
    api.patch_status(&name, &kube::api::PatchParams::default(), &patch)
        .await
        .map_err(Error::from)?;

    let requeue_after = if deployments_available { REQUEUE_INTERVAL } else { NOT_AVAILABLE_REQUEUE_INTERVAL };
    Ok(Action::requeue(requeue_after))
}

async fn cleanup<K: ProviderResource>(resource: Arc<K>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = resource.namespace().unwrap_or_default();
    let common = resource.common().clone();

    if let Ok(artifact) = phases::fetch_components(ctx.client.clone(), &namespace, &ctx.fetch_cache, &common).await {
        let variables = phases::resolve_variables(&ctx.client, &namespace, &common).await.unwrap_or_default();
        if let Ok((documents, _contract)) = phases::render_components(&artifact, &common, &namespace, &variables) {
            if let Err(errors) = phases::delete_components(&ctx.client, &documents).await {
                for e in errors {
                    warn!("error deleting component during cleanup: {e}");
                }
            }
        }
    }

    let recorder = ctx.diagnostics.read().await.recorder(ctx.client.clone());
    recorder
        .publish(
            &Event {
                type_: EventType::Normal,
                reason: "DeleteRequested".into(),
                note: Some(format!("Delete `{}`", resource.name_any())),
                action: "Deleting".into(),
                secondary: None,
            },
            &resource.object_ref(&()),
        )
        .await
        .map_err(Error::from)?;

    Ok(Action::await_change())
}

pub async fn reconcile<K: ProviderResource>(resource: Arc<K>, ctx: Arc<Context>) -> Result<Action, Error> {
    let _timer = ctx.metrics.count_and_measure(K::KIND.clusterctl_type());
    ctx.diagnostics.write().await.last_event = chrono::Utc::now();

    let namespace = resource.namespace().unwrap_or_default();
    let api: Api<K> = Api::namespaced(ctx.client.clone(), &namespace);

    finalizer(&api, FINALIZER, resource, |event| async {
        match event {
            FinalizerEvent::Apply(resource) => apply_resource(resource, ctx.clone()).await,
            FinalizerEvent::Cleanup(resource) => cleanup(resource, ctx.clone()).await,
        }
    })
    .await
    .map_err(|e| Error::StdError(crate::util::errors::StdError::FinalizerError(Box::new(e))))
}

pub fn error_policy<K: ProviderResource>(resource: Arc<K>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(kind = %K::KIND, name = %resource.name_any(), %error, "reconcile failed");
    ctx.metrics.reconcile_failure(K::KIND.clusterctl_type(), &resource.name_any(), error);
    match error {
        Error::ErrorWithRequeue(e) => Action::requeue(e.duration),
        _ => Action::requeue(crate::util::errors::backoff_duration(0)),
    }
}
