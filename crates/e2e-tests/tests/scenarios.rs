//! Live-cluster scenario tests plus one pure conversion check. Most of
//! these require the provider CRDs and the `capi-operator`/
//! `capi-conversion-webhook` binaries already running against the current
//! kubeconfig context, so they are `#[ignore]`d by default:
//! `cargo test -p e2e-tests -- --ignored`.

use e2e_tests::{wait_for, BackoffConfig, TestEnv};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Patch as KubePatch, PatchParams, PostParams};
use kube::Api;
use provider_operator::api::common::{AdditionalManifestsReference, Patch, PatchSelector, ProviderStatus};
use provider_operator::api::conversion::manager_to_args;
use provider_operator::api::hub;
use provider_operator::api::stored::{manager::LeaderElectionConfig, CoreProvider, CoreProviderSpec, InfrastructureProvider, InfrastructureProviderSpec, Manager, ProviderSpecCommon};
use serde_json::json;
use std::collections::BTreeMap;

fn has_condition(status: &ProviderStatus, kind: &str, value: &str) -> bool {
    status.conditions.iter().any(|c| c.type_ == kind && c.status == value)
}

fn condition_reason(status: &ProviderStatus, kind: &str) -> Option<String> {
    status.conditions.iter().find(|c| c.type_ == kind).map(|c| c.reason.clone())
}

#[tokio::test]
#[ignore = "uses the current kubeconfig context against a live cluster"]
async fn init_reaches_ready_with_installed_version() {
    let env = TestEnv::new("capi-system").await.unwrap();
    let api: Api<CoreProvider> = Api::namespaced(env.client.clone(), &env.namespace);

    let cr = CoreProvider::new(
        "cluster-api",
        CoreProviderSpec {
            common: ProviderSpecCommon { version: Some("v1.8.0".to_string()), ..Default::default() },
        },
    );
    api.create(&PostParams::default(), &cr).await.unwrap();

    let ready = wait_for("core provider ready", &BackoffConfig::default(), || async {
        let current = api.get("cluster-api").await.ok()?;
        let status = current.status?;
        (has_condition(&status, "Ready", "True") && status.installed_version.as_deref() == Some("v1.8.0"))
            .then_some(())
    })
    .await;
    assert!(ready.is_some(), "CoreProvider never reached Ready=True with installedVersion v1.8.0");

    let deployments: Api<Deployment> = Api::namespaced(env.client.clone(), &env.namespace);
    let deployment = deployments.get("capi-controller-manager").await.unwrap();
    let available = deployment
        .status
        .and_then(|s| s.conditions)
        .unwrap_or_default()
        .into_iter()
        .any(|c| c.type_ == "Available" && c.status == "True");
    assert!(available, "capi-controller-manager Deployment never became Available");

    env.cleanup::<CoreProvider>("cluster-api").await;
}

#[tokio::test]
#[ignore = "uses the current kubeconfig context against a live cluster"]
async fn second_core_provider_is_rejected_as_duplicate() {
    let env = TestEnv::new("capi-system").await.unwrap();
    let api: Api<CoreProvider> = Api::namespaced(env.client.clone(), &env.namespace);

    let second = CoreProvider::new("cluster-api-other", CoreProviderSpec { common: ProviderSpecCommon::default() });
    api.create(&PostParams::default(), &second).await.unwrap();

    let preflight_failed = wait_for("duplicate core rejected", &BackoffConfig::default(), || async {
        let current = api.get("cluster-api-other").await.ok()?;
        let status = current.status?;
        (!has_condition(&status, "PreflightCheckPassed", "True")
            && condition_reason(&status, "PreflightCheckPassed").as_deref() == Some("MoreThanOneExists"))
        .then_some(())
    })
    .await;
    assert!(preflight_failed.is_some(), "second CoreProvider should fail preflight with MoreThanOneExists");

    let deployments: Api<Deployment> = Api::namespaced(env.client.clone(), &env.namespace);
    assert!(deployments.get("cluster-api-other-controller-manager").await.is_err());

    env.cleanup::<CoreProvider>("cluster-api-other").await;
}

/// Scenario 3 is a pure property of the conversion layer: it needs no
/// cluster, so it runs unconditionally alongside the unit tests.
#[test]
fn manager_settings_convert_to_sorted_container_args() {
    let manager = Manager {
        sync_period: Some("30s".to_string()),
        leader_election: Some(LeaderElectionConfig {
            leader_elect: Some(true),
            resource_namespace: Some("ns".to_string()),
            resource_name: Some("lock".to_string()),
            ..Default::default()
        }),
        feature_gates: BTreeMap::from([("A".to_string(), true), ("B".to_string(), false)]),
        ..Default::default()
    };

    let args = manager_to_args(&manager);
    assert!(args.contains(&"--sync-period=30s".to_string()));
    assert!(args.contains(&"--leader-elect=true".to_string()));
    assert!(args.contains(&"--leader-election-id=ns/lock".to_string()));
    assert!(args.contains(&"--feature-gates=A=true,B=false".to_string()));
}

#[tokio::test]
#[ignore = "uses the current kubeconfig context against a live cluster"]
async fn five_targeted_patches_apply_in_order() {
    let env = TestEnv::new("capi-system").await.unwrap();
    let api: Api<hub::InfrastructureProvider> = Api::namespaced(env.client.clone(), &env.namespace);

    let patches = vec![
        Patch {
            target: PatchSelector { kind: Some("ClusterRoleBinding".to_string()), ..Default::default() },
            patch: json!([{"op": "add", "path": "/subjects/-", "value": {"kind": "ServiceAccount", "name": "extra", "namespace": "capi-system"}}]).to_string(),
        },
        Patch {
            target: PatchSelector { kind: Some("Service".to_string()), ..Default::default() },
            patch: json!({"metadata": {"labels": {"test-label": "test-value"}}}).to_string(),
        },
        Patch {
            target: PatchSelector { kind: Some("Service".to_string()), ..Default::default() },
            patch: json!({"spec": {"selector": null}}).to_string(),
        },
        Patch {
            target: PatchSelector { kind: Some("Service".to_string()), ..Default::default() },
            patch: json!({"spec": {"selector": {"test-label": "test-value"}}}).to_string(),
        },
        Patch {
            target: PatchSelector { kind: Some("Service".to_string()), name: Some("s2".to_string()), ..Default::default() },
            patch: json!([{"op": "replace", "path": "/spec/ports/0/port", "value": 7777}]).to_string(),
        },
    ];

    let cr = hub::InfrastructureProvider::new(
        "docker-patched",
        hub::InfrastructureProviderSpec {
            common: hub::ProviderSpecCommon {
                additional_manifests_ref: Some(AdditionalManifestsReference {
                    name: "docker-patched-fixture-manifests".to_string(),
                }),
                patches,
                ..Default::default()
            },
        },
    );
    api.create(&PostParams::default(), &cr).await.unwrap();

    let services: Api<Service> = Api::namespaced(env.client.clone(), &env.namespace);
    let both_labeled = wait_for("services acquire test-label", &BackoffConfig::default(), || async {
        let s1 = services.get("s1").await.ok()?;
        let s2 = services.get("s2").await.ok()?;
        let labeled = |s: &Service| {
            s.metadata.labels.as_ref().and_then(|l| l.get("test-label")).map(|v| v == "test-value").unwrap_or(false)
        };
        (labeled(&s1) && labeled(&s2)).then_some((s1, s2))
    })
    .await;
    let (s1, s2) = both_labeled.expect("both services should acquire test-label");

    assert_eq!(s1.spec.as_ref().and_then(|s| s.selector.as_ref()).and_then(|m| m.get("test-label")), Some(&"test-value".to_string()));
    assert_eq!(s2.spec.as_ref().and_then(|s| s.selector.as_ref()).and_then(|m| m.get("test-label")), Some(&"test-value".to_string()));
    assert_eq!(s2.spec.as_ref().and_then(|s| s.ports.as_ref()).and_then(|p| p.first()).map(|p| p.port), Some(7777));
    assert_ne!(s1.spec.as_ref().and_then(|s| s.ports.as_ref()).and_then(|p| p.first()).map(|p| p.port), Some(7777));

    env.cleanup::<hub::InfrastructureProvider>("docker-patched").await;
}

#[tokio::test]
#[ignore = "uses the current kubeconfig context against a live cluster"]
async fn upgrade_replaces_version_and_removes_stale_objects() {
    let env = TestEnv::new("capi-system").await.unwrap();
    let api: Api<InfrastructureProvider> = Api::namespaced(env.client.clone(), &env.namespace);

    let cr = InfrastructureProvider::new(
        "docker-upgrade",
        InfrastructureProviderSpec {
            common: ProviderSpecCommon { version: Some("v1.8.0".to_string()), ..Default::default() },
        },
    );
    api.create(&PostParams::default(), &cr).await.unwrap();
    wait_for("initial install completes", &BackoffConfig::default(), || async {
        let current = api.get("docker-upgrade").await.ok()?;
        current.status?.installed_version.as_deref().eq(&Some("v1.8.0")).then_some(())
    })
    .await
    .expect("v1.8.0 never installed");

    api.patch(
        "docker-upgrade",
        &PatchParams::default(),
        &KubePatch::Merge(json!({"spec": {"version": "v1.9.0"}})),
    )
    .await
    .unwrap();

    let upgraded = wait_for("upgrade to v1.9.0 completes", &BackoffConfig::default(), || async {
        let current = api.get("docker-upgrade").await.ok()?;
        let status = current.status?;
        (has_condition(&status, "ProviderUpgraded", "True") && status.installed_version.as_deref() == Some("v1.9.0"))
            .then_some(())
    })
    .await;
    assert!(upgraded.is_some(), "docker-upgrade never transitioned installedVersion to v1.9.0");

    env.cleanup::<InfrastructureProvider>("docker-upgrade").await;
}

#[tokio::test]
#[ignore = "uses the current kubeconfig context against a live cluster"]
async fn delete_removes_objects_and_finalizer() {
    let env = TestEnv::new("capi-system").await.unwrap();
    let api: Api<InfrastructureProvider> = Api::namespaced(env.client.clone(), &env.namespace);

    let cr = InfrastructureProvider::new("docker-delete", InfrastructureProviderSpec { common: ProviderSpecCommon::default() });
    api.create(&PostParams::default(), &cr).await.unwrap();
    wait_for("install completes before delete", &BackoffConfig::default(), || async {
        let current = api.get("docker-delete").await.ok()?;
        current.status?.installed_version.is_some().then_some(())
    })
    .await
    .expect("docker-delete never installed");

    api.delete("docker-delete", &kube::api::DeleteParams::default()).await.unwrap();

    let gone = wait_for("CR disappears after finalizer runs", &BackoffConfig::default(), || async {
        api.get("docker-delete").await.err().map(|_| ())
    })
    .await;
    assert!(gone.is_some(), "docker-delete InfrastructureProvider was not removed");
}
