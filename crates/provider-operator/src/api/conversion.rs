//! The schema conversion layer. Bridges the stored schema (`api::stored`,
//! explicit `Manager`) and the hub schema (`api::hub`, container args), via
//! the synthetic-container strategy: manager tuning is folded into a
//! container with an empty name, appended to `deployment.containers`.
//!
//! The argument-mapping table is expressed as plain encode/decode
//! functions rather than fourteen hand-written branches, so it stays easy
//! to audit flag by flag.

use crate::api::common::{ContainerOverride, DeploymentOverride};
use crate::api::hub;
use crate::api::stored::{self, Manager};
use std::collections::BTreeMap;

/// The manager's args live on a container with this (empty) name, appended
/// to the end of `deployment.containers` — never matched by name lookups
/// against real manifest containers.
pub const MANAGER_CONTAINER_NAME: &str = "";

fn duration_arg(value: &str) -> String {
    if value.chars().last().is_some_and(|c| c.is_ascii_alphabetic()) {
        value.to_string()
    } else {
        format!("{value}s")
    }
}

fn push_flag(args: &mut Vec<String>, flag: &str, value: impl std::fmt::Display) {
    args.push(format!("--{flag}={value}"));
}

/// Encodes a `Manager` into the closed set of `--flag=value` arguments, in
/// table-declaration order.
pub fn manager_to_args(manager: &Manager) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(sync_period) = &manager.sync_period {
        push_flag(&mut args, "sync-period", duration_arg(sync_period));
    }
    if let Some(le) = &manager.leader_election {
        if let Some(leader_elect) = le.leader_elect {
            push_flag(&mut args, "leader-elect", leader_elect);
        }
        if let (Some(ns), Some(name)) = (&le.resource_namespace, &le.resource_name) {
            push_flag(&mut args, "leader-election-id", format!("{ns}/{name}"));
        }
        if let Some(lease) = &le.lease_duration {
            push_flag(&mut args, "leader-elect-lease-duration", duration_arg(lease));
        }
        if let Some(renew) = &le.renew_deadline {
            push_flag(&mut args, "leader-elect-renew-deadline", duration_arg(renew));
        }
        if let Some(retry) = &le.retry_period {
            push_flag(&mut args, "leader-elect-retry-period", duration_arg(retry));
        }
    }
    if let Some(ns) = &manager.cache_namespace {
        push_flag(&mut args, "namespace", ns);
    }
    if let Some(health) = &manager.health {
        if let Some(addr) = &health.health_probe_bind_address {
            push_flag(&mut args, "health-addr", addr);
        }
    }
    if let Some(metrics) = &manager.metrics {
        if let Some(addr) = &metrics.bind_address {
            push_flag(&mut args, "metrics-bind-addr", addr);
        }
    }
    if let Some(webhook) = &manager.webhook {
        if let Some(host) = &webhook.host {
            push_flag(&mut args, "webhook-host", host);
        }
        if let Some(port) = webhook.port {
            push_flag(&mut args, "webhook-port", port);
        }
        if let Some(cert_dir) = &webhook.cert_dir {
            push_flag(&mut args, "webhook-cert-dir", cert_dir);
        }
    }
    if let Some(addr) = &manager.profiler_address {
        push_flag(&mut args, "profiler-address", addr);
    }
    if let Some(n) = manager.max_concurrent_reconciles {
        push_flag(&mut args, "max-concurrent-reconciles", n);
    }
    if let Some(v) = manager.verbosity {
        if v != 0 && v != 1 {
            push_flag(&mut args, "v", v);
        }
    }
    if !manager.feature_gates.is_empty() {
        let joined = manager
            .feature_gates
            .iter()
            .collect::<BTreeMap<_, _>>() // BTreeMap already sorts by key
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        push_flag(&mut args, "feature-gates", joined);
    }
    if let Some(controller) = &manager.controller {
        for (kind, concurrency) in &controller.group_kind_concurrency {
            push_flag(&mut args, &format!("{}-concurrency", kind.to_lowercase()), concurrency);
        }
    }
    for (key, value) in &manager.additional_args {
        args.push(format!("--{key}={value}"));
    }

    args
}

fn split_flag(arg: &str) -> Option<(&str, &str)> {
    let rest = arg.strip_prefix("--")?;
    rest.split_once('=')
}

/// Decodes the synthetic container's args back into a `Manager`. Any arg
/// that matches no known mapping is dropped rather than carried forward:
/// this direction is intentionally lossy, and only repeated round trips of
/// an already-converted object are guaranteed stable.
pub fn args_to_manager(args: &[String]) -> Manager {
    use stored::manager::{ControllerConfig, HealthConfig, LeaderElectionConfig, MetricsConfig, WebhookConfig};

    let mut manager = Manager::default();
    let mut leader_election = LeaderElectionConfig::default();
    let mut has_leader_election = false;
    let mut group_kind_concurrency = BTreeMap::new();

    for arg in args {
        let Some((key, value)) = split_flag(arg) else { continue };
        match key {
            "sync-period" => manager.sync_period = Some(value.to_string()),
            "leader-elect" => {
                leader_election.leader_elect = value.parse().ok();
                has_leader_election = true;
            }
            "leader-election-id" => {
                if let Some((ns, name)) = value.split_once('/') {
                    leader_election.resource_namespace = Some(ns.to_string());
                    leader_election.resource_name = Some(name.to_string());
                    has_leader_election = true;
                }
            }
            "leader-elect-lease-duration" => {
                leader_election.lease_duration = Some(value.to_string());
                has_leader_election = true;
            }
            "leader-elect-renew-deadline" => {
                leader_election.renew_deadline = Some(value.to_string());
                has_leader_election = true;
            }
            "leader-elect-retry-period" => {
                leader_election.retry_period = Some(value.to_string());
                has_leader_election = true;
            }
            "namespace" => manager.cache_namespace = Some(value.to_string()),
            "health-addr" => {
                manager.health = Some(HealthConfig {
                    health_probe_bind_address: Some(value.to_string()),
                })
            }
            "metrics-bind-addr" => {
                manager.metrics = Some(MetricsConfig {
                    bind_address: Some(value.to_string()),
                })
            }
            "webhook-host" => manager.webhook.get_or_insert_with(WebhookConfig::default).host = Some(value.to_string()),
            "webhook-port" => manager.webhook.get_or_insert_with(WebhookConfig::default).port = value.parse().ok(),
            "webhook-cert-dir" => {
                manager.webhook.get_or_insert_with(WebhookConfig::default).cert_dir = Some(value.to_string())
            }
            "profiler-address" => manager.profiler_address = Some(value.to_string()),
            "max-concurrent-reconciles" => manager.max_concurrent_reconciles = value.parse().ok(),
            "v" => manager.verbosity = value.parse().ok(),
            "feature-gates" => {
                for pair in value.split(',') {
                    if let Some((k, v)) = pair.split_once('=') {
                        if let Ok(b) = v.parse() {
                            manager.feature_gates.insert(k.to_string(), b);
                        }
                    }
                }
            }
            other if other.ends_with("-concurrency") && other != "max-concurrent-reconciles" => {
                let kind = other.trim_end_matches("-concurrency").to_string();
                if let Ok(n) = value.parse() {
                    group_kind_concurrency.insert(kind, n);
                }
            }
            _ => { /* unknown flag: dropped, not carried into additional_args */ }
        }
    }

    if has_leader_election {
        manager.leader_election = Some(leader_election);
    }
    if !group_kind_concurrency.is_empty() {
        manager.controller = Some(ControllerConfig { group_kind_concurrency });
    }

    manager
}

/// Finds the index of the synthetic manager container, if present.
fn find_manager_container(deployment: &DeploymentOverride) -> Option<usize> {
    deployment
        .containers
        .iter()
        .position(|c| c.name == MANAGER_CONTAINER_NAME)
}

/// Detects a legacy conversion product: an older strategy merged manager
/// args into an *existing named* "manager" container instead of a
/// synthetic empty-named one. Migrates such a deployment in place by
/// splitting out the recognized manager flags.
pub fn migrate_legacy_manager_container(deployment: &mut DeploymentOverride) {
    if find_manager_container(deployment).is_some() {
        return; // already in the synthetic-container shape
    }
    let Some(idx) = deployment.containers.iter().position(|c| c.name == "manager") else {
        return;
    };
    let (known, unknown): (Vec<String>, Vec<String>) = deployment.containers[idx]
        .args
        .iter()
        .cloned()
        .partition(|a| split_flag(a).is_some_and(|(k, _)| is_known_manager_flag(k)));
    if known.is_empty() {
        return;
    }
    deployment.containers[idx].args = unknown;
    deployment.containers.push(ContainerOverride {
        name: MANAGER_CONTAINER_NAME.to_string(),
        args: known,
        ..Default::default()
    });
}

fn is_known_manager_flag(key: &str) -> bool {
    matches!(
        key,
        "sync-period"
            | "leader-elect"
            | "leader-election-id"
            | "leader-elect-lease-duration"
            | "leader-elect-renew-deadline"
            | "leader-elect-retry-period"
            | "namespace"
            | "health-addr"
            | "metrics-bind-addr"
            | "webhook-host"
            | "webhook-port"
            | "webhook-cert-dir"
            | "profiler-address"
            | "max-concurrent-reconciles"
            | "v"
            | "feature-gates"
    ) || (key.ends_with("-concurrency") && key != "max-concurrent-reconciles")
}

/// Source → Hub.
pub fn to_hub(common: &stored::ProviderSpecCommon) -> hub::ProviderSpecCommon {
    let mut deployment = common.deployment.clone();
    if let Some(manager) = &common.manager {
        if !manager.is_empty() {
            let args = manager_to_args(manager);
            if !args.is_empty() {
                let container = ContainerOverride {
                    name: MANAGER_CONTAINER_NAME.to_string(),
                    args,
                    ..Default::default()
                };
                deployment.get_or_insert_with(DeploymentOverride::default).containers.push(container);
            }
        }
    }
    hub::ProviderSpecCommon {
        version: common.version.clone(),
        fetch_config: common.fetch_config.clone(),
        config_secret: common.config_secret.clone(),
        patches: Vec::new(),
        deployment,
        additional_manifests_ref: common.additional_manifests_ref.clone(),
        additional_deployments: common.additional_deployments.clone(),
    }
}

/// Hub → Source.
pub fn from_hub(common: &hub::ProviderSpecCommon) -> stored::ProviderSpecCommon {
    let mut deployment = common.deployment.clone();
    let mut manager = None;

    if let Some(dep) = deployment.as_mut() {
        migrate_legacy_manager_container(dep);
        if let Some(idx) = find_manager_container(dep) {
            let synthetic = dep.containers.remove(idx);
            manager = Some(args_to_manager(&synthetic.args));
        }
        if *dep == DeploymentOverride::default() {
            deployment = None;
        }
    }

    stored::ProviderSpecCommon {
        version: common.version.clone(),
        fetch_config: common.fetch_config.clone(),
        config_secret: common.config_secret.clone(),
        manifest_patches: Vec::new(),
        deployment,
        additional_manifests_ref: common.additional_manifests_ref.clone(),
        additional_deployments: common.additional_deployments.clone(),
        manager,
    }
}
