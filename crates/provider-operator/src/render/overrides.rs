//! Applies `DeploymentOverride`/`ContainerOverride` onto a parsed
//! `Deployment` document field by field, mutating an existing document
//! rather than constructing one from scratch.

use crate::api::common::{ContainerOverride, DeploymentOverride};
use crate::api::conversion::MANAGER_CONTAINER_NAME;
use serde_json::{json, Value};

const NON_NAMESPACED_KINDS: &[&str] =
    &["Namespace", "ClusterRole", "ClusterRoleBinding", "CustomResourceDefinition"];

/// An object carrying this annotation (any value) keeps whatever namespace
/// it was rendered with instead of being rewritten onto the provider's
/// target namespace.
const SKIP_NAMESPACE_REWRITE_ANNOTATION: &str = "operator.cluster.x-k8s.io/skip-namespace-rewrite";

/// The manifest container manager args are merged onto when no
/// real container carries [`MANAGER_CONTAINER_NAME`] (always true — it's
/// the empty string and no real container is ever named that).
const PRIMARY_CONTAINER_NAME: &str = "manager";

fn opts_out_of_namespace_rewrite(document: &Value) -> bool {
    document
        .pointer("/metadata/annotations")
        .and_then(Value::as_object)
        .map(|a| a.contains_key(SKIP_NAMESPACE_REWRITE_ANNOTATION))
        .unwrap_or(false)
}

/// Rewrites every namespaced document's `metadata.namespace` to `namespace`,
/// skipping cluster-scoped kinds, documents opted out via
/// [`SKIP_NAMESPACE_REWRITE_ANNOTATION`], and any `RoleBinding`/
/// `ClusterRoleBinding` subject that refers to this same namespace's default
/// ServiceAccount.
pub fn rewrite_namespace(documents: &mut [Value], namespace: &str) {
    for document in documents.iter_mut() {
        let kind = document.get("kind").and_then(Value::as_str).unwrap_or_default().to_string();
        if NON_NAMESPACED_KINDS.contains(&kind.as_str()) || opts_out_of_namespace_rewrite(document) {
            continue;
        }
        if let Some(metadata) = document.get_mut("metadata").and_then(Value::as_object_mut) {
            metadata.insert("namespace".to_string(), json!(namespace));
        }
        if kind == "RoleBinding" || kind == "ClusterRoleBinding" {
            if let Some(subjects) = document.get_mut("subjects").and_then(Value::as_array_mut) {
                for subject in subjects {
                    if subject.get("kind").and_then(Value::as_str) == Some("ServiceAccount") {
                        if let Some(subject) = subject.as_object_mut() {
                            subject.insert("namespace".to_string(), json!(namespace));
                        }
                    }
                }
            }
        }
    }
}

fn is_deployment(document: &Value) -> bool {
    document.get("kind").and_then(Value::as_str) == Some("Deployment")
}

fn containers_mut(document: &mut Value) -> Option<&mut Vec<Value>> {
    document
        .pointer_mut("/spec/template/spec/containers")
        .and_then(Value::as_array_mut)
}

/// Merges `over` onto `args`: an override arg of the form `--flag=value`
/// replaces any existing arg with the same flag name, everything else (the
/// manifest's defaults, and override args with no `=`) is kept.
fn merge_args(existing: &mut Vec<Value>, over: &[String]) {
    for arg in over {
        let flag = arg.strip_prefix("--").and_then(|rest| rest.split_once('=')).map(|(k, _)| k);
        if let Some(flag) = flag {
            existing.retain(|e| {
                e.as_str()
                    .and_then(|s| s.strip_prefix("--"))
                    .and_then(|rest| rest.split_once('='))
                    .map(|(k, _)| k)
                    != Some(flag)
            });
        }
        existing.push(json!(arg));
    }
}

fn apply_container_override(container: &mut Value, over: &ContainerOverride) {
    let Some(obj) = container.as_object_mut() else { return };
    if let Some(image) = &over.image_url {
        obj.insert("image".to_string(), json!(image));
    }
    if !over.args.is_empty() {
        let existing = obj.entry("args").or_insert_with(|| json!([]));
        if let Some(existing) = existing.as_array_mut() {
            merge_args(existing, &over.args);
        }
    }
    if !over.command.is_empty() {
        obj.insert("command".to_string(), json!(over.command));
    }
    if !over.env.is_empty() {
        let existing = obj.entry("env").or_insert_with(|| json!([]));
        if let Some(existing) = existing.as_array_mut() {
            for env_var in &over.env {
                existing.retain(|e| e.get("name").and_then(Value::as_str) != Some(env_var.name.as_str()));
                existing.push(serde_json::to_value(env_var).unwrap());
            }
        }
    }
    if let Some(resources) = &over.resources {
        obj.insert("resources".to_string(), serde_json::to_value(resources).unwrap());
    }
}

/// Finds the container a `ContainerOverride` targets: by name for a real
/// override, or the manifest's designated `manager` container (falling back
/// to the first container) for the synthetic empty-named override that
/// carries the manager's converted args (`api::conversion::to_hub`).
fn find_target_container<'a>(containers: &'a mut [Value], container_override: &ContainerOverride) -> Option<&'a mut Value> {
    if container_override.name == MANAGER_CONTAINER_NAME {
        let has_named_manager = containers
            .iter()
            .any(|c| c.get("name").and_then(Value::as_str) == Some(PRIMARY_CONTAINER_NAME));
        if has_named_manager {
            containers
                .iter_mut()
                .find(|c| c.get("name").and_then(Value::as_str) == Some(PRIMARY_CONTAINER_NAME))
        } else {
            containers.first_mut()
        }
    } else {
        containers
            .iter_mut()
            .find(|c| c.get("name").and_then(Value::as_str) == Some(container_override.name.as_str()))
    }
}

/// Applies a single named-deployment's override onto the first `Deployment`
/// document whose name matches `deployment_name` (the empty string matches
/// the provider's sole/primary Deployment).
pub fn apply_deployment_override(documents: &mut [Value], deployment_name: &str, over: &DeploymentOverride) {
    let Some(document) = documents.iter_mut().find(|d| {
        is_deployment(d)
            && (deployment_name.is_empty()
                || d.pointer("/metadata/name").and_then(Value::as_str) == Some(deployment_name))
    }) else {
        return;
    };

    if let Some(replicas) = over.replicas {
        if let Some(spec) = document.pointer_mut("/spec").and_then(Value::as_object_mut) {
            spec.insert("replicas".to_string(), json!(replicas));
        }
    }
    if let Some(pod_spec) = document.pointer_mut("/spec/template/spec").and_then(Value::as_object_mut) {
        if !over.node_selector.is_empty() {
            pod_spec.insert("nodeSelector".to_string(), json!(over.node_selector));
        }
        if !over.tolerations.is_empty() {
            pod_spec.insert("tolerations".to_string(), serde_json::to_value(&over.tolerations).unwrap());
        }
        if let Some(affinity) = &over.affinity {
            pod_spec.insert("affinity".to_string(), serde_json::to_value(affinity).unwrap());
        }
        if let Some(name) = &over.service_account_name {
            pod_spec.insert("serviceAccountName".to_string(), json!(name));
        }
        if !over.image_pull_secrets.is_empty() {
            pod_spec.insert(
                "imagePullSecrets".to_string(),
                serde_json::to_value(&over.image_pull_secrets).unwrap(),
            );
        }
    }

    if let Some(containers) = containers_mut(document) {
        for container_override in &over.containers {
            if let Some(container) = find_target_container(containers, container_override) {
                apply_container_override(container, container_override);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rewrite_namespace_skips_cluster_scoped_kinds() {
        let mut docs = vec![
            json!({"kind": "Deployment", "metadata": {"name": "manager"}}),
            json!({"kind": "ClusterRole", "metadata": {"name": "manager-role"}}),
        ];
        rewrite_namespace(&mut docs, "capi-system");
        assert_eq!(docs[0]["metadata"]["namespace"], json!("capi-system"));
        assert_eq!(docs[1]["metadata"].get("namespace"), None);
    }

    #[test]
    fn rewrite_namespace_honors_opt_out_annotation() {
        let mut docs = vec![json!({
            "kind": "ConfigMap",
            "metadata": {"name": "shared", "annotations": {SKIP_NAMESPACE_REWRITE_ANNOTATION: "true"}}
        })];
        rewrite_namespace(&mut docs, "capi-system");
        assert_eq!(docs[0]["metadata"].get("namespace"), None);
    }

    #[test]
    fn container_override_merges_args_instead_of_replacing() {
        let mut docs = vec![json!({
            "kind": "Deployment",
            "metadata": {"name": "manager"},
            "spec": {"template": {"spec": {"containers": [
                {"name": "manager", "image": "old:v1", "args": ["--metrics-bind-addr=:8080", "--leader-elect=false"]}
            ]}}}
        })];
        let over = DeploymentOverride {
            containers: vec![ContainerOverride {
                name: "manager".to_string(),
                image_url: Some("new:v2".to_string()),
                args: vec!["--leader-elect=true".to_string(), "--v=4".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };
        apply_deployment_override(&mut docs, "", &over);
        let container = &docs[0]["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["image"], json!("new:v2"));
        let args = container["args"].as_array().unwrap();
        assert!(args.contains(&json!("--metrics-bind-addr=:8080")));
        assert!(args.contains(&json!("--leader-elect=true")));
        assert!(!args.contains(&json!("--leader-elect=false")));
        assert!(args.contains(&json!("--v=4")));
    }

    #[test]
    fn synthetic_manager_container_args_land_on_named_manager_container() {
        let mut docs = vec![json!({
            "kind": "Deployment",
            "metadata": {"name": "capi-controller-manager"},
            "spec": {"template": {"spec": {"containers": [
                {"name": "manager", "image": "registry/manager:v1.8.0", "args": ["--leader-elect=true"]}
            ]}}}
        })];
        let over = DeploymentOverride {
            containers: vec![ContainerOverride {
                name: MANAGER_CONTAINER_NAME.to_string(),
                args: vec!["--sync-period=30s".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };
        apply_deployment_override(&mut docs, "", &over);
        let container = &docs[0]["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["name"], json!("manager"));
        let args = container["args"].as_array().unwrap();
        assert!(args.contains(&json!("--sync-period=30s")));
        assert!(args.contains(&json!("--leader-elect=true")));
    }

    #[test]
    fn synthetic_manager_container_falls_back_to_first_container_when_unnamed() {
        let mut docs = vec![json!({
            "kind": "Deployment",
            "metadata": {"name": "capi-controller-manager"},
            "spec": {"template": {"spec": {"containers": [
                {"name": "controller", "image": "registry/controller:v1.8.0"}
            ]}}}
        })];
        let over = DeploymentOverride {
            containers: vec![ContainerOverride {
                name: MANAGER_CONTAINER_NAME.to_string(),
                args: vec!["--sync-period=30s".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };
        apply_deployment_override(&mut docs, "", &over);
        let container = &docs[0]["spec"]["template"]["spec"]["containers"][0];
        assert!(container["args"].as_array().unwrap().contains(&json!("--sync-period=30s")));
    }
}
