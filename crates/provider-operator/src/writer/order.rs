//! Apply/delete ordering: namespaces, then CRDs, then RBAC, then services,
//! then webhooks, then configmaps/secrets, then deployments, then
//! everything else. Delete runs the reverse of apply order so a provider's
//! Deployment disappears before the RBAC it depends on, and namespaces are
//! removed last of all.

const RBAC_KINDS: &[&str] = &["ServiceAccount", "Role", "RoleBinding", "ClusterRole", "ClusterRoleBinding"];
const WEBHOOK_KINDS: &[&str] = &["MutatingWebhookConfiguration", "ValidatingWebhookConfiguration"];
const CONFIG_KINDS: &[&str] = &["ConfigMap", "Secret"];

fn apply_rank(kind: &str) -> usize {
    match kind {
        "Namespace" => 0,
        "CustomResourceDefinition" => 1,
        k if RBAC_KINDS.contains(&k) => 2,
        "Service" => 3,
        k if WEBHOOK_KINDS.contains(&k) => 4,
        k if CONFIG_KINDS.contains(&k) => 5,
        "Deployment" => 6,
        _ => 7,
    }
}

/// Stable-sorts `documents` into apply order, preserving relative order
/// within a rank.
pub fn sort_for_apply<T>(documents: &mut [T], kind_of: impl Fn(&T) -> String) {
    documents.sort_by_key(|d| apply_rank(&kind_of(d)));
}

/// Stable-sorts `documents` into delete order: the exact reverse of apply
/// order.
pub fn sort_for_delete<T>(documents: &mut [T], kind_of: impl Fn(&T) -> String) {
    documents.sort_by_key(|d| std::cmp::Reverse(apply_rank(&kind_of(d))));
}
