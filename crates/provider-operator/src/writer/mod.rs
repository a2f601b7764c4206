//! The cluster writer: ordered server-side apply/delete of rendered
//! documents against the target cluster.

pub mod apply;
pub mod order;

use crate::util::errors::Error;
use kube::Client;
use serde_json::Value;

fn kind_of(document: &Value) -> String {
    document.get("kind").and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Applies every document in `documents`, in apply order, stopping at the
/// first failure.
pub async fn apply_all(client: &Client, documents: &[Value]) -> Result<(), Error> {
    let mut ordered = documents.to_vec();
    order::sort_for_apply(&mut ordered, kind_of);
    for document in &ordered {
        apply::apply_object(client, document).await?;
    }
    Ok(())
}

/// Deletes every document in `documents`, in delete order. Collects
/// failures instead of stopping early so a protected-namespace refusal
/// does not block deleting the rest of the provider's objects.
pub async fn delete_all(client: &Client, documents: &[Value]) -> Result<(), Vec<Error>> {
    let mut ordered = documents.to_vec();
    order::sort_for_delete(&mut ordered, kind_of);
    let mut errors = Vec::new();
    for document in &ordered {
        if let Err(e) = apply::delete_object(client, document).await {
            errors.push(e);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
