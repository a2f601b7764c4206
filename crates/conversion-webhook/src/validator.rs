use anyhow::{anyhow, bail, Result};
use provider_operator::api::{conversion, hub, stored};
use serde_json::Value;
use tracing::debug;

const STORED_VERSION: &str = "operator.cluster.x-k8s.io/v1alpha2";
const HUB_VERSION: &str = "operator.cluster.x-k8s.io/v1alpha3";

/// Converts the common spec envelope of a provider object between the
/// stored and hub schema, leaving `kind`/`metadata`/`status` untouched.
/// All seven provider kinds share the same common envelope, so this does
/// not need to branch on `kind` at all.
#[derive(Clone, Default)]
pub struct SchemaConverter;

impl SchemaConverter {
    pub fn convert(&self, desired_api_version: &str, mut object: Value) -> Result<Value> {
        let current_api_version = object
            .get("apiVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("object is missing apiVersion"))?
            .to_string();

        if current_api_version == desired_api_version {
            return Ok(object);
        }

        debug!(from = %current_api_version, to = %desired_api_version, "converting provider object");

        let spec = object.get("spec").cloned().unwrap_or(Value::Null);
        let converted_spec = match (current_api_version.as_str(), desired_api_version) {
            (STORED_VERSION, HUB_VERSION) => {
                let common: stored::ProviderSpecCommon = serde_json::from_value(spec)?;
                serde_json::to_value(conversion::to_hub(&common))?
            }
            (HUB_VERSION, STORED_VERSION) => {
                let common: hub::ProviderSpecCommon = serde_json::from_value(spec)?;
                serde_json::to_value(conversion::from_hub(&common))?
            }
            (from, to) => bail!("unsupported conversion from {from} to {to}"),
        };

        if let Some(map) = object.as_object_mut() {
            map.insert("apiVersion".to_string(), Value::String(desired_api_version.to_string()));
            map.insert("spec".to_string(), converted_spec);
        }
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_object_through_both_schema_versions() {
        let converter = SchemaConverter::default();
        let stored_obj = json!({
            "apiVersion": STORED_VERSION,
            "kind": "CoreProvider",
            "metadata": {"name": "cluster-api", "namespace": "capi-system"},
            "spec": {"version": "v1.7.0", "manager": {"syncPeriod": "10m"}},
        });

        let hub_obj = converter.convert(HUB_VERSION, stored_obj.clone()).unwrap();
        assert_eq!(hub_obj["apiVersion"], HUB_VERSION);
        let deployment = &hub_obj["spec"]["deployment"];
        assert!(deployment["containers"].as_array().unwrap().iter().any(|c| c["name"] == ""));

        let round_tripped = converter.convert(STORED_VERSION, hub_obj).unwrap();
        assert_eq!(round_tripped["apiVersion"], STORED_VERSION);
        assert_eq!(round_tripped["spec"]["manager"]["syncPeriod"], "10m");
    }

    #[test]
    fn same_version_conversion_is_a_no_op() {
        let converter = SchemaConverter::default();
        let obj = json!({"apiVersion": STORED_VERSION, "kind": "CoreProvider", "spec": {}});
        let converted = converter.convert(STORED_VERSION, obj.clone()).unwrap();
        assert_eq!(converted, obj);
    }

    #[test]
    fn unsupported_target_version_is_rejected() {
        let converter = SchemaConverter::default();
        let obj = json!({"apiVersion": STORED_VERSION, "kind": "CoreProvider", "spec": {}});
        assert!(converter.convert("operator.cluster.x-k8s.io/v1alpha9", obj).is_err());
    }
}
