//! Kubernetes client construction and small resource helpers

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use k8s_openapi::api::core::v1::Secret;
use kube::api::{ApiResource, DynamicObject};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, Resource};

use corral_common::Error;

/// Default connection timeout for the control-plane client
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for the control-plane client
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from an optional kubeconfig path
///
/// Without a path the in-cluster service account (or `KUBECONFIG`) is used.
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig: {}", e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

/// ApiResource for core/v1 Secret, read untyped so `data` stays base64
pub fn secret_api_resource() -> ApiResource {
    ApiResource::erase::<Secret>(&())
}

/// Extract the still-encoded `data` map of an untyped Secret
///
/// Non-string values are skipped; the API server never produces them.
pub fn secret_string_data(obj: &DynamicObject) -> BTreeMap<String, String> {
    obj.data
        .get("data")
        .and_then(|d| d.as_object())
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Label selector matching the Machines of one cluster
pub fn machine_selector(cluster_name: &str) -> String {
    format!("{}={}", corral_common::CAPI_CLUSTER_NAME_LABEL, cluster_name)
}

/// JSON merge patch setting one label
pub fn set_label_patch(key: &str, value: &str) -> serde_json::Value {
    serde_json::json!({ "metadata": { "labels": { key: value } } })
}

/// JSON merge patch removing one label
pub fn remove_label_patch(key: &str) -> serde_json::Value {
    serde_json::json!({ "metadata": { "labels": { key: serde_json::Value::Null } } })
}

/// True if the object lives in `namespace`
pub fn in_namespace<K: Resource>(obj: &K, namespace: &str) -> bool {
    obj.meta().namespace.as_deref() == Some(namespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_api_resource_is_core_v1() {
        let ar = secret_api_resource();
        assert_eq!(ar.api_version, "v1");
        assert_eq!(ar.kind, "Secret");
        assert_eq!(ar.plural, "secrets");
    }

    #[test]
    fn test_secret_string_data_keeps_encoding() {
        let obj: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": { "name": "edge-1-kubeconfig", "namespace": "p1" },
            "data": { "value": "YXBpVmVyc2lvbjogdjE=", "apiServerCA": "Q0E=" }
        }))
        .unwrap();

        let data = secret_string_data(&obj);
        assert_eq!(data["value"], "YXBpVmVyc2lvbjogdjE=");
        assert_eq!(data["apiServerCA"], "Q0E=");
    }

    #[test]
    fn test_secret_string_data_without_data() {
        let obj: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": { "name": "empty" }
        }))
        .unwrap();
        assert!(secret_string_data(&obj).is_empty());
    }

    #[test]
    fn test_machine_selector() {
        assert_eq!(machine_selector("edge-1"), "cluster.x-k8s.io/cluster-name=edge-1");
    }

    #[test]
    fn test_label_patches() {
        assert_eq!(
            set_label_patch("default", "true"),
            serde_json::json!({ "metadata": { "labels": { "default": "true" } } })
        );
        assert_eq!(
            remove_label_patch("default"),
            serde_json::json!({ "metadata": { "labels": { "default": null } } })
        );
    }
}
