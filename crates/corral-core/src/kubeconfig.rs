//! Kubeconfig issuance
//!
//! The kubeconfig CAPI stores for a cluster points at the in-cluster connect
//! gateway and authenticates as cluster admin. Tenants get a rewritten copy:
//! the server goes through the public gateway, and the only user carries a
//! renewed bearer token.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use corral_capi::ControlPlane;
use corral_common::{kubeconfig_secret_name, KUBECONFIG_SECRET_CA_KEY, KUBECONFIG_SECRET_VALUE_KEY};

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::token::TokenRenewer;

/// Kubeconfig document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Kubeconfig {
    /// API version
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    /// Kind (always "Config")
    #[serde(default)]
    pub kind: String,
    /// Clusters
    #[serde(default)]
    pub clusters: Vec<KubeconfigCluster>,
    /// Users
    #[serde(default)]
    pub users: Vec<KubeconfigUser>,
    /// Contexts
    #[serde(default)]
    pub contexts: Vec<KubeconfigContext>,
    /// Current context
    #[serde(rename = "current-context", default)]
    pub current_context: String,
}

/// Cluster entry in kubeconfig
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KubeconfigCluster {
    /// Cluster name
    pub name: String,
    /// Cluster config
    pub cluster: ClusterConfig,
}

/// Cluster configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterConfig {
    /// API server URL
    #[serde(default)]
    pub server: String,
    /// CA certificate (base64 encoded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
}

/// User entry in kubeconfig
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KubeconfigUser {
    /// User name
    pub name: String,
    /// User config
    pub user: UserConfig,
}

/// User configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Context entry in kubeconfig
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KubeconfigContext {
    /// Context name
    pub name: String,
    /// Context config
    pub context: ContextConfig,
}

/// Context configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Cluster name (reference)
    pub cluster: String,
    /// User name (reference)
    pub user: String,
}

/// Token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(authorization: &str) -> Option<&str> {
    authorization
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
}

/// Point `server` at the public gateway, keeping whatever followed the
/// cluster's path marker
pub fn rewrite_server(server: &str, gateway_url: &str, project: &str, cluster_name: &str) -> String {
    let marker = format!("/kubernetes/{}-{}", project, cluster_name);
    let end_segment = server
        .find(&marker)
        .map(|idx| &server[idx + marker.len()..])
        .unwrap_or_default();
    format!("{}{}{}", gateway_url, marker, end_segment)
}

/// Parameters of a rewritten kubeconfig
pub struct Rewrite<'a> {
    /// Project of the cluster
    pub project: &'a str,
    /// Cluster name
    pub cluster_name: &'a str,
    /// Public gateway base URL
    pub gateway_url: &'a str,
    /// Configured user name suffix
    pub username: &'a str,
    /// Bearer token for the only user
    pub token: &'a str,
    /// CA data for the only cluster
    pub ca_data: Option<String>,
}

/// Build the tenant kubeconfig from the stored one
pub fn rewrite_kubeconfig(original: &Kubeconfig, rw: Rewrite<'_>) -> Result<Kubeconfig> {
    let server = original
        .clusters
        .first()
        .map(|c| c.cluster.server.as_str())
        .ok_or_else(|| ServiceError::internal("kubeconfig has no clusters"))?;

    let user = format!("{}-{}", rw.cluster_name, rw.username);
    let context = format!("{}@{}", user, rw.cluster_name);

    Ok(Kubeconfig {
        api_version: "v1".to_string(),
        kind: "Config".to_string(),
        clusters: vec![KubeconfigCluster {
            name: rw.cluster_name.to_string(),
            cluster: ClusterConfig {
                server: rewrite_server(server, rw.gateway_url, rw.project, rw.cluster_name),
                certificate_authority_data: rw.ca_data,
            },
        }],
        users: vec![KubeconfigUser {
            name: user.clone(),
            user: UserConfig {
                token: Some(rw.token.to_string()),
            },
        }],
        contexts: vec![KubeconfigContext {
            name: context.clone(),
            context: ContextConfig {
                cluster: rw.cluster_name.to_string(),
                user,
            },
        }],
        current_context: context,
    })
}

/// Issues kubeconfigs for managed clusters
pub struct KubeconfigIssuer {
    cp: Arc<dyn ControlPlane>,
    renewer: TokenRenewer,
    config: ServiceConfig,
}

impl KubeconfigIssuer {
    /// Create an issuer
    pub fn new(cp: Arc<dyn ControlPlane>, renewer: TokenRenewer, config: ServiceConfig) -> Self {
        Self {
            cp,
            renewer,
            config,
        }
    }

    /// Kubeconfig YAML for `cluster_name`, authenticated with a renewed token
    pub async fn kubeconfig(
        &self,
        project: &str,
        cluster_name: &str,
        authorization: Option<&str>,
    ) -> Result<String> {
        let access_token = authorization
            .and_then(bearer_token)
            .ok_or_else(|| ServiceError::Unauthorized("missing or invalid bearer token".into()))?;

        let secret_name = kubeconfig_secret_name(cluster_name);
        let secret = self
            .cp
            .secret(project, &secret_name)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => ServiceError::from(e),
                e => ServiceError::internal_from("failed to get kubeconfig secret", e),
            })?;
        if secret.data.is_empty() {
            return Err(ServiceError::not_found(format!(
                "kubeconfig secret {} is empty",
                secret_name
            )));
        }

        let encoded = secret
            .data
            .get(KUBECONFIG_SECRET_VALUE_KEY)
            .ok_or_else(|| ServiceError::not_found("kubeconfig data not found"))?;
        let yaml = STANDARD
            .decode(encoded.trim())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| ServiceError::not_found("failed to decode kubeconfig"))?;
        let original: Kubeconfig = serde_yaml::from_str(&yaml)
            .map_err(|e| ServiceError::internal_from("failed to parse kubeconfig", e))?;

        let ca_data = match secret.data.get(KUBECONFIG_SECRET_CA_KEY) {
            Some(ca) if !ca.is_empty() => Some(ca.clone()),
            _ => original
                .clusters
                .first()
                .and_then(|c| c.cluster.certificate_authority_data.clone()),
        };
        if ca_data.is_none() {
            warn!(namespace = %project, name = %cluster_name, "kubeconfig has no CA data");
        }

        let token = self
            .renewer
            .renew(access_token, self.config.kubeconfig_ttl)
            .await?;

        let gateway_url = self.config.gateway_url();
        let kubeconfig = rewrite_kubeconfig(
            &original,
            Rewrite {
                project,
                cluster_name,
                gateway_url: &gateway_url,
                username: &self.config.username,
                token: &token,
                ca_data,
            },
        )?;
        debug!(namespace = %project, name = %cluster_name, "issued kubeconfig");
        serde_yaml::to_string(&kubeconfig)
            .map_err(|e| ServiceError::internal_from("failed to serialize kubeconfig", e))
    }
}
