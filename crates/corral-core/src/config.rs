//! Service configuration consumed by the core

use corral_common::labels::SystemLabelPrefixes;

/// Options shaping cluster creation and kubeconfig issuance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Domain suffix of the connect gateway and the metrics endpoint
    pub cluster_domain: String,
    /// Kubeconfig user name suffix
    pub username: String,
    /// Hand back the caller's token instead of minting one
    pub disable_auth: bool,
    /// Skip inventory lookups
    pub disable_inventory: bool,
    /// Desired lifetime of issued kubeconfig tokens, in seconds
    pub kubeconfig_ttl: Option<i64>,
    /// Never touch the identity provider's token lifespan
    pub disable_custom_ttl: bool,
    /// Label prefixes owned by the system
    pub system_labels: SystemLabelPrefixes,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cluster_domain: "kind.internal".to_string(),
            username: "admin".to_string(),
            disable_auth: false,
            disable_inventory: false,
            kubeconfig_ttl: None,
            disable_custom_ttl: false,
            system_labels: SystemLabelPrefixes::default(),
        }
    }
}

impl ServiceConfig {
    /// Value of the metrics URL label on new clusters
    pub fn metrics_url(&self) -> String {
        format!("metrics-node.{}", self.cluster_domain)
    }

    /// Base URL of the connect gateway
    pub fn gateway_url(&self) -> String {
        format!("https://connect-gateway.{}:443", self.cluster_domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_urls() {
        let config = ServiceConfig {
            cluster_domain: "example.org".into(),
            ..Default::default()
        };
        assert_eq!(config.metrics_url(), "metrics-node.example.org");
        assert_eq!(config.gateway_url(), "https://connect-gateway.example.org:443");
    }
}
