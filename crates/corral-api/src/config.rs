//! Command line and environment configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use corral_common::labels::SystemLabelPrefixes;
use corral_core::ServiceConfig;

/// Corral - multi-tenant cluster manager API
#[derive(Parser, Debug, Clone)]
#[command(name = "corral", version, about, long_about = None)]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env = "CORRAL_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Domain suffix of the connect gateway and metrics endpoint
    #[arg(long, env = "CORRAL_CLUSTER_DOMAIN", default_value = "kind.internal")]
    pub cluster_domain: String,

    /// User name suffix written into issued kubeconfigs
    #[arg(long, env = "CORRAL_USERNAME", default_value = "admin")]
    pub username: String,

    /// Hand back the caller's token instead of minting one
    #[arg(long, env = "CORRAL_DISABLE_AUTH")]
    pub disable_auth: bool,

    /// Skip inventory lookups when creating clusters
    #[arg(long, env = "CORRAL_DISABLE_INVENTORY")]
    pub disable_inventory: bool,

    /// Lifetime of issued kubeconfig tokens, in seconds
    #[arg(long, env = "CORRAL_DEFAULT_KUBECONFIG_TTL", alias = "kubeconfig-ttl")]
    pub default_kubeconfig_ttl: Option<i64>,

    /// Never change the identity provider's token lifespan
    #[arg(long, env = "CORRAL_DISABLE_CUSTOM_TTL")]
    pub disable_custom_ttl: bool,

    /// Base URL of the identity provider
    #[arg(
        long,
        env = "CORRAL_KEYCLOAK_URL",
        default_value = "http://platform-keycloak.orch-platform.svc"
    )]
    pub keycloak_url: String,

    /// Identity provider realm
    #[arg(long, env = "CORRAL_KEYCLOAK_REALM", default_value = "master")]
    pub keycloak_realm: String,

    /// Namespace of the machine-to-machine client secret
    #[arg(long, env = "CORRAL_M2M_SECRET_NAMESPACE", default_value = "orch-cluster")]
    pub m2m_secret_namespace: String,

    /// Name of the machine-to-machine client secret
    #[arg(
        long,
        env = "CORRAL_M2M_SECRET_NAME",
        default_value = "co-manager-m2m-client-secret"
    )]
    pub m2m_secret_name: String,

    /// Base URL of the inventory API
    #[arg(
        long,
        env = "CORRAL_INVENTORY_URL",
        default_value = "http://inventory.orch-infra.svc:8080"
    )]
    pub inventory_url: String,

    /// Label prefixes owned by the system (comma separated)
    #[arg(long, env = "CORRAL_SYSTEM_LABEL_PREFIXES", value_delimiter = ',')]
    pub system_label_prefixes: Vec<String>,

    /// Per-request deadline, in seconds
    #[arg(long, env = "CORRAL_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Kubeconfig for the control-plane client; in-cluster config when unset
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Serve list views from Cluster and Machine informers
    #[arg(long, env = "CORRAL_CACHED_READS")]
    pub cached_reads: bool,

    /// Emit logs as JSON
    #[arg(long, env = "CORRAL_LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    /// System label prefixes, the built-in set when none are configured
    pub fn system_labels(&self) -> SystemLabelPrefixes {
        let prefixes: Vec<String> = self
            .system_label_prefixes
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if prefixes.is_empty() {
            SystemLabelPrefixes::default()
        } else {
            SystemLabelPrefixes::new(prefixes)
        }
    }

    /// Per-request deadline
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Options consumed by the service layer
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            cluster_domain: self.cluster_domain.clone(),
            username: self.username.clone(),
            disable_auth: self.disable_auth,
            disable_inventory: self.disable_inventory,
            kubeconfig_ttl: self.default_kubeconfig_ttl,
            disable_custom_ttl: self.disable_custom_ttl,
            system_labels: self.system_labels(),
        }
    }
}
