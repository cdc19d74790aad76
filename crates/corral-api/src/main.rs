//! Corral - multi-tenant cluster manager API server

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use corral_api::{AppState, Config};
use corral_capi::{ControlPlane, KubeControlPlane, ResourceCache};
use corral_core::{
    ClusterLifecycle, ClusterViews, KubeconfigIssuer, Templates, TokenRenewer, TtlEnforcer,
};
use corral_identity::{IdentityProvider, KeycloakClient, KubeSecretCredentials, M2mCredentials};
use corral_inventory::{HttpInventoryClient, Inventory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_json);

    let service = config.service_config();
    let client = corral_capi::kube_utils::create_client(config.kubeconfig.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!("failed to create kubernetes client: {}", e))?;

    let mut control_plane = KubeControlPlane::new(client.clone(), service.system_labels.clone());
    if config.cached_reads {
        let cache = ResourceCache::start(client.clone())
            .await
            .map_err(|e| anyhow::anyhow!("failed to start resource cache: {}", e))?;
        control_plane = control_plane.with_cache(cache);
    }
    let cp: Arc<dyn ControlPlane> = Arc::new(control_plane);

    let credentials: Arc<dyn M2mCredentials> = Arc::new(KubeSecretCredentials::new(
        client,
        config.m2m_secret_namespace.clone(),
        config.m2m_secret_name.clone(),
    ));
    let identity: Arc<dyn IdentityProvider> = Arc::new(
        KeycloakClient::new(
            config.keycloak_url.clone(),
            config.keycloak_realm.clone(),
            credentials.clone(),
        )
        .map_err(|e| anyhow::anyhow!("failed to create identity provider client: {}", e))?,
    );

    let inventory: Option<Arc<dyn Inventory>> = if service.disable_inventory {
        info!("inventory lookups disabled");
        None
    } else {
        let client = HttpInventoryClient::new(config.inventory_url.clone())
            .map_err(|e| anyhow::anyhow!("failed to create inventory client: {}", e))?;
        Some(Arc::new(client))
    };

    let templates = Arc::new(Templates::new(cp.clone()));
    let renewer = TokenRenewer::new(
        identity,
        credentials,
        Arc::new(TtlEnforcer::new()),
        service.disable_auth,
        service.disable_custom_ttl,
    );
    let state = AppState {
        views: Arc::new(ClusterViews::new(cp.clone(), service.system_labels.clone())),
        templates: templates.clone(),
        lifecycle: Arc::new(ClusterLifecycle::new(
            cp.clone(),
            templates,
            inventory,
            service.clone(),
        )),
        kubeconfigs: Arc::new(KubeconfigIssuer::new(cp, renewer, service)),
        request_timeout: config.request_timeout(),
    };

    corral_api::server::serve(config.listen_addr, state)
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
