//! Router assembly and the HTTP server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use tracing::{info, warn};

use corral_core::{ClusterLifecycle, ClusterViews, KubeconfigIssuer, Templates};

use crate::clusters;
use crate::error::ApiError;
use crate::templates;

/// Default per-request deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state for handlers
#[derive(Clone)]
pub struct AppState {
    /// Cluster detail, list and summary views
    pub views: Arc<ClusterViews>,
    /// Template catalogue
    pub templates: Arc<Templates>,
    /// Cluster create, delete and label edits
    pub lifecycle: Arc<ClusterLifecycle>,
    /// Kubeconfig issuance
    pub kubeconfigs: Arc<KubeconfigIssuer>,
    /// Deadline applied to every request
    pub request_timeout: Duration,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    let timeout = state.request_timeout;
    Router::new()
        .route("/v2/healthz", get(healthz))
        .route(
            "/v2/clusters",
            get(clusters::list_clusters).post(clusters::create_cluster),
        )
        .route("/v2/clusters/summary", get(clusters::cluster_summary))
        .route(
            "/v2/clusters/{name}",
            get(clusters::get_cluster).delete(clusters::delete_cluster),
        )
        // first segment is a node id here
        .route(
            "/v2/clusters/{name}/clusterdetail",
            get(clusters::get_cluster_by_node),
        )
        .route(
            "/v2/clusters/{name}/nodes/{node_id}",
            delete(clusters::delete_node),
        )
        .route("/v2/clusters/{name}/labels", put(clusters::update_labels))
        .route(
            "/v2/clusters/{name}/kubeconfigs",
            get(clusters::get_kubeconfig),
        )
        .route(
            "/v2/templates",
            get(templates::list_templates).post(templates::import_template),
        )
        .route(
            "/v2/templates/{name}/versions",
            get(templates::list_versions),
        )
        .route(
            "/v2/templates/{name}/default",
            put(templates::set_default_template),
        )
        .route(
            "/v2/templates/{name}/{version}",
            get(templates::get_template).delete(templates::delete_template),
        )
        .layer(middleware::from_fn_with_state(timeout, deadline))
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Drop the handler future once the deadline passes
///
/// Dropping the future aborts every in-flight control-plane, identity and
/// inventory call made on behalf of the request.
pub async fn deadline(State(timeout): State<Duration>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    match tokio::time::timeout(timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(%method, %path, timeout_secs = timeout.as_secs(), "request deadline exceeded");
            ApiError::DeadlineExceeded.into_response()
        }
    }
}

/// Serve the API on `addr` until ctrl-c
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "starting cluster manager API");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
