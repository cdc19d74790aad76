//! Cluster endpoints

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use tracing::debug;

use corral_core::models::{
    ClusterDetailInfo, ClusterLabels, ClusterList, ClusterSpecRequest, ClusterSummary,
    KubeconfigInfo,
};
use corral_core::QueryParams;

use crate::error::ApiError;
use crate::project::ProjectId;
use crate::server::AppState;

/// Query parameters of the node delete endpoint
#[derive(Debug, Default, Deserialize)]
pub struct DeleteNodeParams {
    /// Delete without a grace period
    #[serde(default)]
    pub force: bool,
}

/// `GET /v2/clusters`
pub async fn list_clusters(
    State(state): State<AppState>,
    project: ProjectId,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> Result<Json<ClusterList>, ApiError> {
    let Query(params) = params?;
    let list = state.views.list(project.as_str(), &params).await?;
    Ok(Json(list))
}

/// `GET /v2/clusters/summary`
pub async fn cluster_summary(
    State(state): State<AppState>,
    project: ProjectId,
) -> Result<Json<ClusterSummary>, ApiError> {
    Ok(Json(state.views.summary(project.as_str()).await?))
}

/// `GET /v2/clusters/{name}`
pub async fn get_cluster(
    State(state): State<AppState>,
    project: ProjectId,
    Path(name): Path<String>,
) -> Result<Json<ClusterDetailInfo>, ApiError> {
    Ok(Json(state.views.detail(project.as_str(), &name).await?))
}

/// `GET /v2/clusters/{nodeId}/clusterdetail`
pub async fn get_cluster_by_node(
    State(state): State<AppState>,
    project: ProjectId,
    Path(node_id): Path<String>,
) -> Result<Json<ClusterDetailInfo>, ApiError> {
    Ok(Json(
        state.views.detail_by_node(project.as_str(), &node_id).await?,
    ))
}

/// `POST /v2/clusters`
pub async fn create_cluster(
    State(state): State<AppState>,
    project: ProjectId,
    body: Result<Json<ClusterSpecRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<String>), ApiError> {
    let Json(req) = body?;
    let name = state.lifecycle.create(project.as_str(), req).await?;
    Ok((
        StatusCode::CREATED,
        Json(format!("successfully created cluster {}", name)),
    ))
}

/// `DELETE /v2/clusters/{name}`
pub async fn delete_cluster(
    State(state): State<AppState>,
    project: ProjectId,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.lifecycle.delete(project.as_str(), &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /v2/clusters/{name}/nodes/{nodeId}`
pub async fn delete_node(
    State(state): State<AppState>,
    project: ProjectId,
    Path((name, node_id)): Path<(String, String)>,
    params: Result<Query<DeleteNodeParams>, QueryRejection>,
) -> Result<StatusCode, ApiError> {
    let Query(params) = params?;
    state
        .lifecycle
        .delete_node(project.as_str(), &name, &node_id, params.force)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /v2/clusters/{name}/labels`
pub async fn update_labels(
    State(state): State<AppState>,
    project: ProjectId,
    Path(name): Path<String>,
    body: Result<Json<ClusterLabels>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = body?;
    state
        .lifecycle
        .update_labels(project.as_str(), &name, req.labels)
        .await?;
    Ok(StatusCode::OK)
}

/// `GET /v2/clusters/{name}/kubeconfigs`
pub async fn get_kubeconfig(
    State(state): State<AppState>,
    project: ProjectId,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<KubeconfigInfo>, ApiError> {
    let authorization = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok());
    let kubeconfig = state
        .kubeconfigs
        .kubeconfig(project.as_str(), &name, authorization)
        .await?;
    debug!(namespace = %project.as_str(), name = %name, "issued kubeconfig");
    Ok(Json(KubeconfigInfo {
        id: name,
        kubeconfig,
    }))
}
