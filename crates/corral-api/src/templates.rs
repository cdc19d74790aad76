//! Template catalogue endpoints

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use corral_core::models::{DefaultTemplateRequest, TemplateInfo, TemplateInfoList, VersionList};
use corral_core::QueryParams;

use crate::error::ApiError;
use crate::project::ProjectId;
use crate::server::AppState;

/// Query parameters of the template list
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateListParams {
    /// List only the project default
    #[serde(default)]
    pub default: bool,
    /// Page size
    #[serde(default)]
    pub page_size: Option<i32>,
    /// Index of the first element
    #[serde(default)]
    pub offset: Option<i32>,
    /// Order clauses
    #[serde(default)]
    pub order_by: Option<String>,
    /// Filter expression
    #[serde(default)]
    pub filter: Option<String>,
}

impl TemplateListParams {
    fn query(&self) -> QueryParams {
        QueryParams {
            page_size: self.page_size,
            offset: self.offset,
            order_by: self.order_by.clone(),
            filter: self.filter.clone(),
        }
    }
}

/// `GET /v2/templates`
pub async fn list_templates(
    State(state): State<AppState>,
    project: ProjectId,
    params: Result<Query<TemplateListParams>, QueryRejection>,
) -> Result<Json<TemplateInfoList>, ApiError> {
    let Query(params) = params?;
    let list = state
        .templates
        .list(project.as_str(), &params.query(), params.default)
        .await?;
    Ok(Json(list))
}

/// `POST /v2/templates`
pub async fn import_template(
    State(state): State<AppState>,
    project: ProjectId,
    body: Result<Json<TemplateInfo>, JsonRejection>,
) -> Result<(StatusCode, Json<String>), ApiError> {
    let Json(info) = body?;
    let message = format!("successfully imported template {}-{}", info.name, info.version);
    state.templates.create(project.as_str(), info).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `GET /v2/templates/{name}/versions`
pub async fn list_versions(
    State(state): State<AppState>,
    project: ProjectId,
    Path(name): Path<String>,
) -> Result<Json<VersionList>, ApiError> {
    Ok(Json(state.templates.versions(project.as_str(), &name).await?))
}

/// `GET /v2/templates/{name}/{version}`
pub async fn get_template(
    State(state): State<AppState>,
    project: ProjectId,
    Path((name, version)): Path<(String, String)>,
) -> Result<Json<TemplateInfo>, ApiError> {
    Ok(Json(
        state
            .templates
            .get(project.as_str(), &name, &version)
            .await?,
    ))
}

/// `DELETE /v2/templates/{name}/{version}`
pub async fn delete_template(
    State(state): State<AppState>,
    project: ProjectId,
    Path((name, version)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .templates
        .delete(project.as_str(), &name, &version)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /v2/templates/{name}/default`
pub async fn set_default_template(
    State(state): State<AppState>,
    project: ProjectId,
    Path(name): Path<String>,
    body: Result<Json<DefaultTemplateRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = body?;
    state
        .templates
        .set_default(project.as_str(), &name, req)
        .await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use axum::http::StatusCode;
    use corral_capi::MockControlPlane;
    use corral_common::crd::{
        Cluster, ClusterSpec, ClusterTemplate, ClusterTemplateSpec, ControlPlaneProviderType,
        InfraProviderType,
    };
    use corral_common::{Error as CpError, TEMPLATE_ANNOTATION};
    use mockall::predicate::eq;
    use serde_json::json;

    use crate::server::test_support::{app, send, PROJECT};

    fn template(composite: &str, default: bool) -> ClusterTemplate {
        let mut t = ClusterTemplate::new(
            composite,
            ClusterTemplateSpec {
                control_plane_provider_type: ControlPlaneProviderType::K3s,
                infra_provider_type: InfraProviderType::Intel,
                kubernetes_version: "v1.30.6+k3s1".into(),
                ..Default::default()
            },
        );
        if default {
            t.metadata.labels = Some(BTreeMap::from([(
                "default".to_string(),
                "true".to_string(),
            )]));
        }
        t
    }

    #[tokio::test]
    async fn test_list_templates_reports_default() {
        let mut cp = MockControlPlane::new();
        cp.expect_templates()
            .withf(|project, selector| project == PROJECT && selector.is_none())
            .returning(|_, _| {
                Ok(vec![
                    template("baseline-v0.1.0", false),
                    template("baseline-v0.2.0", true),
                ])
            });

        let (status, body) = send(
            app(cp),
            "GET",
            "/v2/templates?orderBy=version%20desc&pageSize=1",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalElements"], 2);
        assert_eq!(body["templateInfoList"][0]["version"], "v0.2.0");
        assert_eq!(
            body["defaultTemplateInfo"],
            json!({"name": "baseline", "version": "v0.2.0"})
        );
    }

    #[tokio::test]
    async fn test_kubernetes_version_filters_but_does_not_order() {
        let (status, body) = send(
            app(MockControlPlane::new()),
            "GET",
            "/v2/templates?orderBy=kubernetesVersion",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "invalid orderBy field");

        let mut cp = MockControlPlane::new();
        cp.expect_templates().returning(|_, _| {
            let mut older = template("baseline-v0.1.0", false);
            older.spec.kubernetes_version = "v1.29.9+k3s1".into();
            Ok(vec![older, template("baseline-v0.2.0", false)])
        });
        let (status, body) = send(
            app(cp),
            "GET",
            "/v2/templates?filter=kubernetesVersion%3Dv1.30",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalElements"], 1);
        assert_eq!(body["templateInfoList"][0]["version"], "v0.2.0");
    }

    #[tokio::test]
    async fn test_list_default_only_uses_selector() {
        let mut cp = MockControlPlane::new();
        cp.expect_templates()
            .withf(|_, selector| selector.as_deref() == Some("default=true"))
            .times(1)
            .returning(|_, _| Ok(vec![template("baseline-v0.2.0", true)]));
        let (status, body) = send(app(cp), "GET", "/v2/templates?default=true", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalElements"], 1);
    }

    #[tokio::test]
    async fn test_versions_of_unknown_template() {
        let mut cp = MockControlPlane::new();
        cp.expect_templates().returning(|_, _| Ok(vec![]));
        let (status, body) = send(app(cp), "GET", "/v2/templates/ghost/versions", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "template ghost not found");
    }

    #[tokio::test]
    async fn test_versions_ascending() {
        let mut cp = MockControlPlane::new();
        cp.expect_templates().returning(|_, _| {
            Ok(vec![
                template("baseline-v0.2.0", false),
                template("baseline-v0.1.0", false),
                template("other-v9.0.0", false),
            ])
        });
        let (status, body) = send(app(cp), "GET", "/v2/templates/baseline/versions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"versionList": ["v0.1.0", "v0.2.0"]}));
    }

    #[tokio::test]
    async fn test_get_template() {
        let mut cp = MockControlPlane::new();
        cp.expect_template()
            .with(eq(PROJECT), eq("baseline-v0.1.0"))
            .returning(|_, n| Ok(template(n, false)));
        let (status, body) = send(app(cp), "GET", "/v2/templates/baseline/v0.1.0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "baseline");
        assert_eq!(body["controlPlaneProviderType"], "k3s");
    }

    #[tokio::test]
    async fn test_import_template() {
        let mut cp = MockControlPlane::new();
        cp.expect_create_template()
            .withf(|_, t| kube::ResourceExt::name_any(t) == "baseline-v0.3.0")
            .times(1)
            .returning(|_, t| Ok(t));
        let request = json!({
            "name": "baseline",
            "version": "v0.3.0",
            "kubernetesVersion": "v1.30.6+k3s1",
            "controlPlaneProviderType": "k3s",
            "infraProviderType": "intel",
        });
        let (status, body) = send(app(cp), "POST", "/v2/templates", Some(request)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, "successfully imported template baseline-v0.3.0");
    }

    #[tokio::test]
    async fn test_import_rejects_bad_version() {
        let mut cp = MockControlPlane::new();
        cp.expect_create_template().never();
        let request = json!({
            "name": "baseline",
            "version": "0.3.0",
            "kubernetesVersion": "v1.30.6",
            "controlPlaneProviderType": "k3s",
            "infraProviderType": "intel",
        });
        let (status, _) = send(app(cp), "POST", "/v2/templates", Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_template_in_use() {
        let mut cp = MockControlPlane::new();
        cp.expect_template().returning(|_, n| Ok(template(n, false)));
        cp.expect_clusters().returning(|_, _| {
            let mut cluster = Cluster::new("edge-1", ClusterSpec::default());
            cluster.metadata.annotations = Some(BTreeMap::from([(
                TEMPLATE_ANNOTATION.to_string(),
                "baseline-v0.1.0".to_string(),
            )]));
            Ok(vec![cluster])
        });
        cp.expect_delete_template().never();
        let (status, body) =
            send(app(cp), "DELETE", "/v2/templates/baseline/v0.1.0", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "template is in use");
    }

    #[tokio::test]
    async fn test_delete_unused_template() {
        let mut cp = MockControlPlane::new();
        cp.expect_template().returning(|_, n| Ok(template(n, false)));
        cp.expect_clusters().returning(|_, _| Ok(vec![]));
        cp.expect_delete_template()
            .with(eq(PROJECT), eq("baseline-v0.1.0"))
            .times(1)
            .returning(|_, _| Ok(()));
        let (status, _) = send(app(cp), "DELETE", "/v2/templates/baseline/v0.1.0", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_delete_missing_template() {
        let mut cp = MockControlPlane::new();
        cp.expect_template()
            .returning(|_, n| Err(CpError::not_found("ClusterTemplate", n)));
        let (status, _) = send(app(cp), "DELETE", "/v2/templates/ghost/v0.1.0", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_set_default_template() {
        let mut cp = MockControlPlane::new();
        cp.expect_template()
            .with(eq(PROJECT), eq("baseline-v0.1.0"))
            .returning(|_, n| Ok(template(n, false)));
        cp.expect_templates()
            .returning(|_, _| Ok(vec![template("baseline-v0.2.0", true)]));
        cp.expect_remove_template_label()
            .with(eq(PROJECT), eq("baseline-v0.2.0"), eq("default"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        cp.expect_set_template_label()
            .with(eq(PROJECT), eq("baseline-v0.1.0"), eq("default"), eq("true"))
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let (status, _) = send(
            app(cp),
            "PUT",
            "/v2/templates/baseline/default",
            Some(json!({"version": "v0.1.0"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
