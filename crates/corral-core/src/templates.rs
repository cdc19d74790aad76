//! Template resolution and the template catalogue

use std::sync::Arc;

use kube::ResourceExt;
use tracing::{info, warn};

use corral_capi::{ControlPlane, ReadPath};
use corral_common::crd::{
    split_template_name, template_resource_name, ClusterTemplate, ClusterTemplateSpec,
    ControlPlaneProviderType, InfraProviderType,
};
use corral_common::{
    Error as ControlPlaneError, DEFAULT_TEMPLATE_LABEL, DEFAULT_TEMPLATE_SELECTOR,
    TEMPLATE_ANNOTATION,
};

use crate::error::{Result, ServiceError};
use crate::models::{
    DefaultTemplateInfo, DefaultTemplateRequest, TemplateInfo, TemplateInfoList, VersionList,
};
use crate::query::{self, QueryParams, Queryable};

impl Queryable for TemplateInfo {
    const FILTER_FIELDS: &'static [&'static str] = &["name", "version", "kubernetesVersion"];
    const ORDER_FIELDS: &'static [&'static str] = &["name", "version"];

    fn field_value(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(&self.name),
            "version" => Some(&self.version),
            "kubernetesVersion" => Some(&self.kubernetes_version),
            _ => None,
        }
    }
}

/// Convert a template resource into its tenant-facing form
pub fn template_info(template: &ClusterTemplate) -> Result<TemplateInfo> {
    let (name, version) = template
        .name_and_version()
        .map_err(|e| ServiceError::internal_from("failed to parse template name", e))?;
    let cluster_configuration = template.spec.cluster_configuration.as_deref().map(|raw| {
        serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
    });
    Ok(TemplateInfo {
        name,
        version,
        kubernetes_version: template.spec.kubernetes_version.clone(),
        control_plane_provider_type: template.spec.control_plane_provider_type.to_string(),
        infra_provider_type: template.spec.infra_provider_type.to_string(),
        cluster_configuration,
        cluster_network: template.spec.cluster_network.clone(),
        cluster_labels: template.spec.cluster_labels.clone(),
    })
}

fn default_template_error(e: ControlPlaneError) -> ServiceError {
    match e {
        ControlPlaneError::DefaultTemplateNotFound => {
            ServiceError::internal("default template not found")
        }
        other => ServiceError::internal(other.to_string()),
    }
}

fn template_not_found(name: &str) -> ServiceError {
    ServiceError::not_found(format!("template {} not found", name))
}

/// Resolves templates and manages the project's template catalogue
pub struct Templates {
    cp: Arc<dyn ControlPlane>,
}

impl Templates {
    /// Create a catalogue over the control plane
    pub fn new(cp: Arc<dyn ControlPlane>) -> Self {
        Self { cp }
    }

    /// Resolve the template a new cluster is created from
    ///
    /// An empty name selects the project default. A name that is not a
    /// composite resource name is taken as a logical name and resolves to its
    /// latest version. The result must be ready and bound to a ClusterClass.
    pub async fn fetch_template(&self, project: &str, name: Option<&str>) -> Result<ClusterTemplate> {
        let template = match name.filter(|n| !n.is_empty()) {
            None => self
                .cp
                .default_template(project)
                .await
                .map_err(default_template_error)?,
            Some(name) => match self.cp.template(project, name).await {
                Ok(t) => t,
                Err(e) if e.is_not_found() => {
                    let version = self.latest_version(project, name).await?;
                    self.cp
                        .template(project, &template_resource_name(name, &version))
                        .await?
                }
                Err(e) => return Err(e.into()),
            },
        };

        if !template.is_ready() {
            return Err(ServiceError::internal(format!(
                "template {} is not ready",
                template.name_any()
            )));
        }
        Ok(template)
    }

    /// Latest version of a logical template name, by lexicographic order
    pub async fn latest_version(&self, project: &str, name: &str) -> Result<String> {
        self.sorted_versions(project, name)
            .await?
            .pop()
            .ok_or_else(|| template_not_found(name))
    }

    async fn sorted_versions(&self, project: &str, name: &str) -> Result<Vec<String>> {
        let templates = self
            .cp
            .templates(project, None)
            .await
            .map_err(|e| ServiceError::internal_from("failed to list templates", e))?;
        let mut versions: Vec<String> = templates
            .iter()
            .filter_map(|t| t.name_and_version().ok())
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v)
            .collect();
        versions.sort();
        Ok(versions)
    }

    /// Paginated template list
    pub async fn list(
        &self,
        project: &str,
        params: &QueryParams,
        default_only: bool,
    ) -> Result<TemplateInfoList> {
        let selector = default_only.then(|| DEFAULT_TEMPLATE_SELECTOR.to_string());
        let templates = self
            .cp
            .templates(project, selector)
            .await
            .map_err(|e| ServiceError::internal_from("failed to list templates", e))?;

        let defaults: Vec<&ClusterTemplate> = templates.iter().filter(|t| t.is_default()).collect();
        let default_template_info = match defaults.as_slice() {
            [only] => {
                let info = template_info(only)?;
                Some(DefaultTemplateInfo {
                    name: info.name,
                    version: info.version,
                })
            }
            _ => None,
        };

        let infos = templates
            .iter()
            .map(template_info)
            .collect::<Result<Vec<_>>>()?;
        let page = query::apply(infos, params)?;
        Ok(TemplateInfoList {
            template_info_list: page.items,
            default_template_info,
            total_elements: i32::try_from(page.total).unwrap_or(i32::MAX),
        })
    }

    /// Every version of a logical template, ascending
    pub async fn versions(&self, project: &str, name: &str) -> Result<VersionList> {
        let version_list = self.sorted_versions(project, name).await?;
        if version_list.is_empty() {
            return Err(template_not_found(name));
        }
        Ok(VersionList { version_list })
    }

    /// One template by name and version
    pub async fn get(&self, project: &str, name: &str, version: &str) -> Result<TemplateInfo> {
        let template = self
            .cp
            .template(project, &template_resource_name(name, version))
            .await?;
        template_info(&template)
    }

    /// Import a template
    pub async fn create(&self, project: &str, info: TemplateInfo) -> Result<()> {
        let template = build_template(&info)?;
        let composite = template.name_any();
        self.cp
            .create_template(project, template)
            .await
            .map_err(|e| match e {
                e if e.is_bad_request() => ServiceError::bad_input(e.to_string()),
                e if e.is_conflict() => ServiceError::Conflict(e.to_string()),
                e => ServiceError::internal_from("failed to create template", e),
            })?;
        info!(namespace = %project, name = %composite, "imported template");
        Ok(())
    }

    /// Delete a template no cluster uses
    pub async fn delete(&self, project: &str, name: &str, version: &str) -> Result<()> {
        let composite = template_resource_name(name, version);
        self.cp.template(project, &composite).await?;

        let clusters = self
            .cp
            .clusters(project, ReadPath::Live)
            .await
            .map_err(|e| ServiceError::internal_from("failed to list clusters", e))?;
        if clusters
            .iter()
            .any(|c| c.annotation(TEMPLATE_ANNOTATION) == Some(composite.as_str()))
        {
            return Err(ServiceError::Conflict("template is in use".into()));
        }

        self.cp.delete_template(project, &composite).await?;
        Ok(())
    }

    /// Make one template version the project default
    ///
    /// Existing defaults are unlabelled first; a failure part way leaves
    /// the ones already processed unlabelled.
    pub async fn set_default(
        &self,
        project: &str,
        name: &str,
        req: DefaultTemplateRequest,
    ) -> Result<()> {
        let version = match req.version.filter(|v| !v.is_empty()) {
            Some(v) => v,
            None => self.latest_version(project, name).await?,
        };
        let composite = template_resource_name(name, &version);
        let target = self
            .cp
            .template(project, &composite)
            .await
            .map_err(|e| match e {
                e if e.is_bad_request() => ServiceError::bad_input(e.to_string()),
                e => ServiceError::from(e),
            })?;
        if target.is_default() {
            return Ok(());
        }

        let current = self
            .cp
            .templates(project, Some(DEFAULT_TEMPLATE_SELECTOR.to_string()))
            .await
            .map_err(|e| ServiceError::internal_from("failed to list default templates", e))?;
        for template in current {
            let old = template.name_any();
            if let Err(e) = self
                .cp
                .remove_template_label(project, &old, DEFAULT_TEMPLATE_LABEL)
                .await
            {
                warn!(namespace = %project, name = %old, error = %e, "failed to unset default template");
                return Err(ServiceError::internal_from("failed to unset default template", e));
            }
        }

        self.cp
            .set_template_label(project, &composite, DEFAULT_TEMPLATE_LABEL, "true")
            .await
            .map_err(|e| ServiceError::internal_from("failed to set default template", e))?;
        info!(namespace = %project, name = %composite, "set default template");
        Ok(())
    }
}

fn build_template(info: &TemplateInfo) -> Result<ClusterTemplate> {
    if info.name.is_empty() {
        return Err(ServiceError::bad_input("template name is required"));
    }
    if info.version.len() < 2 || !info.version.starts_with('v') {
        return Err(ServiceError::bad_input(format!(
            "invalid template version {}: must start with v",
            info.version
        )));
    }
    if info.kubernetes_version.is_empty() {
        return Err(ServiceError::bad_input("kubernetes version is required"));
    }
    let control_plane_provider_type: ControlPlaneProviderType = info
        .control_plane_provider_type
        .parse()
        .map_err(|e: ControlPlaneError| ServiceError::bad_input(e.to_string()))?;
    let infra_provider_type: InfraProviderType = info
        .infra_provider_type
        .parse()
        .map_err(|e: ControlPlaneError| ServiceError::bad_input(e.to_string()))?;

    let composite = template_resource_name(&info.name, &info.version);
    match split_template_name(&composite) {
        Ok((name, version)) if name == info.name && version == info.version => {}
        _ => {
            return Err(ServiceError::bad_input(format!(
                "invalid template name {}",
                info.name
            )))
        }
    }

    Ok(ClusterTemplate::new(
        &composite,
        ClusterTemplateSpec {
            control_plane_provider_type,
            infra_provider_type,
            kubernetes_version: info.kubernetes_version.clone(),
            cluster_configuration: info.cluster_configuration.as_ref().map(|v| v.to_string()),
            cluster_network: info.cluster_network.clone(),
            cluster_labels: info.cluster_labels.clone(),
        },
    ))
}
