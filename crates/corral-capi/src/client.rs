//! Control-plane client for cluster, machine, template and secret resources
//!
//! Provides a trait-based abstraction over the tenant namespace so the
//! service layer can be tested against mocks while production code talks to
//! the API server through kube-rs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::{debug, info};

#[cfg(any(test, feature = "mock"))]
use mockall::automock;

use corral_common::crd::{
    Cluster, ClusterTemplate, DockerMachine, InfraMachineKind, IntelMachine, IntelMachineBinding,
    Machine, ProviderMachine,
};
use corral_common::labels::SystemLabelPrefixes;
use corral_common::{Error, DEFAULT_TEMPLATE_SELECTOR};

use crate::cache::ResourceCache;
use crate::kube_utils::{
    machine_selector, remove_label_patch, secret_api_resource, secret_string_data,
    set_label_patch,
};

/// Which read path a query should use
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadPath {
    /// Straight to the API server
    #[default]
    Live,
    /// From the informer cache, when one is running
    Cached,
}

/// A secret with its `data` values still base64 encoded
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecretData {
    /// Secret name
    pub name: String,
    /// Encoded values by key
    pub data: BTreeMap<String, String>,
}

/// Trait abstracting control-plane operations in a tenant namespace
///
/// Every method takes the project id, which doubles as the namespace.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Get one cluster
    async fn cluster(&self, project: &str, name: &str, read: ReadPath) -> Result<Cluster, Error>;

    /// List every cluster in the project
    async fn clusters(&self, project: &str, read: ReadPath) -> Result<Vec<Cluster>, Error>;

    /// List the machines of one cluster
    async fn machines(
        &self,
        project: &str,
        cluster_name: &str,
        read: ReadPath,
    ) -> Result<Vec<Machine>, Error>;

    /// List every machine in the project
    async fn all_machines(&self, project: &str, read: ReadPath) -> Result<Vec<Machine>, Error>;

    /// Get the provider machine a Machine's infrastructureRef points at
    async fn provider_machine(
        &self,
        project: &str,
        kind: InfraMachineKind,
        name: &str,
    ) -> Result<ProviderMachine, Error>;

    /// Get a template by composite name
    async fn template(&self, project: &str, name: &str) -> Result<ClusterTemplate, Error>;

    /// List templates, optionally narrowed by a label selector
    async fn templates(
        &self,
        project: &str,
        selector: Option<String>,
    ) -> Result<Vec<ClusterTemplate>, Error>;

    /// The single template labelled `default=true`
    async fn default_template(&self, project: &str) -> Result<ClusterTemplate, Error>;

    /// Create a template
    async fn create_template(
        &self,
        project: &str,
        template: ClusterTemplate,
    ) -> Result<ClusterTemplate, Error>;

    /// Delete a template by composite name
    async fn delete_template(&self, project: &str, name: &str) -> Result<(), Error>;

    /// Set one label on a template
    async fn set_template_label(
        &self,
        project: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), Error>;

    /// Remove one label from a template
    async fn remove_template_label(&self, project: &str, name: &str, key: &str)
        -> Result<(), Error>;

    /// Create a cluster, returning its name
    async fn create_cluster(&self, project: &str, cluster: Cluster) -> Result<String, Error>;

    /// Replace a cluster
    async fn update_cluster(&self, project: &str, cluster: Cluster) -> Result<Cluster, Error>;

    /// Apply a JSON merge patch to a cluster
    async fn patch_cluster(
        &self,
        project: &str,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<(), Error>;

    /// Delete a cluster; `Some(0)` forces immediate deletion
    async fn delete_cluster(
        &self,
        project: &str,
        name: &str,
        grace_period_seconds: Option<u32>,
    ) -> Result<(), Error>;

    /// Create a machine binding
    async fn create_binding(&self, project: &str, binding: IntelMachineBinding)
        -> Result<(), Error>;

    /// Get a secret with encoded data
    async fn secret(&self, project: &str, name: &str) -> Result<SecretData, Error>;

    /// Replace the user labels of a cluster, keeping system labels
    async fn set_cluster_labels(
        &self,
        project: &str,
        cluster_name: &str,
        user_labels: BTreeMap<String, String>,
    ) -> Result<(), Error>;
}

/// Pick the default template out of a `default=true` listing
pub fn select_default(mut templates: Vec<ClusterTemplate>) -> Result<ClusterTemplate, Error> {
    match templates.len() {
        0 => Err(Error::DefaultTemplateNotFound),
        1 => Ok(templates.remove(0)),
        n => Err(Error::MultipleDefaultTemplates(n)),
    }
}

/// Control plane backed by a kube client
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
    system_labels: SystemLabelPrefixes,
    cache: Option<ResourceCache>,
}

impl KubeControlPlane {
    /// Create a control plane that always reads live
    pub fn new(client: Client, system_labels: SystemLabelPrefixes) -> Self {
        Self {
            client,
            system_labels,
            cache: None,
        }
    }

    /// Serve `ReadPath::Cached` reads from a running cache
    pub fn with_cache(mut self, cache: ResourceCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn cache_for(&self, read: ReadPath) -> Option<&ResourceCache> {
        match read {
            ReadPath::Cached => self.cache.as_ref(),
            ReadPath::Live => None,
        }
    }

    fn clusters_api(&self, project: &str) -> Api<Cluster> {
        Api::namespaced(self.client.clone(), project)
    }

    fn machines_api(&self, project: &str) -> Api<Machine> {
        Api::namespaced(self.client.clone(), project)
    }

    fn templates_api(&self, project: &str) -> Api<ClusterTemplate> {
        Api::namespaced(self.client.clone(), project)
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn cluster(&self, project: &str, name: &str, read: ReadPath) -> Result<Cluster, Error> {
        if let Some(cache) = self.cache_for(read) {
            return cache.cluster(project, name);
        }
        self.clusters_api(project)
            .get(name)
            .await
            .map_err(|e| Error::from(e).for_resource("Cluster", name))
    }

    async fn clusters(&self, project: &str, read: ReadPath) -> Result<Vec<Cluster>, Error> {
        if let Some(cache) = self.cache_for(read) {
            return Ok(cache.clusters(project));
        }
        let list = self.clusters_api(project).list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn machines(
        &self,
        project: &str,
        cluster_name: &str,
        read: ReadPath,
    ) -> Result<Vec<Machine>, Error> {
        if let Some(cache) = self.cache_for(read) {
            return Ok(cache.machines_for_cluster(project, cluster_name));
        }
        let list = self
            .machines_api(project)
            .list(&ListParams::default().labels(&machine_selector(cluster_name)))
            .await?;
        Ok(list.items)
    }

    async fn all_machines(&self, project: &str, read: ReadPath) -> Result<Vec<Machine>, Error> {
        if let Some(cache) = self.cache_for(read) {
            return Ok(cache.machines(project));
        }
        let list = self.machines_api(project).list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn provider_machine(
        &self,
        project: &str,
        kind: InfraMachineKind,
        name: &str,
    ) -> Result<ProviderMachine, Error> {
        let not_found = |e: kube::Error| Error::from(e).for_resource(kind.kind(), name);
        match kind {
            InfraMachineKind::Intel => {
                let api: Api<IntelMachine> = Api::namespaced(self.client.clone(), project);
                api.get(name).await.map(ProviderMachine::Intel).map_err(not_found)
            }
            InfraMachineKind::Docker => {
                let api: Api<DockerMachine> = Api::namespaced(self.client.clone(), project);
                api.get(name).await.map(ProviderMachine::Docker).map_err(not_found)
            }
        }
    }

    async fn template(&self, project: &str, name: &str) -> Result<ClusterTemplate, Error> {
        self.templates_api(project)
            .get(name)
            .await
            .map_err(|e| Error::from(e).for_resource("ClusterTemplate", name))
    }

    async fn templates(
        &self,
        project: &str,
        selector: Option<String>,
    ) -> Result<Vec<ClusterTemplate>, Error> {
        let mut params = ListParams::default();
        if let Some(selector) = selector.as_deref() {
            params = params.labels(selector);
        }
        let list = self.templates_api(project).list(&params).await?;
        Ok(list.items)
    }

    async fn default_template(&self, project: &str) -> Result<ClusterTemplate, Error> {
        let defaults = self
            .templates(project, Some(DEFAULT_TEMPLATE_SELECTOR.to_string()))
            .await?;
        select_default(defaults)
    }

    async fn create_template(
        &self,
        project: &str,
        mut template: ClusterTemplate,
    ) -> Result<ClusterTemplate, Error> {
        template.metadata.namespace = Some(project.to_string());
        let name = template.name_any();
        let created = self
            .templates_api(project)
            .create(&PostParams::default(), &template)
            .await?;
        info!(namespace = %project, name = %name, "created cluster template");
        Ok(created)
    }

    async fn delete_template(&self, project: &str, name: &str) -> Result<(), Error> {
        self.templates_api(project)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| Error::from(e).for_resource("ClusterTemplate", name))?;
        info!(namespace = %project, name = %name, "deleted cluster template");
        Ok(())
    }

    async fn set_template_label(
        &self,
        project: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), Error> {
        self.templates_api(project)
            .patch(
                name,
                &PatchParams::default(),
                &Patch::Merge(&set_label_patch(key, value)),
            )
            .await
            .map_err(|e| Error::from(e).for_resource("ClusterTemplate", name))?;
        debug!(namespace = %project, name = %name, label = %key, "set template label");
        Ok(())
    }

    async fn remove_template_label(
        &self,
        project: &str,
        name: &str,
        key: &str,
    ) -> Result<(), Error> {
        self.templates_api(project)
            .patch(
                name,
                &PatchParams::default(),
                &Patch::Merge(&remove_label_patch(key)),
            )
            .await
            .map_err(|e| Error::from(e).for_resource("ClusterTemplate", name))?;
        debug!(namespace = %project, name = %name, label = %key, "removed template label");
        Ok(())
    }

    async fn create_cluster(&self, project: &str, mut cluster: Cluster) -> Result<String, Error> {
        cluster.metadata.namespace = Some(project.to_string());
        let created = self
            .clusters_api(project)
            .create(&PostParams::default(), &cluster)
            .await?;
        let name = created.name_any();
        info!(namespace = %project, name = %name, "created cluster");
        Ok(name)
    }

    async fn update_cluster(&self, project: &str, cluster: Cluster) -> Result<Cluster, Error> {
        let name = cluster.name_any();
        let updated = self
            .clusters_api(project)
            .replace(&name, &PostParams::default(), &cluster)
            .await
            .map_err(|e| Error::from(e).for_resource("Cluster", &name))?;
        info!(namespace = %project, name = %name, "updated cluster");
        Ok(updated)
    }

    async fn patch_cluster(
        &self,
        project: &str,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<(), Error> {
        self.clusters_api(project)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| Error::from(e).for_resource("Cluster", name))?;
        info!(namespace = %project, name = %name, "patched cluster");
        Ok(())
    }

    async fn delete_cluster(
        &self,
        project: &str,
        name: &str,
        grace_period_seconds: Option<u32>,
    ) -> Result<(), Error> {
        let params = DeleteParams {
            grace_period_seconds,
            ..DeleteParams::default()
        };
        self.clusters_api(project)
            .delete(name, &params)
            .await
            .map_err(|e| Error::from(e).for_resource("Cluster", name))?;
        info!(
            namespace = %project,
            name = %name,
            grace_period_seconds = ?grace_period_seconds,
            "deleted cluster"
        );
        Ok(())
    }

    async fn create_binding(
        &self,
        project: &str,
        mut binding: IntelMachineBinding,
    ) -> Result<(), Error> {
        binding.metadata.namespace = Some(project.to_string());
        let api: Api<IntelMachineBinding> = Api::namespaced(self.client.clone(), project);
        api.create(&PostParams::default(), &binding).await?;
        info!(namespace = %project, name = %binding.name_any(), "created machine binding");
        Ok(())
    }

    async fn secret(&self, project: &str, name: &str) -> Result<SecretData, Error> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), project, &secret_api_resource());
        let obj = api
            .get(name)
            .await
            .map_err(|e| Error::from(e).for_resource("Secret", name))?;
        Ok(SecretData {
            name: obj.name_any(),
            data: secret_string_data(&obj),
        })
    }

    async fn set_cluster_labels(
        &self,
        project: &str,
        cluster_name: &str,
        user_labels: BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let mut cluster = self.cluster(project, cluster_name, ReadPath::Live).await?;
        let labels = self
            .system_labels
            .replace_user_labels(cluster.labels(), &user_labels);
        cluster.metadata.labels = Some(labels);
        self.update_cluster(project, cluster).await?;
        Ok(())
    }
}
