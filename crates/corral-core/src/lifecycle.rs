//! Cluster lifecycle: create, delete, node removal and label edits

use std::collections::BTreeMap;
use std::sync::Arc;

use kube::ResourceExt;
use serde_json::json;
use tracing::{info, warn};

use corral_capi::{ControlPlane, ReadPath};
use corral_common::crd::{
    Cluster, ClusterSpec, ClusterTemplate, ClusterVariable, ControlPlaneProviderType,
    ControlPlaneTopology, InfraMachineKind, InfraProviderType, IntelMachineBinding, Machine,
    Topology,
};
use corral_common::labels::{is_valid_cluster_name, is_valid_label_key, merge_labels, validate_labels};
use corral_common::{
    CLUSTER_NAME_LABEL, PROJECT_ID_LABEL, PROMETHEUS_METRICS_URL_LABEL, READ_ONLY_VARIABLE,
    TEMPLATE_ANNOTATION, TRUSTED_COMPUTE_LABEL,
};
use corral_inventory::Inventory;

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::models::ClusterSpecRequest;
use crate::templates::Templates;

/// Creates, deletes and relabels clusters
pub struct ClusterLifecycle {
    cp: Arc<dyn ControlPlane>,
    templates: Arc<Templates>,
    inventory: Option<Arc<dyn Inventory>>,
    config: ServiceConfig,
}

impl ClusterLifecycle {
    /// Create an orchestrator; `inventory` is None when lookups are disabled
    pub fn new(
        cp: Arc<dyn ControlPlane>,
        templates: Arc<Templates>,
        inventory: Option<Arc<dyn Inventory>>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            cp,
            templates,
            inventory,
            config,
        }
    }

    /// Create a single-node cluster, returning its name
    pub async fn create(&self, project: &str, req: ClusterSpecRequest) -> Result<String> {
        if req.nodes.len() != 1 {
            return Err(ServiceError::bad_input(format!(
                "only single node clusters are supported, got {} nodes",
                req.nodes.len()
            )));
        }
        let name = match req.name.as_deref().filter(|n| !n.is_empty()) {
            Some(n) => n.to_string(),
            None => format!("cluster-{}", chrono::Utc::now().timestamp()),
        };
        if !is_valid_cluster_name(&name) {
            return Err(ServiceError::bad_input(format!("invalid cluster name {}", name)));
        }

        let template = self
            .templates
            .fetch_template(project, req.template.as_deref())
            .await?;
        let node_id = req.nodes[0].id.as_str();

        let trusted_compute = self.trusted_compute(project, node_id).await;
        let read_only = self.read_only(project, node_id, &template).await;

        let system_labels = BTreeMap::from([
            (CLUSTER_NAME_LABEL.to_string(), name.clone()),
            (PROJECT_ID_LABEL.to_string(), project.to_string()),
            (PROMETHEUS_METRICS_URL_LABEL.to_string(), self.config.metrics_url()),
            (TRUSTED_COMPUTE_LABEL.to_string(), trusted_compute.to_string()),
        ]);
        let labels = merge_labels([&req.labels, &template.spec.cluster_labels, &system_labels]);
        if let Err(e) = validate_labels(&labels) {
            warn!(namespace = %project, name = %name, error = %e, "rejected cluster labels");
            return Err(ServiceError::bad_input("invalid cluster labels"));
        }

        let cluster = build_cluster(project, &name, &template, labels, req.nodes.len(), read_only)?;
        self.cp
            .create_cluster(project, cluster)
            .await
            .map_err(|e| match e {
                e if e.is_conflict() => ServiceError::Conflict(e.to_string()),
                e if e.is_bad_request() => ServiceError::bad_input(e.to_string()),
                e => ServiceError::internal_from("failed to create cluster", e),
            })?;

        if template.spec.infra_provider_type == InfraProviderType::Intel {
            let template_name = template.name_any();
            for node in &req.nodes {
                let binding = IntelMachineBinding::for_node(&name, &node.id, &template_name);
                if let Err(e) = self.cp.create_binding(project, binding).await {
                    warn!(
                        namespace = %project,
                        name = %name,
                        node_id = %node.id,
                        error = %e,
                        "failed to create machine binding"
                    );
                    return Err(ServiceError::internal("failed to create machine bindings"));
                }
            }
        }

        info!(namespace = %project, name = %name, template = %template.name_any(), "created cluster");
        Ok(name)
    }

    async fn trusted_compute(&self, project: &str, node_id: &str) -> bool {
        let Some(inventory) = &self.inventory else {
            return false;
        };
        match inventory.host_trusted_compute(project, node_id).await {
            Ok(trusted) => trusted,
            Err(e) => {
                warn!(namespace = %project, node_id = %node_id, error = %e, "trusted compute lookup failed");
                false
            }
        }
    }

    async fn read_only(&self, project: &str, node_id: &str, template: &ClusterTemplate) -> bool {
        if template.spec.control_plane_provider_type != ControlPlaneProviderType::K3s {
            return false;
        }
        let Some(inventory) = &self.inventory else {
            return true;
        };
        match inventory.is_immutable(project, node_id).await {
            Ok(immutable) => immutable,
            Err(e) => {
                warn!(namespace = %project, node_id = %node_id, error = %e, "immutable OS lookup failed");
                false
            }
        }
    }

    /// Delete a cluster, unpausing it first if needed
    pub async fn delete(&self, project: &str, name: &str) -> Result<()> {
        self.delete_with_grace(project, name, None).await
    }

    async fn delete_with_grace(
        &self,
        project: &str,
        name: &str,
        grace_period_seconds: Option<u32>,
    ) -> Result<()> {
        if project.is_empty() || name.is_empty() {
            return Err(ServiceError::bad_input("project and cluster name are required"));
        }

        let cluster = self.cp.cluster(project, name, ReadPath::Live).await?;
        if cluster.is_paused() {
            self.cp
                .patch_cluster(project, name, json!({ "spec": { "paused": false } }))
                .await
                .map_err(|e| match e {
                    e if e.is_not_found() => ServiceError::from(e),
                    e => ServiceError::internal_from("failed to unpause cluster", e),
                })?;
            info!(namespace = %project, name = %name, "unpaused cluster before deletion");
        }

        self.cp
            .delete_cluster(project, name, grace_period_seconds)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => ServiceError::from(e),
                e => ServiceError::internal_from("failed to delete cluster", e),
            })
    }

    /// Remove a node; only single-node clusters, where this deletes the cluster
    pub async fn delete_node(
        &self,
        project: &str,
        cluster_name: &str,
        node_id: &str,
        force: bool,
    ) -> Result<()> {
        let machines = self
            .cp
            .machines(project, cluster_name, ReadPath::Live)
            .await
            .map_err(|e| ServiceError::internal_from("failed to list machines", e))?;
        let machine = match machines.as_slice() {
            [only] => only,
            [] => {
                return Err(ServiceError::internal(format!(
                    "cluster {} has no nodes",
                    cluster_name
                )))
            }
            _ => return Err(ServiceError::internal("multi node clusters are not supported")),
        };
        if !self.is_node_of(project, machine, node_id).await? {
            return Err(ServiceError::internal(format!(
                "node {} does not belong to cluster {}",
                node_id, cluster_name
            )));
        }

        info!(
            namespace = %project,
            name = %cluster_name,
            node_id = %node_id,
            force,
            "deleting single node cluster"
        );
        let grace = force.then_some(0);
        self.delete_with_grace(project, cluster_name, grace).await
    }

    /// True if `node_id` names the machine's host or its workload node
    async fn is_node_of(&self, project: &str, machine: &Machine, node_id: &str) -> Result<bool> {
        if machine.node_uid() == Some(node_id) {
            return Ok(true);
        }
        let infra = &machine.spec.infrastructure_ref;
        let kind = InfraMachineKind::from_kind(&infra.kind)
            .map_err(|e| ServiceError::internal_from("failed to resolve machine", e))?;
        let provider = self
            .cp
            .provider_machine(project, kind, &infra.name)
            .await
            .map_err(|e| ServiceError::internal_from("failed to get provider machine", e))?;
        Ok(provider.host_id() == Some(node_id))
    }

    /// Replace the user labels of a cluster
    pub async fn update_labels(
        &self,
        project: &str,
        name: &str,
        labels: BTreeMap<String, String>,
    ) -> Result<()> {
        let keys_ok = labels
            .keys()
            .all(|k| is_valid_label_key(k) && !self.config.system_labels.is_system(k));
        if !keys_ok {
            return Err(ServiceError::bad_input("invalid cluster label keys"));
        }

        self.cp
            .set_cluster_labels(project, name, labels)
            .await
            .map_err(|e| match e {
                e if e.is_bad_request() => ServiceError::bad_input(e.to_string()),
                e if e.is_not_found() => ServiceError::from(e),
                e => ServiceError::internal_from("failed to update cluster labels", e),
            })?;
        info!(namespace = %project, name = %name, "updated cluster labels");
        Ok(())
    }
}

fn build_cluster(
    project: &str,
    name: &str,
    template: &ClusterTemplate,
    labels: BTreeMap<String, String>,
    node_count: usize,
    read_only: bool,
) -> Result<Cluster> {
    let class = template
        .cluster_class_name()
        .ok_or_else(|| ServiceError::internal(format!("template {} is not ready", template.name_any())))?;

    let variables = if read_only {
        vec![ClusterVariable {
            name: READ_ONLY_VARIABLE.to_string(),
            value: json!(true),
        }]
    } else {
        Vec::new()
    };

    let mut cluster = Cluster::new(
        name,
        ClusterSpec {
            paused: None,
            cluster_network: template.spec.cluster_network.clone(),
            topology: Some(Topology {
                class: class.to_string(),
                version: template.spec.kubernetes_version.clone(),
                control_plane: Some(ControlPlaneTopology {
                    replicas: Some(i32::try_from(node_count).unwrap_or(i32::MAX)),
                }),
                variables,
            }),
        },
    );
    cluster.metadata.namespace = Some(project.to_string());
    cluster.metadata.labels = Some(labels);
    cluster.metadata.annotations = Some(BTreeMap::from([(
        TEMPLATE_ANNOTATION.to_string(),
        template.name_any(),
    )]));
    Ok(cluster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_capi::MockControlPlane;
    use corral_common::crd::{
        ClusterStatus, ClusterTemplateSpec, ClusterTemplateStatus, IntelMachine,
        IntelMachineSpec, MachineSpec, MachineStatus, NodeReference, ObjectReference,
        ProviderMachine,
    };
    use corral_common::{Error as CpError, HOST_ID_ANNOTATION};
    use corral_inventory::MockInventory;
    use mockall::predicate::eq;
    use mockall::Sequence;

    use crate::models::NodeSpec;

    fn template(
        composite: &str,
        cp: ControlPlaneProviderType,
        infra: InfraProviderType,
        ready: bool,
    ) -> ClusterTemplate {
        let mut t = ClusterTemplate::new(
            composite,
            ClusterTemplateSpec {
                control_plane_provider_type: cp,
                infra_provider_type: infra,
                kubernetes_version: "v1.30.0".into(),
                cluster_labels: BTreeMap::from([(
                    "default-extension".to_string(),
                    "baseline".to_string(),
                )]),
                ..Default::default()
            },
        );
        t.status = Some(ClusterTemplateStatus {
            ready,
            cluster_class_ref: Some(ObjectReference {
                name: "example-cluster-class".into(),
                ..Default::default()
            }),
        });
        t
    }

    fn request(nodes: usize) -> ClusterSpecRequest {
        ClusterSpecRequest {
            name: Some("example-cluster".into()),
            template: Some("baseline-kubeadm-v0.1.0".into()),
            nodes: (0..nodes)
                .map(|i| NodeSpec {
                    id: format!("n{}", i + 1),
                    role: "all".into(),
                })
                .collect(),
            labels: BTreeMap::from([("test".to_string(), "true".to_string())]),
        }
    }

    fn config() -> ServiceConfig {
        ServiceConfig {
            cluster_domain: "kind.internal".into(),
            ..Default::default()
        }
    }

    fn lifecycle(mock: MockControlPlane, inventory: Option<MockInventory>) -> ClusterLifecycle {
        let cp: Arc<dyn ControlPlane> = Arc::new(mock);
        ClusterLifecycle::new(
            cp.clone(),
            Arc::new(Templates::new(cp)),
            inventory.map(|i| Arc::new(i) as Arc<dyn Inventory>),
            config(),
        )
    }

    #[tokio::test]
    async fn test_create_rejects_node_counts() {
        for n in [0, 2] {
            let err = lifecycle(MockControlPlane::new(), None)
                .create("p1", request(n))
                .await
                .unwrap_err();
            assert_eq!(
                err,
                ServiceError::bad_input(format!(
                    "only single node clusters are supported, got {} nodes",
                    n
                ))
            );
        }
    }

    #[tokio::test]
    async fn test_create_kubeadm_cluster() {
        let mut mock = MockControlPlane::new();
        mock.expect_template().returning(|_, n| {
            Ok(template(
                n,
                ControlPlaneProviderType::Kubeadm,
                InfraProviderType::Docker,
                true,
            ))
        });
        mock.expect_create_cluster()
            .withf(|project, c| {
                let labels = c.labels();
                let topology = c.spec.topology.as_ref().unwrap();
                project == "p1"
                    && c.name_any() == "example-cluster"
                    && labels[CLUSTER_NAME_LABEL] == "example-cluster"
                    && labels[PROJECT_ID_LABEL] == "p1"
                    && labels["default-extension"] == "baseline"
                    && labels["test"] == "true"
                    && labels[TRUSTED_COMPUTE_LABEL] == "false"
                    && labels[PROMETHEUS_METRICS_URL_LABEL] == "metrics-node.kind.internal"
                    && topology.class == "example-cluster-class"
                    && topology.version == "v1.30.0"
                    && topology.variables.is_empty()
                    && topology.control_plane.as_ref().unwrap().replicas == Some(1)
                    && c.annotation(TEMPLATE_ANNOTATION) == Some("baseline-kubeadm-v0.1.0")
            })
            .returning(|_, c| Ok(c.name_any()));
        mock.expect_create_binding().never();

        let name = lifecycle(mock, None)
            .create("p1", request(1))
            .await
            .unwrap();
        assert_eq!(name, "example-cluster");
    }

    #[tokio::test]
    async fn test_create_intel_cluster_binds_node() {
        let mut mock = MockControlPlane::new();
        mock.expect_template().returning(|_, n| {
            Ok(template(
                n,
                ControlPlaneProviderType::Rke2,
                InfraProviderType::Intel,
                true,
            ))
        });
        mock.expect_create_cluster().returning(|_, c| Ok(c.name_any()));
        mock.expect_create_binding()
            .withf(|project, b| {
                project == "p1"
                    && b.name_any() == "example-cluster-n1"
                    && b.spec.node_guid == "n1"
                    && b.spec.intel_machine_template_name == "baseline-kubeadm-v0.1.0-controlplane"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut inventory = MockInventory::new();
        inventory
            .expect_host_trusted_compute()
            .with(eq("p1"), eq("n1"))
            .returning(|_, _| Ok(true));

        lifecycle(mock, Some(inventory))
            .create("p1", request(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_binding_failure() {
        let mut mock = MockControlPlane::new();
        mock.expect_template().returning(|_, n| {
            Ok(template(
                n,
                ControlPlaneProviderType::Rke2,
                InfraProviderType::Intel,
                true,
            ))
        });
        mock.expect_create_cluster().returning(|_, c| Ok(c.name_any()));
        mock.expect_create_binding()
            .returning(|_, _| Err(CpError::internal("webhook down")));

        let err = lifecycle(mock, None)
            .create("p1", request(1))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::internal("failed to create machine bindings"));
    }

    #[tokio::test]
    async fn test_create_unready_template() {
        let mut mock = MockControlPlane::new();
        mock.expect_template().returning(|_, n| {
            Ok(template(
                n,
                ControlPlaneProviderType::Kubeadm,
                InfraProviderType::Docker,
                false,
            ))
        });
        mock.expect_create_cluster().never();

        let err = lifecycle(mock, None)
            .create("p1", request(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Internal(ref m) if m.contains("is not ready")));
    }

    #[tokio::test]
    async fn test_create_k3s_read_only_without_inventory() {
        let mut mock = MockControlPlane::new();
        mock.expect_template().returning(|_, n| {
            Ok(template(
                n,
                ControlPlaneProviderType::K3s,
                InfraProviderType::Docker,
                true,
            ))
        });
        mock.expect_create_cluster()
            .withf(|_, c| {
                let vars = &c.spec.topology.as_ref().unwrap().variables;
                vars.len() == 1 && vars[0].name == "readOnly" && vars[0].value == json!(true)
            })
            .returning(|_, c| Ok(c.name_any()));

        lifecycle(mock, None).create("p1", request(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_k3s_inventory_failures_are_not_fatal() {
        let mut mock = MockControlPlane::new();
        mock.expect_template().returning(|_, n| {
            Ok(template(
                n,
                ControlPlaneProviderType::K3s,
                InfraProviderType::Docker,
                true,
            ))
        });
        mock.expect_create_cluster()
            .withf(|_, c| {
                c.spec.topology.as_ref().unwrap().variables.is_empty()
                    && c.labels()[TRUSTED_COMPUTE_LABEL] == "false"
            })
            .returning(|_, c| Ok(c.name_any()));

        let mut inventory = MockInventory::new();
        inventory
            .expect_host_trusted_compute()
            .returning(|_, n| Err(corral_inventory::Error::HostNotFound(n.to_string())));
        inventory
            .expect_is_immutable()
            .returning(|_, _| Err(corral_inventory::Error::Request("timeout".into())));

        lifecycle(mock, Some(inventory))
            .create("p1", request(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_invalid_labels() {
        let mut mock = MockControlPlane::new();
        mock.expect_template().returning(|_, n| {
            Ok(template(
                n,
                ControlPlaneProviderType::Kubeadm,
                InfraProviderType::Docker,
                true,
            ))
        });
        mock.expect_create_cluster().never();

        let mut req = request(1);
        req.labels.insert("bad key!".into(), "x".into());
        let err = lifecycle(mock, None).create("p1", req).await.unwrap_err();
        assert_eq!(err, ServiceError::bad_input("invalid cluster labels"));
    }

    #[tokio::test]
    async fn test_create_generates_name() {
        let mut mock = MockControlPlane::new();
        mock.expect_template().returning(|_, n| {
            Ok(template(
                n,
                ControlPlaneProviderType::Kubeadm,
                InfraProviderType::Docker,
                true,
            ))
        });
        mock.expect_create_cluster().returning(|_, c| Ok(c.name_any()));

        let mut req = request(1);
        req.name = None;
        let name = lifecycle(mock, None).create("p1", req).await.unwrap();
        assert!(name.starts_with("cluster-"));
    }

    fn existing(paused: bool) -> Cluster {
        let mut c = Cluster::new(
            "example-cluster",
            ClusterSpec {
                paused: Some(paused),
                ..Default::default()
            },
        );
        c.status = Some(ClusterStatus::default());
        c
    }

    #[tokio::test]
    async fn test_delete_paused_cluster_unpauses_first() {
        let mut mock = MockControlPlane::new();
        let mut seq = Sequence::new();
        mock.expect_cluster()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(existing(true)));
        mock.expect_patch_cluster()
            .with(
                eq("p1"),
                eq("example-cluster"),
                eq(json!({ "spec": { "paused": false } })),
            )
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        mock.expect_delete_cluster()
            .with(eq("p1"), eq("example-cluster"), eq(None))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        lifecycle(mock, None)
            .delete("p1", "example-cluster")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_unpaused_cluster_skips_patch() {
        let mut mock = MockControlPlane::new();
        mock.expect_cluster().returning(|_, _, _| Ok(existing(false)));
        mock.expect_patch_cluster().never();
        mock.expect_delete_cluster().times(1).returning(|_, _, _| Ok(()));

        lifecycle(mock, None)
            .delete("p1", "example-cluster")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_cluster() {
        let mut mock = MockControlPlane::new();
        mock.expect_cluster()
            .returning(|_, n, _| Err(CpError::not_found("Cluster", n)));
        let err = lifecycle(mock, None).delete("p1", "ghost").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    fn node_machine(host: &str) -> Machine {
        Machine::new(
            "example-cluster-cp-0",
            MachineSpec {
                cluster_name: "example-cluster".into(),
                infrastructure_ref: ObjectReference {
                    kind: "IntelMachine".into(),
                    name: format!("{}-im", host),
                    ..Default::default()
                },
                version: None,
            },
        )
    }

    fn intel_host(host: &str) -> ProviderMachine {
        let mut im = IntelMachine::new(&format!("{}-im", host), IntelMachineSpec::default());
        im.metadata.annotations = Some(BTreeMap::from([(
            HOST_ID_ANNOTATION.to_string(),
            host.to_string(),
        )]));
        ProviderMachine::Intel(im)
    }

    #[tokio::test]
    async fn test_delete_node_force() {
        let mut mock = MockControlPlane::new();
        mock.expect_machines()
            .returning(|_, _, _| Ok(vec![node_machine("n1")]));
        mock.expect_provider_machine()
            .withf(|p, kind, name| p == "p1" && *kind == InfraMachineKind::Intel && name == "n1-im")
            .returning(|_, _, _| Ok(intel_host("n1")));
        mock.expect_cluster().returning(|_, _, _| Ok(existing(false)));
        mock.expect_delete_cluster()
            .with(eq("p1"), eq("example-cluster"), eq(Some(0)))
            .times(1)
            .returning(|_, _, _| Ok(()));

        lifecycle(mock, None)
            .delete_node("p1", "example-cluster", "n1", true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_node_matches_workload_node_uid() {
        let mut mock = MockControlPlane::new();
        mock.expect_machines().returning(|_, _, _| {
            let mut m = node_machine("n1");
            m.status = Some(MachineStatus {
                node_ref: Some(NodeReference {
                    name: "node".into(),
                    uid: "uid-1".into(),
                }),
                ..Default::default()
            });
            Ok(vec![m])
        });
        mock.expect_provider_machine().never();
        mock.expect_cluster().returning(|_, _, _| Ok(existing(false)));
        mock.expect_delete_cluster()
            .with(eq("p1"), eq("example-cluster"), eq(None))
            .times(1)
            .returning(|_, _, _| Ok(()));

        lifecycle(mock, None)
            .delete_node("p1", "example-cluster", "uid-1", false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_node_without_machines() {
        let mut mock = MockControlPlane::new();
        mock.expect_machines().returning(|_, _, _| Ok(vec![]));
        mock.expect_delete_cluster().never();

        let err = lifecycle(mock, None)
            .delete_node("p1", "example-cluster", "n1", false)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::internal("cluster example-cluster has no nodes"));
    }

    #[tokio::test]
    async fn test_delete_node_of_another_cluster() {
        let mut mock = MockControlPlane::new();
        mock.expect_machines()
            .returning(|_, _, _| Ok(vec![node_machine("n1")]));
        mock.expect_provider_machine()
            .returning(|_, _, _| Ok(intel_host("n1")));
        mock.expect_delete_cluster().never();

        let err = lifecycle(mock, None)
            .delete_node("p1", "example-cluster", "n7", false)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::internal("node n7 does not belong to cluster example-cluster")
        );
    }

    #[tokio::test]
    async fn test_delete_node_multi_node() {
        let mut mock = MockControlPlane::new();
        mock.expect_machines().returning(|_, _, _| {
            Ok(vec![
                Machine::new("m1", Default::default()),
                Machine::new("m2", Default::default()),
            ])
        });
        mock.expect_delete_cluster().never();

        let err = lifecycle(mock, None)
            .delete_node("p1", "example-cluster", "n1", false)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::internal("multi node clusters are not supported"));
    }

    #[tokio::test]
    async fn test_update_labels() {
        let mut mock = MockControlPlane::new();
        mock.expect_set_cluster_labels()
            .withf(|p, c, labels| p == "p1" && c == "edge-1" && labels["env"] == "prod")
            .times(1)
            .returning(|_, _, _| Ok(()));
        let labels = BTreeMap::from([("env".to_string(), "prod".to_string())]);
        lifecycle(mock, None)
            .update_labels("p1", "edge-1", labels)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_labels_rejects_bad_and_system_keys() {
        for key in ["bad key", "edge-orchestrator.intel.com/clustername"] {
            let mut mock = MockControlPlane::new();
            mock.expect_set_cluster_labels().never();
            let labels = BTreeMap::from([(key.to_string(), "x".to_string())]);
            let err = lifecycle(mock, None)
                .update_labels("p1", "edge-1", labels)
                .await
                .unwrap_err();
            assert_eq!(err, ServiceError::bad_input("invalid cluster label keys"));
        }
    }

    #[tokio::test]
    async fn test_update_labels_maps_bad_request() {
        let mut mock = MockControlPlane::new();
        mock.expect_set_cluster_labels()
            .returning(|_, _, _| Err(CpError::BadRequest("invalid value".into())));
        let labels = BTreeMap::from([("env".to_string(), "prod".to_string())]);
        let err = lifecycle(mock, None)
            .update_labels("p1", "edge-1", labels)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadInput(_)));
    }
}
