//! Cluster views assembled from the control plane

use std::collections::BTreeMap;
use std::sync::Arc;

use kube::ResourceExt;
use tracing::warn;

use corral_capi::{ControlPlane, ReadPath};
use corral_common::crd::{Cluster, InfraMachineKind, Machine};
use corral_common::labels::SystemLabelPrefixes;

use crate::error::{Result, ServiceError};
use crate::models::{
    ClusterDetailInfo, ClusterInfo, ClusterList, ClusterSummary, GenericStatus, NodeInfo,
    StatusIndicator,
};
use crate::query::{self, QueryParams, Queryable};
use crate::status;

/// Role reported for every node of a single-node cluster
pub const NODE_ROLE_ALL: &str = "all";

impl Queryable for ClusterInfo {
    const FILTER_FIELDS: &'static [&'static str] = &[
        "name",
        "kubernetesVersion",
        "providerStatus",
        "lifecyclePhase",
    ];
    const ORDER_FIELDS: &'static [&'static str] = Self::FILTER_FIELDS;

    fn field_value(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(&self.name),
            "kubernetesVersion" => Some(&self.kubernetes_version),
            "providerStatus" => Some(&self.provider_status.message),
            "lifecyclePhase" => Some(
                self.lifecycle_phase
                    .as_ref()
                    .map(|s| s.message.as_str())
                    .unwrap_or_default(),
            ),
            _ => None,
        }
    }
}

/// Builds tenant-facing cluster views
pub struct ClusterViews {
    cp: Arc<dyn ControlPlane>,
    labels: SystemLabelPrefixes,
}

impl ClusterViews {
    /// Create a view assembler
    pub fn new(cp: Arc<dyn ControlPlane>, labels: SystemLabelPrefixes) -> Self {
        Self { cp, labels }
    }

    /// Detail view of one cluster
    pub async fn detail(&self, project: &str, name: &str) -> Result<ClusterDetailInfo> {
        let cluster = self.cp.cluster(project, name, ReadPath::Live).await?;
        self.detail_of(project, cluster).await
    }

    /// Detail view of the cluster a node belongs to
    pub async fn detail_by_node(&self, project: &str, node_id: &str) -> Result<ClusterDetailInfo> {
        let machines = self
            .cp
            .all_machines(project, ReadPath::Live)
            .await
            .map_err(|e| ServiceError::internal_from("failed to list machines", e))?;
        let machine = machines
            .iter()
            .find(|m| m.node_uid() == Some(node_id))
            .ok_or_else(|| ServiceError::not_found("machine not found"))?;

        let cluster = self
            .cp
            .cluster(project, &machine.spec.cluster_name, ReadPath::Live)
            .await?;
        self.detail_of(project, cluster).await
    }

    async fn detail_of(&self, project: &str, cluster: Cluster) -> Result<ClusterDetailInfo> {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        if name.is_empty() {
            return Err(ServiceError::internal("missing cluster name"));
        }

        let machines = self
            .cp
            .machines(project, &name, ReadPath::Live)
            .await
            .map_err(|e| ServiceError::internal_from("failed to list machines", e))?;

        let mut nodes = Vec::with_capacity(machines.len());
        for machine in &machines {
            nodes.push(self.node_info(project, machine).await?);
        }

        let detail = ClusterDetailInfo {
            name,
            kubernetes_version: cluster.kubernetes_version().to_string(),
            labels: self.labels.user_labels(cluster.labels()),
            template: cluster.topology_class().to_string(),
            lifecycle_phase: lifecycle_status(project, &cluster),
            provider_status: status::provider_status(&cluster),
            control_plane_ready: status::control_plane_ready(&cluster),
            infrastructure_ready: status::infrastructure_ready(&cluster),
            node_health: status::node_health(&cluster, &machines),
            nodes,
        };
        validate_detail(&detail)?;
        Ok(detail)
    }

    async fn node_info(&self, project: &str, machine: &Machine) -> Result<NodeInfo> {
        let infra = &machine.spec.infrastructure_ref;
        let kind = InfraMachineKind::from_kind(&infra.kind)
            .map_err(|e| ServiceError::internal_from("failed to resolve machine", e))?;
        let provider = self
            .cp
            .provider_machine(project, kind, &infra.name)
            .await
            .map_err(|e| ServiceError::internal_from("failed to get provider machine", e))?;

        Ok(NodeInfo {
            id: provider.host_id().unwrap_or_default().to_string(),
            role: NODE_ROLE_ALL.to_string(),
            status: status::node_status(machine),
        })
    }

    /// Paginated list of the project's clusters
    pub async fn list(&self, project: &str, params: &QueryParams) -> Result<ClusterList> {
        let infos = self.cluster_infos(project).await?;
        let page = query::apply(infos, params)?;
        Ok(ClusterList {
            clusters: (!page.items.is_empty()).then_some(page.items),
            total_elements: count(page.total),
        })
    }

    /// Cluster counts by provider status
    pub async fn summary(&self, project: &str) -> Result<ClusterSummary> {
        let clusters = self
            .cp
            .clusters(project, ReadPath::Live)
            .await
            .map_err(|e| ServiceError::internal_from("failed to list clusters", e))?;

        let mut summary = ClusterSummary {
            total_clusters: count(clusters.len()),
            ..Default::default()
        };
        for cluster in &clusters {
            match status::provider_status(cluster).indicator {
                StatusIndicator::Idle => summary.ready += 1,
                StatusIndicator::Error => summary.error += 1,
                StatusIndicator::InProgress => summary.in_progress += 1,
                StatusIndicator::Unspecified => summary.unknown += 1,
            }
        }
        Ok(summary)
    }

    async fn cluster_infos(&self, project: &str) -> Result<Vec<ClusterInfo>> {
        let clusters = self
            .cp
            .clusters(project, ReadPath::Live)
            .await
            .map_err(|e| ServiceError::internal_from("failed to list clusters", e))?;
        let machines = self
            .cp
            .all_machines(project, ReadPath::Cached)
            .await
            .map_err(|e| ServiceError::internal_from("failed to list machines", e))?;

        let mut by_cluster: BTreeMap<String, Vec<Machine>> = BTreeMap::new();
        for machine in machines {
            if let Some(cluster_name) = machine.cluster_label() {
                by_cluster
                    .entry(cluster_name.to_string())
                    .or_default()
                    .push(machine);
            }
        }

        Ok(clusters
            .iter()
            .map(|cluster| {
                let machines = by_cluster
                    .get(&cluster.name_any())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                ClusterInfo {
                    name: cluster.name_any(),
                    kubernetes_version: cluster.kubernetes_version().to_string(),
                    labels: self.labels.user_labels(cluster.labels()),
                    lifecycle_phase: lifecycle_status(project, cluster),
                    provider_status: status::provider_status(cluster),
                    control_plane_ready: status::control_plane_ready(cluster),
                    infrastructure_ready: status::infrastructure_ready(cluster),
                    node_health: status::node_health(cluster, machines),
                    node_quantity: count(machines.len()),
                }
            })
            .collect())
    }
}

fn lifecycle_status(project: &str, cluster: &Cluster) -> Option<GenericStatus> {
    let lifecycle = status::lifecycle_phase(cluster);
    for failure in &lifecycle.failures {
        warn!(
            namespace = %project,
            name = %cluster.name_any(),
            reason = %failure.reason,
            error = %failure.message,
            "cluster condition failed"
        );
    }
    if lifecycle.status.is_none() {
        warn!(
            namespace = %project,
            name = %cluster.name_any(),
            phase = %cluster.phase_str(),
            "unknown cluster phase"
        );
    }
    lifecycle.status
}

fn validate_detail(detail: &ClusterDetailInfo) -> Result<()> {
    let complete = !detail.name.is_empty()
        && !detail.kubernetes_version.is_empty()
        && !detail.template.is_empty()
        && detail.lifecycle_phase.is_some()
        && !detail.nodes.is_empty();
    if complete {
        Ok(())
    } else {
        Err(ServiceError::internal("failed to validate cluster detail"))
    }
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
