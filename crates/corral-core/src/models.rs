//! Tenant-facing request and response bodies

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use corral_common::crd::ClusterNetwork;

/// Coarse state of a synthesized status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusIndicator {
    /// Nothing is known
    #[default]
    #[serde(rename = "STATUS_INDICATION_UNSPECIFIED")]
    Unspecified,
    /// Settled and healthy
    #[serde(rename = "STATUS_INDICATION_IDLE")]
    Idle,
    /// Converging
    #[serde(rename = "STATUS_INDICATION_IN_PROGRESS")]
    InProgress,
    /// Failed or unhealthy
    #[serde(rename = "STATUS_INDICATION_ERROR")]
    Error,
}

/// A status view: indicator, human message and unix timestamp
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericStatus {
    /// Coarse state
    pub indicator: StatusIndicator,
    /// Human readable detail
    pub message: String,
    /// Seconds since the epoch of the underlying transition, 0 if unknown
    pub timestamp: u64,
}

impl GenericStatus {
    /// Build a status
    pub fn new(indicator: StatusIndicator, message: impl Into<String>, timestamp: u64) -> Self {
        Self {
            indicator,
            message: message.into(),
            timestamp,
        }
    }
}

/// Condition of a single node
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCondition {
    /// No health information
    #[default]
    #[serde(rename = "STATUS_CONDITION_UNKNOWN")]
    Unknown,
    /// Node is healthy
    #[serde(rename = "STATUS_CONDITION_READY")]
    Ready,
    /// Node reports unhealthy
    #[serde(rename = "STATUS_CONDITION_NOTREADY")]
    NotReady,
    /// Machine is still being provisioned
    #[serde(rename = "STATUS_CONDITION_PROVISIONING")]
    Provisioning,
    /// Machine is being deleted
    #[serde(rename = "STATUS_CONDITION_REMOVING")]
    Removing,
}

/// Health of a node
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Condition
    pub condition: NodeCondition,
    /// Reason reported alongside a not-ready condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A node of a cluster
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Tenant-visible host id
    pub id: String,
    /// Node role; always `all` for single-node clusters
    pub role: String,
    /// Health
    pub status: NodeStatus,
}

/// Cluster as shown in lists
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    /// Cluster name
    pub name: String,
    /// Kubernetes version from the topology
    pub kubernetes_version: String,
    /// User labels
    pub labels: BTreeMap<String, String>,
    /// Lifecycle phase, absent if the phase is unmappable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_phase: Option<GenericStatus>,
    /// Ready condition view
    pub provider_status: GenericStatus,
    /// ControlPlaneReady condition view
    pub control_plane_ready: GenericStatus,
    /// InfrastructureReady condition view
    pub infrastructure_ready: GenericStatus,
    /// Aggregated machine health
    pub node_health: GenericStatus,
    /// Number of machines
    pub node_quantity: i32,
}

/// Cluster as shown in the detail view
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDetailInfo {
    /// Cluster name
    pub name: String,
    /// Kubernetes version from the topology
    pub kubernetes_version: String,
    /// User labels
    pub labels: BTreeMap<String, String>,
    /// Topology class, i.e. the template the cluster runs
    pub template: String,
    /// Lifecycle phase, absent if the phase is unmappable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_phase: Option<GenericStatus>,
    /// Ready condition view
    pub provider_status: GenericStatus,
    /// ControlPlaneReady condition view
    pub control_plane_ready: GenericStatus,
    /// InfrastructureReady condition view
    pub infrastructure_ready: GenericStatus,
    /// Aggregated machine health
    pub node_health: GenericStatus,
    /// Nodes
    pub nodes: Vec<NodeInfo>,
}

/// Paginated cluster list; `clusters` is null when the page is empty
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterList {
    /// Page of clusters
    pub clusters: Option<Vec<ClusterInfo>>,
    /// Count after filtering, before pagination
    pub total_elements: i32,
}

/// Cluster counts by provider status
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    /// All clusters in the project
    pub total_clusters: i32,
    /// Provider status idle
    pub ready: i32,
    /// Provider status error
    pub error: i32,
    /// Provider status in progress
    pub in_progress: i32,
    /// Provider status unspecified
    pub unknown: i32,
}

/// Node requested for a new cluster
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Host id
    pub id: String,
    /// Requested role
    #[serde(default)]
    pub role: String,
}

/// Body of a create-cluster request
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpecRequest {
    /// Cluster name; generated when empty
    #[serde(default)]
    pub name: Option<String>,
    /// Template name; the project default when empty
    #[serde(default)]
    pub template: Option<String>,
    /// Nodes; exactly one is supported
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    /// User labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Body of a label replacement request
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterLabels {
    /// New user labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// A cluster template as shown to tenants and accepted on import
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateInfo {
    /// Logical name
    pub name: String,
    /// Version, `v` prefixed
    pub version: String,
    /// Kubernetes version
    pub kubernetes_version: String,
    /// `kubeadm`, `rke2` or `k3s`
    pub control_plane_provider_type: String,
    /// `intel` or `docker`
    pub infra_provider_type: String,
    /// Provider configuration document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_configuration: Option<serde_json::Value>,
    /// Pod and service networks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_network: Option<ClusterNetwork>,
    /// Labels applied to clusters created from this template
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cluster_labels: BTreeMap<String, String>,
}

/// Name and version of the default template
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultTemplateInfo {
    /// Logical name
    pub name: String,
    /// Version
    pub version: String,
}

/// Paginated template list
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfoList {
    /// Page of templates
    pub template_info_list: Vec<TemplateInfo>,
    /// The project default, when exactly one is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_template_info: Option<DefaultTemplateInfo>,
    /// Count after filtering, before pagination
    pub total_elements: i32,
}

/// Versions of one template
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionList {
    /// Versions in ascending order
    pub version_list: Vec<String>,
}

/// Body of a set-default request
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultTemplateRequest {
    /// Version to make default; latest when empty
    #[serde(default)]
    pub version: Option<String>,
}

/// Issued kubeconfig
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeconfigInfo {
    /// Cluster name
    pub id: String,
    /// Kubeconfig YAML
    pub kubeconfig: String,
}
