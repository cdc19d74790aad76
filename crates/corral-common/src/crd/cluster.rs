//! Cluster API `Cluster` resource
//!
//! Only the fields the cluster manager reads or writes are modelled; the
//! CAPI controllers own everything else and round-trip it untouched through
//! merge patches.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ClusterNetwork, Condition};

/// Specification for a CAPI Cluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Cluster",
    plural = "clusters",
    status = "ClusterStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Reconciliation of this cluster is suspended while true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,

    /// Pod and service networks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_network: Option<ClusterNetwork>,

    /// Managed topology derived from a ClusterClass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<Topology>,
}

/// Managed topology of a cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    /// ClusterClass the topology is rendered from
    pub class: String,

    /// Kubernetes version of the cluster
    pub version: String,

    /// Control plane shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane: Option<ControlPlaneTopology>,

    /// Values for ClusterClass variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<ClusterVariable>,
}

/// Control plane section of a topology
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneTopology {
    /// Number of control plane machines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

/// A single ClusterClass variable value
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ClusterVariable {
    /// Variable name
    pub name: String,
    /// Variable value (any JSON)
    pub value: serde_json::Value,
}

/// Observed state of a CAPI Cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Lifecycle phase string as reported by CAPI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Conditions, in the order CAPI reports them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Control plane has been initialized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_ready: Option<bool>,

    /// Infrastructure has been provisioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_ready: Option<bool>,
}

/// Cluster lifecycle phases reported by CAPI
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterPhase {
    /// Waiting for infrastructure
    Pending,
    /// Infrastructure and control plane are being created
    Provisioning,
    /// Cluster is provisioned
    Provisioned,
    /// Cluster is being torn down
    Deleting,
    /// Cluster provisioning failed
    Failed,
    /// CAPI could not determine the phase
    Unknown,
}

impl ClusterPhase {
    /// Parse a CAPI phase string; unrecognised values yield None
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "Provisioning" => Some(Self::Provisioning),
            "Provisioned" => Some(Self::Provisioned),
            "Deleting" => Some(Self::Deleting),
            "Failed" => Some(Self::Failed),
            "Unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Provisioning => write!(f, "Provisioning"),
            Self::Provisioned => write!(f, "Provisioned"),
            Self::Deleting => write!(f, "Deleting"),
            Self::Failed => write!(f, "Failed"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

impl Cluster {
    /// Conditions of the cluster, empty when status is unset
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    /// Raw phase string, empty when unset
    pub fn phase_str(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or_default()
    }

    /// True when `spec.paused` is set
    pub fn is_paused(&self) -> bool {
        self.spec.paused.unwrap_or(false)
    }

    /// ClusterClass name from the topology, empty when unset
    pub fn topology_class(&self) -> &str {
        self.spec
            .topology
            .as_ref()
            .map(|t| t.class.as_str())
            .unwrap_or_default()
    }

    /// Kubernetes version from the topology, empty when unset
    pub fn kubernetes_version(&self) -> &str {
        self.spec
            .topology
            .as_ref()
            .map(|t| t.version.as_str())
            .unwrap_or_default()
    }

    /// Value of an annotation, if present
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }
}
