//! Cluster API `Machine` resource

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, ObjectReference};
use crate::CAPI_CLUSTER_NAME_LABEL;

/// Specification for a CAPI Machine
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Machine",
    plural = "machines",
    status = "MachineStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Name of the owning cluster
    #[serde(default)]
    pub cluster_name: String,

    /// Provider-specific machine backing this Machine
    #[serde(default)]
    pub infrastructure_ref: ObjectReference,

    /// Kubernetes version of the node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Reference to the Node that joined for this machine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NodeReference {
    /// Node name
    #[serde(default)]
    pub name: String,
    /// Node UID
    #[serde(default)]
    pub uid: String,
}

/// Observed state of a CAPI Machine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// Machine phase (Pending, Provisioning, Provisioned, Running, Deleting, Failed, Unknown)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Node this machine became
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_ref: Option<NodeReference>,

    /// Conditions, in the order CAPI reports them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Machine phase strings the cluster manager reacts to
pub mod phase {
    /// Machine is waiting for its bootstrap data
    pub const PENDING: &str = "Pending";
    /// Machine is being provisioned
    pub const PROVISIONING: &str = "Provisioning";
    /// Machine's node joined and is running
    pub const RUNNING: &str = "Running";
    /// Machine is being deleted
    pub const DELETING: &str = "Deleting";
}

impl Machine {
    /// Conditions of the machine, empty when status is unset
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    /// Phase string, empty when unset
    pub fn phase_str(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or_default()
    }

    /// UID of the node this machine became, if it joined
    pub fn node_uid(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.node_ref.as_ref())
            .map(|n| n.uid.as_str())
            .filter(|uid| !uid.is_empty())
    }

    /// Cluster the machine belongs to, read from the CAPI cluster-name label
    ///
    /// Machines are selected by this label, so grouping uses it too rather
    /// than `spec.clusterName`.
    pub fn cluster_label(&self) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(CAPI_CLUSTER_NAME_LABEL))
            .map(String::as_str)
    }
}
