//! IntelMachineBinding resource
//!
//! Ties a node to the machine template a cluster's control plane will use.
//! The Intel infrastructure provider waits for the binding before it claims
//! the host.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for an IntelMachineBinding
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha1",
    kind = "IntelMachineBinding",
    plural = "intelmachinebindings",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IntelMachineBindingSpec {
    /// Host GUID of the node
    #[serde(rename = "nodeGUID")]
    pub node_guid: String,

    /// Cluster the node joins
    pub cluster_name: String,

    /// IntelMachineTemplate the node is provisioned from
    pub intel_machine_template_name: String,
}

/// Name of the binding for a node in a cluster
pub fn binding_name(cluster_name: &str, node_id: &str) -> String {
    format!("{}-{}", cluster_name, node_id)
}

/// Name of the control plane IntelMachineTemplate rendered for a template
pub fn controlplane_machine_template_name(template_name: &str) -> String {
    format!("{}-controlplane", template_name)
}

impl IntelMachineBinding {
    /// Build the binding for one node of a new cluster
    pub fn for_node(cluster_name: &str, node_id: &str, template_name: &str) -> Self {
        Self::new(
            &binding_name(cluster_name, node_id),
            IntelMachineBindingSpec {
                node_guid: node_id.to_string(),
                cluster_name: cluster_name.to_string(),
                intel_machine_template_name: controlplane_machine_template_name(template_name),
            },
        )
    }
}
