//! Typed custom resources the cluster manager reads and writes

mod binding;
mod cluster;
mod machine;
mod provider_machine;
mod template;
mod types;

pub use binding::{
    binding_name, controlplane_machine_template_name, IntelMachineBinding,
    IntelMachineBindingSpec,
};
pub use cluster::{
    Cluster, ClusterPhase, ClusterSpec, ClusterStatus, ClusterVariable, ControlPlaneTopology,
    Topology,
};
pub use machine::{phase as machine_phase, Machine, MachineSpec, MachineStatus, NodeReference};
pub use provider_machine::{
    DockerMachine, DockerMachineSpec, InfraMachineKind, IntelMachine, IntelMachineSpec,
    ProviderMachine,
};
pub use template::{
    split_template_name, template_resource_name, ClusterTemplate, ClusterTemplateSpec,
    ClusterTemplateStatus, ControlPlaneProviderType, InfraProviderType,
};
pub use types::{
    find_condition, ClusterNetwork, Condition, ConditionStatus, NetworkRanges, ObjectReference,
};
