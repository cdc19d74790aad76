//! Provider-specific machine resources
//!
//! A CAPI Machine points at its provider machine through
//! `spec.infrastructureRef`. The provider machine carries the host id the
//! tenant knows the node by, so views dispatch on the referenced kind.

use kube::CustomResource;
use kube::ResourceExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::HOST_ID_ANNOTATION;

/// Specification for an IntelMachine
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha1",
    kind = "IntelMachine",
    plural = "intelmachines",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IntelMachineSpec {
    /// Provider id of the node
    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

/// Specification for a DockerMachine
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "DockerMachine",
    plural = "dockermachines",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct DockerMachineSpec {
    /// Provider id of the node
    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

/// Kinds of provider machine the cluster manager understands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfraMachineKind {
    /// `IntelMachine`
    Intel,
    /// `DockerMachine`
    Docker,
}

impl InfraMachineKind {
    /// Resolve an `infrastructureRef.kind` string
    pub fn from_kind(kind: &str) -> Result<Self, crate::Error> {
        match kind {
            "IntelMachine" => Ok(Self::Intel),
            "DockerMachine" => Ok(Self::Docker),
            other => Err(crate::Error::validation_for_field(
                "spec.infrastructureRef.kind",
                format!("unsupported infrastructure machine kind: {}", other),
            )),
        }
    }

    /// The Kubernetes kind string
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Intel => "IntelMachine",
            Self::Docker => "DockerMachine",
        }
    }
}

impl std::fmt::Display for InfraMachineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// A provider machine of any supported kind
#[derive(Clone, Debug)]
pub enum ProviderMachine {
    /// Machine provisioned by the Intel infrastructure provider
    Intel(IntelMachine),
    /// Machine provisioned by the Docker infrastructure provider
    Docker(DockerMachine),
}

impl ProviderMachine {
    /// Kind of this provider machine
    pub fn kind(&self) -> InfraMachineKind {
        match self {
            Self::Intel(_) => InfraMachineKind::Intel,
            Self::Docker(_) => InfraMachineKind::Docker,
        }
    }

    /// Tenant-visible host id, if the provider has annotated it
    pub fn host_id(&self) -> Option<&str> {
        let annotations = match self {
            Self::Intel(m) => m.annotations(),
            Self::Docker(m) => m.annotations(),
        };
        annotations
            .get(HOST_ID_ANNOTATION)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}
