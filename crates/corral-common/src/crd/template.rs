//! ClusterTemplate resource
//!
//! A template is stored under the composite name `<name>-<version>`, e.g.
//! `baseline-kubeadm-v0.1.0`. The logical name and version are recovered by
//! splitting at the last `-v` boundary.

use std::collections::BTreeMap;

use kube::CustomResource;
use kube::ResourceExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ClusterNetwork, ObjectReference};
use crate::{Error, DEFAULT_TEMPLATE_LABEL};

/// Control plane providers a template can select
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ControlPlaneProviderType {
    /// Upstream kubeadm
    #[default]
    Kubeadm,
    /// Rancher RKE2
    Rke2,
    /// Rancher K3s
    K3s,
}

impl std::str::FromStr for ControlPlaneProviderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kubeadm" => Ok(Self::Kubeadm),
            "rke2" => Ok(Self::Rke2),
            "k3s" => Ok(Self::K3s),
            _ => Err(Error::validation(format!(
                "invalid control plane provider type: {s}, expected one of: kubeadm, rke2, k3s"
            ))),
        }
    }
}

impl std::fmt::Display for ControlPlaneProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kubeadm => write!(f, "kubeadm"),
            Self::Rke2 => write!(f, "rke2"),
            Self::K3s => write!(f, "k3s"),
        }
    }
}

/// Infrastructure providers a template can select
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InfraProviderType {
    /// Intel edge infrastructure provider
    Intel,
    /// Docker provider for local development
    #[default]
    Docker,
}

impl std::str::FromStr for InfraProviderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "intel" => Ok(Self::Intel),
            "docker" => Ok(Self::Docker),
            _ => Err(Error::validation(format!(
                "invalid infrastructure provider type: {s}, expected one of: intel, docker"
            ))),
        }
    }
}

impl std::fmt::Display for InfraProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Intel => write!(f, "intel"),
            Self::Docker => write!(f, "docker"),
        }
    }
}

/// Specification for a ClusterTemplate
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "edge-orchestrator.intel.com",
    version = "v1alpha1",
    kind = "ClusterTemplate",
    plural = "clustertemplates",
    status = "ClusterTemplateStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTemplateSpec {
    /// Control plane provider
    pub control_plane_provider_type: ControlPlaneProviderType,

    /// Infrastructure provider
    pub infra_provider_type: InfraProviderType,

    /// Kubernetes version clusters are created with
    pub kubernetes_version: String,

    /// Provider configuration, opaque JSON document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_configuration: Option<String>,

    /// Pod and service networks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_network: Option<ClusterNetwork>,

    /// Labels merged into every cluster created from this template
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cluster_labels: BTreeMap<String, String>,
}

/// Observed state of a ClusterTemplate
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTemplateStatus {
    /// The ClusterClass and its templates have been rendered
    #[serde(default)]
    pub ready: bool,

    /// ClusterClass rendered for this template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_class_ref: Option<ObjectReference>,
}

/// Build the composite resource name of a template
pub fn template_resource_name(name: &str, version: &str) -> String {
    format!("{}-{}", name, version)
}

/// Split a composite template name into `(name, version)`
///
/// The split happens at the last `-v`, so names may themselves contain
/// hyphens: `baseline-kubeadm-v0.1.0` yields `("baseline-kubeadm", "v0.1.0")`.
pub fn split_template_name(composite: &str) -> Result<(String, String), Error> {
    match composite.rfind("-v") {
        Some(idx) if idx > 0 && idx + 2 < composite.len() => Ok((
            composite[..idx].to_string(),
            composite[idx + 1..].to_string(),
        )),
        _ => Err(Error::validation_for_field(
            "metadata.name",
            format!("template name {} is not in <name>-<version> format", composite),
        )),
    }
}

impl ClusterTemplate {
    /// Logical `(name, version)` of this template
    pub fn name_and_version(&self) -> Result<(String, String), Error> {
        split_template_name(&self.name_any())
    }

    /// Ready and bound to a ClusterClass
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .map(|s| s.ready && s.cluster_class_ref.is_some())
            .unwrap_or(false)
    }

    /// Name of the rendered ClusterClass, if bound
    pub fn cluster_class_name(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.cluster_class_ref.as_ref())
            .map(|r| r.name.as_str())
    }

    /// Carries `default=true`
    pub fn is_default(&self) -> bool {
        self.labels()
            .get(DEFAULT_TEMPLATE_LABEL)
            .map(|v| v == "true")
            .unwrap_or(false)
    }
}
