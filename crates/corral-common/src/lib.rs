//! Common types for corral: custom resources, label rules, and errors
//!
//! Everything the control-plane adapter and the service layer need to agree
//! on lives here: typed views of the Cluster API resources, the template and
//! binding resources, label partitioning, and the adapter error type.

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod labels;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Prefix for every label and annotation owned by the cluster manager
pub const SYSTEM_PREFIX: &str = "edge-orchestrator.intel.com/";

/// System label carrying the cluster name
pub const CLUSTER_NAME_LABEL: &str = "edge-orchestrator.intel.com/clustername";

/// System label carrying the owning project id
pub const PROJECT_ID_LABEL: &str = "edge-orchestrator.intel.com/project-id";

/// System label pointing the metrics agent at the node metrics endpoint
pub const PROMETHEUS_METRICS_URL_LABEL: &str = "prometheusMetricsURL";

/// System label recording whether the host supports trusted compute
pub const TRUSTED_COMPUTE_LABEL: &str = "trusted-compute-compatible";

/// Annotation on a cluster naming the template it was created from
pub const TEMPLATE_ANNOTATION: &str = "edge-orchestrator.intel.com/template";

/// Label marking the default template of a project
pub const DEFAULT_TEMPLATE_LABEL: &str = "default";

/// Label selector matching the default template
pub const DEFAULT_TEMPLATE_SELECTOR: &str = "default=true";

/// Label linking a CAPI Machine to its Cluster
pub const CAPI_CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Annotation on a provider machine carrying the tenant-visible host id
pub const HOST_ID_ANNOTATION: &str = "intelmachine.infrastructure.cluster.x-k8s.io/host-id";

/// Secret key holding the base64 encoded kubeconfig
pub const KUBECONFIG_SECRET_VALUE_KEY: &str = "value";

/// Secret key holding the API server CA, when published separately
pub const KUBECONFIG_SECRET_CA_KEY: &str = "apiServerCA";

/// Cluster topology variable toggling the read-only root filesystem
pub const READ_ONLY_VARIABLE: &str = "readOnly";

/// Name of the kubeconfig secret for a cluster
pub fn kubeconfig_secret_name(cluster_name: &str) -> String {
    format!("{}-kubeconfig", cluster_name)
}
