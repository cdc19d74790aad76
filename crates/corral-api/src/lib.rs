//! Corral REST API
//!
//! Tenant-facing HTTP surface of the cluster manager. Every route except
//! the health check is scoped to the project named by the `Activeprojectid`
//! header, which is also the namespace the clusters live in.
//!
//! # Endpoints
//!
//! - `GET|POST /v2/clusters` - list and create clusters
//! - `GET /v2/clusters/summary` - counts by provider status
//! - `GET|DELETE /v2/clusters/{name}` - detail and delete
//! - `GET /v2/clusters/{nodeId}/clusterdetail` - detail by node id
//! - `DELETE /v2/clusters/{name}/nodes/{nodeId}` - single node delete
//! - `PUT /v2/clusters/{name}/labels` - replace user labels
//! - `GET /v2/clusters/{name}/kubeconfigs` - issue a kubeconfig
//! - `GET|POST /v2/templates` and friends - the template catalogue
//! - `GET /v2/healthz` - liveness check

#![deny(missing_docs)]

pub mod clusters;
pub mod config;
pub mod error;
pub mod project;
pub mod server;
pub mod templates;

pub use config::Config;
pub use error::ApiError;
pub use project::ProjectId;
pub use server::{router, AppState};
