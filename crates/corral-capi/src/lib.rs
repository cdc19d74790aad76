//! Cluster API control-plane adapter
//!
//! Typed read/write access to the resources the cluster manager works with
//! in a tenant namespace: Clusters, Machines, provider machines, templates,
//! machine bindings and kubeconfig secrets.
//!
//! Two read paths are offered. Live reads go straight to the API server.
//! Cached reads are served from reflector stores started at boot; they are
//! meant for list views only. Writes and post-write reads are always live.

#![deny(missing_docs)]

mod cache;
pub mod client;
pub mod kube_utils;

pub use cache::ResourceCache;
pub use client::{ControlPlane, KubeControlPlane, ReadPath, SecretData};

#[cfg(any(test, feature = "mock"))]
pub use client::MockControlPlane;
