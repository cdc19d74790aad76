//! Cluster manager service layer
//!
//! Everything between the HTTP handlers and the collaborators: status
//! synthesis, list queries, cluster views, the template catalogue, the
//! cluster lifecycle and kubeconfig issuance.

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod kubeconfig;
pub mod lifecycle;
pub mod models;
pub mod query;
pub mod status;
pub mod templates;
pub mod token;
pub mod views;

pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
pub use kubeconfig::KubeconfigIssuer;
pub use lifecycle::ClusterLifecycle;
pub use query::QueryParams;
pub use templates::Templates;
pub use token::{TokenRenewer, TtlEnforcer};
pub use views::ClusterViews;
