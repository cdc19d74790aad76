//! Host inventory client
//!
//! Answers two questions about the host a cluster is placed on: whether it
//! supports trusted compute, and whether its operating system is immutable.

#![deny(missing_docs)]

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

#[cfg(any(test, feature = "mock"))]
use mockall::automock;

/// Security feature value meaning the host can run trusted compute workloads
pub const SECURE_BOOT_AND_FDE: &str = "SECURITY_FEATURE_SECURE_BOOT_AND_FULL_DISK_ENCRYPTION";

/// OS type value of an immutable operating system
pub const OS_TYPE_IMMUTABLE: &str = "OS_TYPE_IMMUTABLE";

/// Default timeout for inventory requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Result type for inventory operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for inventory operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The host is not registered in the project
    #[error("host {0} not found")]
    HostNotFound(String),

    /// The request never produced a response
    #[error("inventory request failed: {0}")]
    Request(String),

    /// The inventory answered with a non-success status
    #[error("inventory returned {status}: {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        message: String,
    },
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

/// Host attributes the cluster manager consults
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait Inventory: Send + Sync {
    /// True if the host supports trusted compute
    async fn host_trusted_compute(&self, project: &str, node_id: &str) -> Result<bool>;

    /// True if the host runs an immutable operating system
    async fn is_immutable(&self, project: &str, node_id: &str) -> Result<bool>;
}

/// Subset of the inventory host resource
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    /// Host resource id
    #[serde(default)]
    pub resource_id: String,
    /// Installed instance, once provisioned
    #[serde(default)]
    pub instance: Option<Instance>,
}

/// The OS instance installed on a host
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Security feature enabled on the instance
    #[serde(default)]
    pub security_feature: Option<String>,
    /// Operating system resource
    #[serde(default)]
    pub os: Option<OperatingSystem>,
}

/// Operating system resource of an instance
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatingSystem {
    /// OS type (mutable or immutable)
    #[serde(default)]
    pub os_type: Option<String>,
}

impl Host {
    /// Secure boot and full disk encryption are both enabled
    pub fn trusted_compute(&self) -> bool {
        self.instance
            .as_ref()
            .and_then(|i| i.security_feature.as_deref())
            == Some(SECURE_BOOT_AND_FDE)
    }

    /// The installed OS is immutable
    pub fn immutable(&self) -> bool {
        self.instance
            .as_ref()
            .and_then(|i| i.os.as_ref())
            .and_then(|os| os.os_type.as_deref())
            == Some(OS_TYPE_IMMUTABLE)
    }
}

/// Inventory client over the REST API
pub struct HttpInventoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpInventoryClient {
    /// Create a client for the inventory at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Request(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// URL of a host resource
    pub fn host_url(&self, project: &str, node_id: &str) -> String {
        format!(
            "{}/v1/projects/{}/compute/hosts/{}",
            self.base_url, project, node_id
        )
    }

    /// Fetch a host
    pub async fn host(&self, project: &str, node_id: &str) -> Result<Host> {
        let resp = self.http.get(self.host_url(project, node_id)).send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::HostNotFound(node_id.to_string()));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        let host = resp.json::<Host>().await?;
        debug!(namespace = %project, node_id = %node_id, "fetched inventory host");
        Ok(host)
    }
}

#[async_trait]
impl Inventory for HttpInventoryClient {
    async fn host_trusted_compute(&self, project: &str, node_id: &str) -> Result<bool> {
        Ok(self.host(project, node_id).await?.trusted_compute())
    }

    async fn is_immutable(&self, project: &str, node_id: &str) -> Result<bool> {
        Ok(self.host(project, node_id).await?.immutable())
    }
}
