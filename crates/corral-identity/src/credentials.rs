//! Machine-to-machine client credentials
//!
//! The service authenticates to the identity provider with a confidential
//! client whose id and secret live in a Kubernetes secret. The pair is read
//! once and cached; callers force a re-read after the provider rejects it.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[cfg(any(test, feature = "mock"))]
use mockall::automock;

use crate::error::{Error, Result};

/// Secret key holding the client id
pub const CLIENT_ID_KEY: &str = "client_id";
/// Secret key holding the client secret
pub const CLIENT_SECRET_KEY: &str = "client_secret";

/// A confidential client's id and secret
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Access to the machine-to-machine credentials
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait M2mCredentials: Send + Sync {
    /// Make sure credentials are loaded; `force_refresh` re-reads the store
    async fn ensure(&self, force_refresh: bool) -> Result<()>;

    /// The client id of the loaded credentials
    async fn client_id(&self) -> Result<String>;

    /// The loaded credentials
    async fn credentials(&self) -> Result<ClientCredentials>;
}

/// Extract credentials from a Secret's decoded data
pub fn credentials_from_secret(secret: &Secret) -> Result<ClientCredentials> {
    let name = secret.metadata.name.as_deref().unwrap_or_default();
    let field = |key: &str| -> Result<String> {
        let bytes = secret
            .data
            .as_ref()
            .and_then(|d| d.get(key))
            .ok_or_else(|| Error::Credentials(format!("secret {} missing key {}", name, key)))?;
        let value = String::from_utf8(bytes.0.clone())
            .map_err(|_| Error::Credentials(format!("secret {} key {} is not UTF-8", name, key)))?;
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(Error::Credentials(format!(
                "secret {} key {} is empty",
                name, key
            )));
        }
        Ok(value)
    };
    Ok(ClientCredentials {
        client_id: field(CLIENT_ID_KEY)?,
        client_secret: field(CLIENT_SECRET_KEY)?,
    })
}

/// Credentials read from a Kubernetes secret and cached in memory
pub struct KubeSecretCredentials {
    client: Client,
    namespace: String,
    name: String,
    cached: RwLock<Option<ClientCredentials>>,
}

impl KubeSecretCredentials {
    /// Create a store for the secret `namespace/name`
    pub fn new(client: Client, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            name: name.into(),
            cached: RwLock::new(None),
        }
    }

    async fn load(&self) -> Result<ClientCredentials> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        let secret = secrets.get(&self.name).await.map_err(|e| {
            Error::Credentials(format!(
                "failed to get secret {}/{}: {}",
                self.namespace, self.name, e
            ))
        })?;
        credentials_from_secret(&secret)
    }
}

#[async_trait]
impl M2mCredentials for KubeSecretCredentials {
    async fn ensure(&self, force_refresh: bool) -> Result<()> {
        if !force_refresh && self.cached.read().await.is_some() {
            return Ok(());
        }
        let creds = self.load().await?;
        info!(
            namespace = %self.namespace,
            name = %self.name,
            client_id = %creds.client_id,
            "loaded m2m credentials"
        );
        *self.cached.write().await = Some(creds);
        Ok(())
    }

    async fn client_id(&self) -> Result<String> {
        Ok(self.credentials().await?.client_id)
    }

    async fn credentials(&self) -> Result<ClientCredentials> {
        if let Some(creds) = self.cached.read().await.as_ref() {
            return Ok(creds.clone());
        }
        debug!(namespace = %self.namespace, name = %self.name, "m2m credentials not cached");
        self.ensure(false).await?;
        self.cached
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::Credentials("credentials not loaded".into()))
    }
}
