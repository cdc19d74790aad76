//! Keycloak-style identity provider client
//!
//! Tokens are minted with the OAuth2 client-credentials grant. Per-client
//! token lifespans are set through the realm admin API by updating the
//! client's `access.token.lifespan` attribute.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

#[cfg(any(test, feature = "mock"))]
use mockall::automock;

use crate::credentials::M2mCredentials;
use crate::error::{Error, Result};

/// Client attribute holding the access token lifespan in seconds
pub const ACCESS_TOKEN_LIFESPAN_ATTRIBUTE: &str = "access.token.lifespan";

/// Default timeout for identity provider requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Operations the service needs from the identity provider
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Mint a service token with the M2M credentials
    ///
    /// `desired_ttl` is the lifetime the caller wants, in seconds. The
    /// client-credentials grant cannot request a lifetime, so it is only
    /// compared against the issued token's `expires_in` and logged. The
    /// actual lifespan is whatever was last set on the client with
    /// [`IdentityProvider::set_client_access_token_lifespan`], which the
    /// core's `TtlEnforcer` does before minting.
    async fn mint_token(&self, desired_ttl: Option<i64>) -> Result<String>;

    /// Set the access token lifespan of `client_id` using an admin token
    ///
    /// Returns false if the client does not exist.
    async fn set_client_access_token_lifespan(
        &self,
        client_id: &str,
        seconds: i64,
        admin_token: &str,
    ) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// HTTP client for a Keycloak realm
pub struct KeycloakClient {
    http: reqwest::Client,
    base_url: String,
    realm: String,
    credentials: Arc<dyn M2mCredentials>,
}

impl KeycloakClient {
    /// Create a client for `realm` at `base_url`
    pub fn new(
        base_url: impl Into<String>,
        realm: impl Into<String>,
        credentials: Arc<dyn M2mCredentials>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Request(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            realm: realm.into(),
            credentials,
        })
    }

    /// OIDC token endpoint of the realm
    pub fn token_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base_url, self.realm
        )
    }

    /// Admin endpoint listing the realm's clients
    pub fn clients_url(&self) -> String {
        format!("{}/admin/realms/{}/clients", self.base_url, self.realm)
    }

    async fn request_token(&self) -> Result<TokenResponse> {
        let creds = self.credentials.credentials().await?;
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
        ];
        let resp = self.http.post(self.token_url()).form(&form).send().await?;
        let resp = check_status(resp).await?;
        Ok(resp.json::<TokenResponse>().await?)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(Error::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl IdentityProvider for KeycloakClient {
    async fn mint_token(&self, desired_ttl: Option<i64>) -> Result<String> {
        self.credentials.ensure(false).await?;
        let token = match self.request_token().await {
            Err(e) if e.is_unauthorized() => {
                warn!(error = %e, "m2m credentials rejected, reloading");
                self.credentials.ensure(true).await?;
                self.request_token().await?
            }
            other => other?,
        };

        if let (Some(want), Some(got)) = (desired_ttl, token.expires_in) {
            if want != got {
                debug!(
                    desired_ttl = want,
                    expires_in = got,
                    "issued token lifetime differs from desired ttl"
                );
            }
        }
        Ok(token.access_token)
    }

    async fn set_client_access_token_lifespan(
        &self,
        client_id: &str,
        seconds: i64,
        admin_token: &str,
    ) -> Result<bool> {
        let resp = self
            .http
            .get(self.clients_url())
            .query(&[("clientId", client_id)])
            .bearer_auth(admin_token)
            .send()
            .await?;
        let clients: Vec<serde_json::Value> = check_status(resp).await?.json().await?;

        let Some(mut client) = clients.into_iter().next() else {
            warn!(client_id = %client_id, "client not found in identity provider");
            return Ok(false);
        };
        let id = client
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse("client representation has no id".into()))?;

        set_lifespan_attribute(&mut client, seconds)?;

        let resp = self
            .http
            .put(format!("{}/{}", self.clients_url(), id))
            .bearer_auth(admin_token)
            .json(&client)
            .send()
            .await?;
        check_status(resp).await?;

        info!(client_id = %client_id, seconds = seconds, "set client access token lifespan");
        Ok(true)
    }
}

/// Write the lifespan attribute into a client representation
fn set_lifespan_attribute(client: &mut serde_json::Value, seconds: i64) -> Result<()> {
    let obj = client
        .as_object_mut()
        .ok_or_else(|| Error::InvalidResponse("client representation is not an object".into()))?;
    let attributes = obj
        .entry("attributes")
        .or_insert_with(|| serde_json::json!({}));
    let attributes = attributes
        .as_object_mut()
        .ok_or_else(|| Error::InvalidResponse("client attributes are not an object".into()))?;
    attributes.insert(
        ACCESS_TOKEN_LIFESPAN_ATTRIBUTE.to_string(),
        serde_json::Value::String(seconds.to_string()),
    );
    Ok(())
}
