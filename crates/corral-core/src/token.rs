//! Kubeconfig token renewal
//!
//! Issued kubeconfigs carry a freshly minted service token instead of the
//! caller's own. When a kubeconfig TTL is configured, the identity provider's
//! per-client access token lifespan is set to match, once per distinct TTL.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use corral_identity::{IdentityProvider, M2mCredentials};

use crate::error::{Result, ServiceError};

/// Claims read from a minted token
///
/// Signatures are not checked here; the gateway verifies every token it
/// receives.
#[derive(Debug, Default, Deserialize)]
pub struct TokenClaims {
    /// Authorized party (client id)
    #[serde(default)]
    pub azp: Option<String>,
    /// User name
    #[serde(default)]
    pub preferred_username: Option<String>,
    /// Expiry, seconds since the epoch
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Decode the claims of a JWT without verifying its signature
pub fn parse_claims(token: &str) -> std::result::Result<TokenClaims, jsonwebtoken::errors::Error> {
    let header = decode_header(token)?;
    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

/// Wait this long after a failed enforcement before talking to the identity
/// provider again
const RETRY_BACKOFF: Duration = Duration::from_secs(30);

const NOT_APPLIED: i64 = i64::MIN;

/// Applies the kubeconfig TTL to the identity provider once per value
///
/// Requests whose TTL is already applied return without taking the lock.
/// Only one request at a time talks to the identity provider, and after a
/// failure the others skip enforcement until the retry backoff has passed.
#[derive(Debug)]
pub struct TtlEnforcer {
    applied: AtomicI64,
    failed_at: Mutex<Option<Instant>>,
}

impl Default for TtlEnforcer {
    fn default() -> Self {
        Self {
            applied: AtomicI64::new(NOT_APPLIED),
            failed_at: Mutex::new(None),
        }
    }
}

impl TtlEnforcer {
    /// Create an enforcer that has applied nothing yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Last TTL applied successfully
    pub fn last_applied(&self) -> Option<i64> {
        match self.applied.load(Ordering::Acquire) {
            NOT_APPLIED => None,
            ttl => Some(ttl),
        }
    }

    /// Forget the last applied TTL and any failure so the next request
    /// enforces again
    pub async fn reset(&self) {
        let mut failed_at = self.failed_at.lock().await;
        self.applied.store(NOT_APPLIED, Ordering::Release);
        *failed_at = None;
    }

    /// Set the client's token lifespan to `ttl` unless it already was
    ///
    /// Returns true if the identity provider was updated.
    pub async fn enforce(
        &self,
        ttl: i64,
        identity: &dyn IdentityProvider,
        credentials: &dyn M2mCredentials,
    ) -> corral_identity::Result<bool> {
        if self.last_applied() == Some(ttl) {
            return Ok(false);
        }

        let mut failed_at = self.failed_at.lock().await;
        if self.last_applied() == Some(ttl) {
            return Ok(false);
        }
        if failed_at.is_some_and(|at| at.elapsed() < RETRY_BACKOFF) {
            debug!(ttl, "token lifespan enforcement failed recently, skipping");
            return Ok(false);
        }

        let result = Self::apply(ttl, identity, credentials).await;
        match result {
            Ok(true) => {
                self.applied.store(ttl, Ordering::Release);
                *failed_at = None;
            }
            _ => *failed_at = Some(Instant::now()),
        }
        result
    }

    async fn apply(
        ttl: i64,
        identity: &dyn IdentityProvider,
        credentials: &dyn M2mCredentials,
    ) -> corral_identity::Result<bool> {
        credentials.ensure(false).await?;
        let client_id = credentials.client_id().await?;
        let admin_token = identity.mint_token(None).await?;
        let updated = identity
            .set_client_access_token_lifespan(&client_id, ttl, &admin_token)
            .await?;
        if updated {
            info!(client_id = %client_id, ttl, "applied kubeconfig token lifespan");
        } else {
            warn!(client_id = %client_id, "identity provider client not found, token lifespan unchanged");
        }
        Ok(updated)
    }
}

/// Swaps the caller's token for a freshly minted one
pub struct TokenRenewer {
    identity: Arc<dyn IdentityProvider>,
    credentials: Arc<dyn M2mCredentials>,
    enforcer: Arc<TtlEnforcer>,
    disable_auth: bool,
    disable_custom_ttl: bool,
}

impl TokenRenewer {
    /// Create a renewer
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        credentials: Arc<dyn M2mCredentials>,
        enforcer: Arc<TtlEnforcer>,
        disable_auth: bool,
        disable_custom_ttl: bool,
    ) -> Self {
        Self {
            identity,
            credentials,
            enforcer,
            disable_auth,
            disable_custom_ttl,
        }
    }

    /// Renew `original`, asking for a token that lives `ttl` seconds
    ///
    /// With auth disabled the original token comes back untouched. A minted
    /// token whose claims cannot be read is discarded in favour of the
    /// original.
    pub async fn renew(&self, original: &str, ttl: Option<i64>) -> Result<String> {
        if self.disable_auth {
            return Ok(original.to_string());
        }

        if let (Some(ttl), false) = (ttl, self.disable_custom_ttl) {
            if let Err(e) = self
                .enforcer
                .enforce(ttl, self.identity.as_ref(), self.credentials.as_ref())
                .await
            {
                warn!(ttl, error = %e, "failed to enforce kubeconfig token lifespan");
            }
        }

        let token = self
            .identity
            .mint_token(ttl)
            .await
            .map_err(|e| ServiceError::internal_from("failed to renew token", e))?;

        match parse_claims(&token) {
            Ok(claims) => {
                debug!(
                    azp = ?claims.azp,
                    user = ?claims.preferred_username,
                    exp = ?claims.exp,
                    "renewed kubeconfig token"
                );
                Ok(token)
            }
            Err(e) => {
                warn!(error = %e, "failed to parse renewed token, returning original");
                Ok(original.to_string())
            }
        }
    }
}
