//! Identity provider access for kubeconfig token issuance
//!
//! Two collaborators live here: the identity provider that mints service
//! tokens and manages per-client token lifespans, and the store holding the
//! machine-to-machine credentials used to talk to it.

#![deny(missing_docs)]

pub mod credentials;
pub mod error;
pub mod keycloak;

pub use credentials::{ClientCredentials, KubeSecretCredentials, M2mCredentials};
pub use error::{Error, Result};
pub use keycloak::{IdentityProvider, KeycloakClient};

#[cfg(any(test, feature = "mock"))]
pub use credentials::MockM2mCredentials;
#[cfg(any(test, feature = "mock"))]
pub use keycloak::MockIdentityProvider;
