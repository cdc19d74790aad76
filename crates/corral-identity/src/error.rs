//! Error types for identity provider and credential access

/// Result type for identity operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for identity operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The machine-to-machine credentials could not be loaded
    #[error("credentials unavailable: {0}")]
    Credentials(String),

    /// The request never produced a response
    #[error("identity provider request failed: {0}")]
    Request(String),

    /// The identity provider answered with a non-success status
    #[error("identity provider returned {status}: {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        message: String,
    },

    /// The response body did not have the expected shape
    #[error("invalid identity provider response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// True if the provider refused our client credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Rejected { status: 401, .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::InvalidResponse(e.to_string())
        } else {
            Error::Request(e.to_string())
        }
    }
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        Error::Credentials(e.to_string())
    }
}
