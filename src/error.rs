//! Error types.
//!
//! Startup failures are fatal and carry enough context to be logged before
//! the process exits. Per-request SAML failures are logged and mapped to a
//! response without exposing detail to the client.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while establishing configuration or the SAML trust relationship.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("required setting {0} is not set")]
    MissingSetting(&'static str),

    #[error("{name} is not a valid URL: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to read credential file {path:?}: {source}")]
    CredentialRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse certificate: {0}")]
    CertificateParse(#[source] openssl::error::ErrorStack),

    #[error("failed to parse private key: {0}")]
    PrivateKeyParse(#[source] openssl::error::ErrorStack),

    #[error("private key must be RSA")]
    UnsupportedKey,

    #[error("private key does not match certificate")]
    KeyMismatch,

    #[error("failed to fetch IdP metadata: {0}")]
    MetadataFetch(String),

    #[error("failed to parse IdP metadata: {0}")]
    MetadataParse(String),

    #[error("IdP metadata has no HTTP-Redirect SingleSignOnService")]
    NoSsoEndpoint,

    #[error("IdP metadata has no signing certificate")]
    NoSigningCertificate,

    #[error("failed to build service provider: {0}")]
    ServiceProvider(String),

    #[error("failed to prepare session signing keys: {0}")]
    SessionKey(String),
}

/// Failure while handling a SAML exchange for a single request.
#[derive(Debug, Error)]
pub enum SamlError {
    #[error("failed to create AuthnRequest: {0}")]
    AuthnRequest(String),

    #[error("SAML response rejected: {0}")]
    InvalidResponse(String),

    #[error("SAML assertion missing subject")]
    MissingSubject,

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}
