//! SAML service provider support.
//!
//! Credential and IdP metadata loading plus the `samael` wrapper used by the
//! session guard.

pub mod config;
pub mod credential;
pub mod metadata;
pub mod provider;

pub use config::SamlConfig;
pub use credential::Credential;
pub use metadata::fetch_idp_metadata;
pub use provider::{ProcessedAssertion, SamlProvider};
