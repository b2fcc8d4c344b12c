//! One-shot initialization of the SAML trust relationship.

use tracing::info;

use crate::config::AppConfig;
use crate::error::StartupError;
use crate::guard::SamlGuard;
use crate::saml::{fetch_idp_metadata, Credential, SamlConfig, SamlProvider};

/// Load the credential, fetch IdP metadata and build the session guard.
///
/// Must succeed before the listener is bound.
pub async fn initialize(config: &AppConfig) -> Result<SamlGuard, StartupError> {
    let credential = Credential::load(&config.cert_path, &config.key_path)?;
    let idp_metadata =
        fetch_idp_metadata(&config.idp_metadata_url, config.metadata_timeout).await?;

    let saml_config = SamlConfig::from_app_config(config)?;
    let provider = SamlProvider::new(saml_config, credential, idp_metadata)?;
    let guard = SamlGuard::new(provider)?;

    info!(
        root_url = %config.root_url,
        entity_id = %guard.config().entity_id,
        "SAML guard initialized"
    );

    Ok(guard)
}
