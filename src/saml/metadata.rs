//! IdP metadata loading.

use samael::metadata::{EntityDescriptor, HTTP_REDIRECT_BINDING};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::StartupError;

/// Fetch and parse the IdP metadata document. Called once at startup.
pub async fn fetch_idp_metadata(
    url: &Url,
    timeout: Duration,
) -> Result<EntityDescriptor, StartupError> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| StartupError::MetadataFetch(e.to_string()))?;

    debug!(url = %url, "Fetching IdP metadata");

    let response = http_client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| StartupError::MetadataFetch(e.to_string()))?;

    if !response.status().is_success() {
        return Err(StartupError::MetadataFetch(format!(
            "metadata endpoint returned HTTP {}",
            response.status()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| StartupError::MetadataFetch(e.to_string()))?;

    let metadata = parse_idp_metadata(&body)?;

    info!(
        url = %url,
        idp = metadata.entity_id.as_deref().unwrap_or("unknown"),
        "Fetched IdP metadata"
    );

    Ok(metadata)
}

/// Parse an IdP metadata document.
pub fn parse_idp_metadata(xml: &str) -> Result<EntityDescriptor, StartupError> {
    let metadata = xml
        .parse::<EntityDescriptor>()
        .map_err(|e| StartupError::MetadataParse(e.to_string()))?;

    let has_idp_descriptor = metadata
        .idp_sso_descriptors
        .as_ref()
        .is_some_and(|descriptors| !descriptors.is_empty());
    if !has_idp_descriptor {
        return Err(StartupError::MetadataParse(
            "no IDPSSODescriptor".to_string(),
        ));
    }

    Ok(metadata)
}

/// First HTTP-Redirect SSO location of the first IDPSSODescriptor.
pub fn sso_redirect_location(metadata: &EntityDescriptor) -> Option<String> {
    metadata
        .idp_sso_descriptors
        .as_ref()?
        .first()?
        .single_sign_on_services
        .iter()
        .find(|endpoint| endpoint.binding == HTTP_REDIRECT_BINDING)
        .map(|endpoint| endpoint.location.clone())
}

/// Whether the IdP asks for signed AuthnRequests.
pub fn wants_signed_requests(metadata: &EntityDescriptor) -> bool {
    metadata
        .idp_sso_descriptors
        .as_ref()
        .and_then(|descriptors| descriptors.first())
        .and_then(|descriptor| descriptor.want_authn_requests_signed)
        .unwrap_or(false)
}
