//! SAML Service Provider implementation.
//!
//! Wraps `samael`'s service provider: builds AuthnRequest redirects, validates
//! responses posted to the ACS and renders this SP's metadata.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use samael::metadata::EntityDescriptor;
use samael::schema::Assertion;
use samael::service_provider::{ServiceProvider, ServiceProviderBuilder};
use std::collections::HashMap;
use tracing::{debug, info};

use super::config::SamlConfig;
use super::credential::Credential;
use super::metadata::{sso_redirect_location, wants_signed_requests};
use crate::error::{SamlError, StartupError};

/// SAML Service Provider bound to one IdP.
pub struct SamlProvider {
    config: SamlConfig,
    credential: Credential,
    service_provider: ServiceProvider,
    /// IdP HTTP-Redirect SSO endpoint.
    idp_sso_url: String,
    /// Sign AuthnRequest redirects.
    sign_requests: bool,
}

/// Redirect to the IdP for one AuthnRequest.
#[derive(Debug, Clone)]
pub struct AuthnRedirect {
    /// AuthnRequest ID, expected back as `InResponseTo`.
    pub request_id: String,
    /// IdP URL carrying `SAMLRequest` and `RelayState`.
    pub url: String,
}

/// Result of processing a SAML assertion.
#[derive(Debug, Clone)]
pub struct ProcessedAssertion {
    pub user_id: String,
    pub assertion_id: String,
    pub idp_entity_id: String,
    pub session_index: Option<String>,
    pub attributes: HashMap<String, Vec<String>>,
}

impl SamlProvider {
    /// Create a provider from the SP configuration, credential and IdP metadata.
    pub fn new(
        config: SamlConfig,
        credential: Credential,
        idp_metadata: EntityDescriptor,
    ) -> Result<Self, StartupError> {
        let idp_sso_url =
            sso_redirect_location(&idp_metadata).ok_or(StartupError::NoSsoEndpoint)?;
        let sign_requests = config.sign_requests || wants_signed_requests(&idp_metadata);

        let mut sp_builder = ServiceProviderBuilder::default();
        sp_builder.entity_id(config.entity_id.clone());
        sp_builder.metadata_url(config.metadata_url.clone());
        sp_builder.acs_url(config.acs_url.clone());
        sp_builder.slo_url(config.slo_url.clone());
        sp_builder.key(credential.private_key().clone());
        sp_builder.certificate(credential.certificate().clone());
        sp_builder.allow_idp_initiated(config.allow_idp_initiated);
        sp_builder.idp_metadata(idp_metadata);

        let service_provider = sp_builder
            .build()
            .map_err(|e| StartupError::ServiceProvider(e.to_string()))?;

        // samael only verifies response signatures when it has IdP certificates.
        let signing_certs = service_provider
            .idp_signing_certs()
            .map_err(|e| StartupError::MetadataParse(e.to_string()))?
            .unwrap_or_default();
        if signing_certs.is_empty() {
            return Err(StartupError::NoSigningCertificate);
        }

        info!(
            entity_id = %config.entity_id,
            idp_sso_url = %idp_sso_url,
            idp_signing_certs = signing_certs.len(),
            sign_requests,
            allow_idp_initiated = config.allow_idp_initiated,
            "SAML service provider ready"
        );

        Ok(Self {
            config,
            credential,
            service_provider,
            idp_sso_url,
            sign_requests,
        })
    }

    pub fn config(&self) -> &SamlConfig {
        &self.config
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Create an AuthnRequest and return the redirect URL to the IdP.
    pub fn create_authn_request(&self, relay_state: &str) -> Result<AuthnRedirect, SamlError> {
        let authn_request = self
            .service_provider
            .make_authentication_request(&self.idp_sso_url)
            .map_err(|e| SamlError::AuthnRequest(e.to_string()))?;

        let url = if self.sign_requests {
            authn_request.signed_redirect(relay_state, self.credential.private_key().clone())
        } else {
            authn_request.redirect(relay_state)
        }
        .map_err(|e| SamlError::AuthnRequest(e.to_string()))?
        .ok_or_else(|| SamlError::AuthnRequest("AuthnRequest has no destination".to_string()))?;

        debug!(request_id = %authn_request.id, "Created SAML AuthnRequest redirect");

        Ok(AuthnRedirect {
            request_id: authn_request.id.clone(),
            url: url.to_string(),
        })
    }

    /// Process a base64 SAML Response from the IdP ACS POST.
    ///
    /// `possible_request_ids` are the IDs of AuthnRequests this browser has
    /// outstanding. A non-empty `InResponseTo` outside that set is always
    /// rejected. A response without one is an IdP-initiated login and is
    /// accepted only when `allow_idp_initiated` is set.
    pub fn process_response(
        &self,
        saml_response: &str,
        possible_request_ids: &[String],
    ) -> Result<ProcessedAssertion, SamlError> {
        let request_ids: Vec<&str> = possible_request_ids.iter().map(String::as_str).collect();

        let assertion = self
            .service_provider
            .parse_base64_response(saml_response, Some(request_ids.as_slice()))
            .map_err(|e| SamlError::InvalidResponse(e.to_string()))?;

        let user_id = assertion
            .subject
            .as_ref()
            .and_then(|subject| subject.name_id.as_ref())
            .map(|name_id| name_id.value.clone())
            .ok_or(SamlError::MissingSubject)?;

        // With IdP-initiated login allowed samael skips this check entirely.
        if let Some(in_response_to) = assertion_in_response_to(&assertion) {
            if !possible_request_ids.iter().any(|id| id == in_response_to) {
                return Err(SamlError::InvalidResponse(format!(
                    "InResponseTo {} does not match a pending request",
                    in_response_to
                )));
            }
        }

        let session_index = assertion
            .authn_statements
            .as_ref()
            .and_then(|stmts| stmts.first())
            .and_then(|s| s.session_index.clone());

        let idp_entity_id = assertion
            .issuer
            .value
            .clone()
            .unwrap_or_else(|| "unknown".to_string());

        // Attributes are reachable by Name and, when present, FriendlyName.
        let mut attributes: HashMap<String, Vec<String>> = HashMap::new();
        for attr_statement in assertion.attribute_statements.iter().flatten() {
            for attr in &attr_statement.attributes {
                let values: Vec<String> = attr
                    .values
                    .iter()
                    .filter_map(|v| v.value.clone())
                    .collect();
                let friendly_name = attr
                    .friendly_name
                    .as_ref()
                    .filter(|f| Some(*f) != attr.name.as_ref());
                for key in [attr.name.as_ref(), friendly_name].into_iter().flatten() {
                    attributes
                        .entry(key.clone())
                        .or_default()
                        .extend(values.iter().cloned());
                }
            }
        }

        info!(
            user_id = %user_id,
            idp = %idp_entity_id,
            attributes = attributes.len(),
            "SAML assertion validated"
        );

        Ok(ProcessedAssertion {
            user_id,
            assertion_id: assertion.id.clone(),
            idp_entity_id,
            session_index,
            attributes,
        })
    }

    /// SP metadata document advertised at the metadata URL.
    pub fn metadata_xml(&self) -> Result<String, StartupError> {
        // Signing only: samael cannot decrypt EncryptedAssertion.
        let signing = format!(
            r#"    <md:KeyDescriptor use="signing">
      <ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
        <ds:X509Data>
          <ds:X509Certificate>{}</ds:X509Certificate>
        </ds:X509Data>
      </ds:KeyInfo>
    </md:KeyDescriptor>"#,
            BASE64.encode(self.credential.certificate_der()?)
        );

        Ok(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{entity_id}">
  <md:SPSSODescriptor AuthnRequestsSigned="{signed}" WantAssertionsSigned="true" protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
{signing}
    <md:SingleLogoutService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="{slo_url}"/>
    <md:NameIDFormat>urn:oasis:names:tc:SAML:2.0:nameid-format:transient</md:NameIDFormat>
    <md:AssertionConsumerService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="{acs_url}" index="1"/>
  </md:SPSSODescriptor>
</md:EntityDescriptor>"#,
            entity_id = xml_escape(&self.config.entity_id),
            signed = self.sign_requests,
            slo_url = xml_escape(&self.config.slo_url),
            acs_url = xml_escape(&self.config.acs_url),
        ))
    }
}

/// Non-empty `InResponseTo` of the assertion's subject confirmation.
fn assertion_in_response_to(assertion: &Assertion) -> Option<&str> {
    assertion
        .subject
        .as_ref()?
        .subject_confirmations
        .iter()
        .flatten()
        .filter_map(|confirmation| confirmation.subject_confirmation_data.as_ref())
        .find_map(|data| data.in_response_to.as_deref().filter(|id| !id.is_empty()))
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
