//! Signed cookie encoding.
//!
//! Sessions and tracked requests are RS256 JWTs signed with the service
//! provider's private key, so no session state lives on the server.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::types::{Session, TrackedRequest};
use crate::error::{SamlError, StartupError};
use crate::saml::Credential;

/// Encodes and verifies the signed cookies for one SP entity ID.
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionCodec {
    pub fn new(entity_id: &str, credential: &Credential) -> Result<Self, StartupError> {
        let encoding_key = EncodingKey::from_rsa_pem(&credential.private_key_pem()?)
            .map_err(|e| StartupError::SessionKey(e.to_string()))?;
        let decoding_key = DecodingKey::from_rsa_pem(&credential.public_key_pem()?)
            .map_err(|e| StartupError::SessionKey(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[entity_id]);
        validation.set_issuer(&[entity_id]);
        validation.set_required_spec_claims(&["exp", "nbf", "aud", "iss", "sub"]);
        validation.validate_nbf = true;

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
        })
    }

    pub fn encode_session(&self, session: &Session) -> Result<String, SamlError> {
        self.encode(session)
    }

    /// Verify a session token. Tokens without the session marker are rejected.
    pub fn decode_session(&self, token: &str) -> Result<Session, SamlError> {
        let session: Session = self.decode(token)?;
        if !session.saml_session {
            return Err(SamlError::Token(
                jsonwebtoken::errors::ErrorKind::InvalidToken.into(),
            ));
        }
        Ok(session)
    }

    pub fn encode_tracked(&self, tracked: &TrackedRequest) -> Result<String, SamlError> {
        self.encode(tracked)
    }

    /// Verify a tracked request token. Session tokens are rejected here.
    pub fn decode_tracked(&self, token: &str) -> Result<TrackedRequest, SamlError> {
        let tracked: TrackedRequest = self.decode(token)?;
        if !tracked.saml_authn_request {
            return Err(SamlError::Token(
                jsonwebtoken::errors::ErrorKind::InvalidToken.into(),
            ));
        }
        Ok(tracked)
    }

    fn encode<T: Serialize>(&self, claims: &T) -> Result<String, SamlError> {
        Ok(encode(
            &Header::new(Algorithm::RS256),
            claims,
            &self.encoding_key,
        )?)
    }

    fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, SamlError> {
        Ok(decode::<T>(token, &self.decoding_key, &self.validation)?.claims)
    }
}
