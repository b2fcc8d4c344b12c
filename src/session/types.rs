//! Claims carried by the session and request-tracking cookies.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::saml::ProcessedAssertion;

/// An authenticated SAML session, carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// SP entity ID.
    pub aud: String,

    /// SP entity ID.
    pub iss: String,

    /// User identifier (from SAML NameID).
    #[serde(rename = "sub")]
    pub user_id: String,

    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,

    /// SAML assertion attributes as key → values.
    /// Most attributes are single-valued, but SAML allows multi-valued.
    #[serde(rename = "attr", default)]
    pub attributes: HashMap<String, Vec<String>>,

    #[serde(rename = "saml-session")]
    pub saml_session: bool,
}

impl Session {
    /// Create a new session valid for `ttl_secs`.
    pub fn new(entity_id: &str, user_id: String, ttl_secs: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            aud: entity_id.to_string(),
            iss: entity_id.to_string(),
            user_id,
            iat: now,
            nbf: now,
            exp: expires_at(now, ttl_secs),
            attributes: HashMap::new(),
            saml_session: true,
        }
    }

    /// Create a session from a validated assertion.
    pub fn from_assertion(entity_id: &str, assertion: ProcessedAssertion, ttl_secs: u64) -> Self {
        let mut session = Self::new(entity_id, assertion.user_id, ttl_secs);
        session.attributes = assertion.attributes;
        session
    }

    /// Get a single-valued attribute.
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|values| values.first())
            .map(|s| s.as_str())
    }
}

/// An outstanding AuthnRequest, carried in a `saml_<relay state>` cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRequest {
    pub aud: String,
    pub iss: String,

    /// Relay state sent with the request; also the cookie name suffix.
    #[serde(rename = "sub")]
    pub relay_state: String,

    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,

    /// AuthnRequest ID.
    #[serde(rename = "id")]
    pub request_id: String,

    /// URI the browser originally asked for.
    pub uri: String,

    #[serde(rename = "saml-authn-request")]
    pub saml_authn_request: bool,
}

impl TrackedRequest {
    pub fn new(
        entity_id: &str,
        relay_state: String,
        request_id: String,
        uri: String,
        ttl_secs: u64,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            aud: entity_id.to_string(),
            iss: entity_id.to_string(),
            relay_state,
            iat: now,
            nbf: now,
            exp: expires_at(now, ttl_secs),
            request_id,
            uri,
            saml_authn_request: true,
        }
    }
}

/// `now + ttl_secs`, saturating at the largest representable timestamp.
fn expires_at(now: i64, ttl_secs: u64) -> i64 {
    now.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTITY_ID: &str = "https://app.example.com/saml/metadata";

    #[test]
    fn test_new_session_window() {
        let session = Session::new(ENTITY_ID, "user@example.com".to_string(), 3600);
        assert!(session.saml_session);
        assert_eq!(session.iat, session.nbf);
        assert_eq!(session.exp - session.iat, 3600);
        assert!(session.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let session = Session::new(ENTITY_ID, "user@example.com".to_string(), u64::MAX);
        assert_eq!(session.exp, i64::MAX);
        assert!(session.exp > session.iat);

        let ttl = i64::MAX as u64 - 1;
        let tracked = TrackedRequest::new(
            ENTITY_ID,
            "relay".to_string(),
            "_req1".to_string(),
            "/".to_string(),
            ttl,
        );
        assert_eq!(tracked.exp, i64::MAX);
    }

    #[test]
    fn test_session_attributes() {
        let mut session = Session::new(ENTITY_ID, "user@example.com".to_string(), 3600);

        session
            .attributes
            .insert("email".to_string(), vec!["user@example.com".to_string()]);
        session.attributes.insert(
            "groups".to_string(),
            vec!["admin".to_string(), "users".to_string()],
        );

        assert_eq!(session.get_attribute("email"), Some("user@example.com"));
        assert_eq!(session.get_attribute("groups"), Some("admin")); // first value
        assert_eq!(session.get_attribute("missing"), None);
    }

    #[test]
    fn test_session_from_assertion() {
        let mut attributes = HashMap::new();
        attributes.insert("firstName".to_string(), vec!["Ada".to_string()]);
        let assertion = ProcessedAssertion {
            user_id: "ada@example.com".to_string(),
            assertion_id: "_a1".to_string(),
            idp_entity_id: "https://idp.example.com".to_string(),
            session_index: None,
            attributes,
        };

        let session = Session::from_assertion(ENTITY_ID, assertion, 60);
        assert_eq!(session.user_id, "ada@example.com");
        assert_eq!(session.aud, ENTITY_ID);
        assert_eq!(session.get_attribute("firstName"), Some("Ada"));
        assert_eq!(session.exp - session.iat, 60);
    }

    #[test]
    fn test_claim_names() {
        let session = Session::new(ENTITY_ID, "u".to_string(), 60);
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["sub"], "u");
        assert_eq!(json["saml-session"], true);
        assert!(json.get("attr").is_some());

        let tracked = TrackedRequest::new(
            ENTITY_ID,
            "relay".to_string(),
            "_req1".to_string(),
            "/dashboard".to_string(),
            90,
        );
        let json = serde_json::to_value(&tracked).unwrap();
        assert_eq!(json["sub"], "relay");
        assert_eq!(json["id"], "_req1");
        assert_eq!(json["saml-authn-request"], true);
    }
}
