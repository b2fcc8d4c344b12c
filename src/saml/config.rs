//! SAML Service Provider configuration.

use crate::config::AppConfig;
use crate::error::StartupError;

/// Name of the session cookie.
pub const SESSION_COOKIE_NAME: &str = "token";

/// Prefix of the per-request tracking cookies.
pub const TRACKING_COOKIE_PREFIX: &str = "saml_";

/// Lifetime of a tracked AuthnRequest.
pub const DEFAULT_TRACKING_TTL_SECS: u64 = 90;

/// SAML Service Provider configuration derived from the root URL.
#[derive(Debug, Clone)]
pub struct SamlConfig {
    /// SP Entity ID. Same as the metadata URL.
    pub entity_id: String,

    /// SP metadata URL.
    pub metadata_url: String,

    /// Assertion Consumer Service URL (where the IdP posts the SAML response).
    pub acs_url: String,

    /// Single Logout Service URL advertised in SP metadata.
    pub slo_url: String,

    /// Accept responses that do not answer one of our AuthnRequests.
    pub allow_idp_initiated: bool,

    /// Sign AuthnRequest redirects even if the IdP does not ask for it.
    pub sign_requests: bool,

    /// Session lifetime in seconds.
    pub session_ttl_secs: u64,

    /// Tracked AuthnRequest lifetime in seconds.
    pub tracking_ttl_secs: u64,

    /// Cookie domain (root URL host).
    pub cookie_domain: Option<String>,

    /// Cookie path.
    pub cookie_path: String,

    /// Require HTTPS for cookies (Secure flag).
    pub cookie_secure: bool,
}

impl SamlConfig {
    /// Derive the SP endpoints from the application configuration.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, StartupError> {
        let root_url = &config.root_url;
        let resolve = |path: &str| {
            root_url
                .join(path)
                .map(String::from)
                .map_err(|source| StartupError::InvalidUrl {
                    name: "ROOT_URL",
                    source,
                })
        };

        let metadata_url = resolve("saml/metadata")?;
        let acs_url = resolve("saml/acs")?;
        let slo_url = resolve("saml/slo")?;

        Ok(Self {
            entity_id: metadata_url.clone(),
            metadata_url,
            acs_url,
            slo_url,
            allow_idp_initiated: config.allow_idp_initiated,
            sign_requests: config.sign_requests,
            session_ttl_secs: config.session_ttl_secs,
            tracking_ttl_secs: DEFAULT_TRACKING_TTL_SECS,
            cookie_domain: root_url.host_str().map(String::from),
            cookie_path: "/".to_string(),
            cookie_secure: root_url.scheme() == "https",
        })
    }

    /// Build the `Set-Cookie` value for the session cookie.
    pub fn build_session_cookie(&self, token: &str) -> String {
        self.build_cookie(SESSION_COOKIE_NAME, token, self.session_ttl_secs, "Lax")
    }

    /// Build the `Set-Cookie` value that removes the session cookie.
    pub fn clear_session_cookie(&self) -> String {
        self.build_cookie(SESSION_COOKIE_NAME, "", 0, "Lax")
    }

    /// Build the `Set-Cookie` value for a tracked AuthnRequest.
    ///
    /// The IdP posts back cross-site, so the cookie must be `SameSite=None`
    /// whenever browsers allow it (Secure only).
    pub fn build_tracking_cookie(&self, relay_state: &str, token: &str) -> String {
        self.build_cookie(
            &tracking_cookie_name(relay_state),
            token,
            self.tracking_ttl_secs,
            self.tracking_same_site(),
        )
    }

    /// Build the `Set-Cookie` value that removes a tracked AuthnRequest.
    pub fn clear_tracking_cookie(&self, relay_state: &str) -> String {
        self.build_cookie(
            &tracking_cookie_name(relay_state),
            "",
            0,
            self.tracking_same_site(),
        )
    }

    fn tracking_same_site(&self) -> &'static str {
        if self.cookie_secure {
            "None"
        } else {
            "Lax"
        }
    }

    fn build_cookie(&self, name: &str, value: &str, max_age: u64, same_site: &str) -> String {
        let mut cookie = format!("{}={}", name, value);

        if let Some(ref domain) = self.cookie_domain {
            cookie.push_str(&format!("; Domain={}", domain));
        }

        cookie.push_str(&format!("; Path={}", self.cookie_path));

        if self.cookie_secure {
            cookie.push_str("; Secure");
        }

        cookie.push_str("; HttpOnly");
        cookie.push_str(&format!("; SameSite={}", same_site));
        cookie.push_str(&format!("; Max-Age={}", max_age));

        cookie
    }
}

/// Cookie name used to track the AuthnRequest sent with `relay_state`.
pub fn tracking_cookie_name(relay_state: &str) -> String {
    format!("{}{}", TRACKING_COOKIE_PREFIX, relay_state)
}

/// Iterate over `name=value` pairs of a `Cookie` header.
pub fn cookie_pairs(cookie_header: &str) -> impl Iterator<Item = (&str, &str)> {
    cookie_header
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .map(|(name, value)| (name.trim(), value.trim()))
}

/// Find a cookie by name in a `Cookie` header.
pub fn parse_cookie<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_pairs(cookie_header)
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use url::Url;

    pub(crate) fn test_config() -> SamlConfig {
        SamlConfig {
            entity_id: "https://app.example.com/saml/metadata".to_string(),
            metadata_url: "https://app.example.com/saml/metadata".to_string(),
            acs_url: "https://app.example.com/saml/acs".to_string(),
            slo_url: "https://app.example.com/saml/slo".to_string(),
            allow_idp_initiated: true,
            sign_requests: false,
            session_ttl_secs: 3600,
            tracking_ttl_secs: DEFAULT_TRACKING_TTL_SECS,
            cookie_domain: Some("app.example.com".to_string()),
            cookie_path: "/".to_string(),
            cookie_secure: true,
        }
    }

    fn app_config(root: &str) -> AppConfig {
        AppConfig {
            root_url: Url::parse(root).unwrap(),
            idp_metadata_url: Url::parse("https://idp.example.com/metadata").unwrap(),
            cert_path: "okta-app.cert".into(),
            key_path: "okta-app.key".into(),
            dist_dir: "./dist".into(),
            listen_addr: "127.0.0.1:3000".parse().unwrap(),
            session_ttl_secs: 3600,
            allow_idp_initiated: true,
            sign_requests: false,
            metadata_timeout: std::time::Duration::from_secs(10),
        }
    }

    #[test]
    fn test_endpoints_derived_from_root() {
        let config = SamlConfig::from_app_config(&app_config("https://app.example.com")).unwrap();
        assert_eq!(config.entity_id, "https://app.example.com/saml/metadata");
        assert_eq!(config.acs_url, "https://app.example.com/saml/acs");
        assert_eq!(config.slo_url, "https://app.example.com/saml/slo");
        assert_eq!(config.cookie_domain.as_deref(), Some("app.example.com"));
        assert!(config.cookie_secure);
    }

    #[test]
    fn test_plain_http_root_is_not_secure() {
        let config = SamlConfig::from_app_config(&app_config("http://localhost:3000/")).unwrap();
        assert_eq!(config.acs_url, "http://localhost:3000/saml/acs");
        assert!(!config.cookie_secure);
        assert!(config.build_session_cookie("abc").contains("SameSite=Lax"));
        assert!(config
            .build_tracking_cookie("state", "abc")
            .contains("SameSite=Lax"));
    }

    #[test]
    fn test_session_cookie_building() {
        let config = test_config();

        let cookie = config.build_session_cookie("jwt123");
        assert!(cookie.starts_with("token=jwt123"));
        assert!(cookie.contains("Domain=app.example.com"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=3600"));

        assert!(config.clear_session_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn test_tracking_cookie_is_cross_site() {
        let config = test_config();
        let cookie = config.build_tracking_cookie("relay", "jwt");
        assert!(cookie.starts_with("saml_relay=jwt"));
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains("Max-Age=90"));
    }

    #[test]
    fn test_cookie_parsing() {
        let header = "other=value; token=abc.def.ghi; saml_xyz=123";
        assert_eq!(parse_cookie(header, "token"), Some("abc.def.ghi"));
        assert_eq!(parse_cookie(header, "saml_xyz"), Some("123"));
        assert_eq!(parse_cookie("no_session=here", "token"), None);
        assert_eq!(cookie_pairs(header).count(), 3);
    }
}
