//! Process configuration.
//!
//! Built once at startup from command line arguments and the environment
//! (optionally seeded from a `.env` file) and treated as immutable afterwards.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::StartupError;
use crate::Args;

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Externally visible base URL of this service.
    pub root_url: Url,
    /// IdP metadata endpoint.
    pub idp_metadata_url: Url,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Directory holding the single-page application bundle.
    pub dist_dir: PathBuf,
    pub listen_addr: SocketAddr,
    pub session_ttl_secs: u64,
    pub allow_idp_initiated: bool,
    pub sign_requests: bool,
    pub metadata_timeout: Duration,
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Result<Self, StartupError> {
        let root_url = required_url("ROOT_URL", args.root_url.as_deref())?;
        let idp_metadata_url =
            required_url("IDP_METADATA_URL", args.idp_metadata_url.as_deref())?;

        Ok(Self {
            root_url,
            idp_metadata_url,
            cert_path: args.cert.clone(),
            key_path: args.key.clone(),
            dist_dir: args.dist_dir.clone(),
            listen_addr: args.listen,
            session_ttl_secs: args.session_ttl_secs,
            allow_idp_initiated: args.allow_idp_initiated,
            sign_requests: args.sign_requests,
            metadata_timeout: Duration::from_secs(args.metadata_timeout_secs),
        })
    }
}

fn required_url(name: &'static str, value: Option<&str>) -> Result<Url, StartupError> {
    let value = value
        .filter(|v| !v.trim().is_empty())
        .ok_or(StartupError::MissingSetting(name))?;
    Url::parse(value.trim()).map_err(|source| StartupError::InvalidUrl { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["saml-spa-gate"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_config_from_args() {
        let config = AppConfig::from_args(&args(&[
            "--root-url",
            "https://app.example.com",
            "--idp-metadata-url",
            "https://idp.example.com/app/metadata",
        ]))
        .unwrap();

        assert_eq!(config.root_url.as_str(), "https://app.example.com/");
        assert_eq!(config.idp_metadata_url.host_str(), Some("idp.example.com"));
        assert_eq!(config.cert_path, PathBuf::from("okta-app.cert"));
        assert_eq!(config.key_path, PathBuf::from("okta-app.key"));
        assert_eq!(config.dist_dir, PathBuf::from("./dist"));
        assert_eq!(config.listen_addr.port(), 3000);
        assert!(config.allow_idp_initiated);
        assert!(!config.sign_requests);
    }

    #[test]
    fn test_missing_root_url() {
        let err = required_url("ROOT_URL", None).unwrap_err();
        assert!(matches!(err, StartupError::MissingSetting("ROOT_URL")));

        let err = required_url("ROOT_URL", Some("  ")).unwrap_err();
        assert!(matches!(err, StartupError::MissingSetting("ROOT_URL")));
    }

    #[test]
    fn test_invalid_metadata_url() {
        let err = required_url("IDP_METADATA_URL", Some("not a url")).unwrap_err();
        assert!(matches!(
            err,
            StartupError::InvalidUrl {
                name: "IDP_METADATA_URL",
                ..
            }
        ));
        assert!(err.to_string().contains("IDP_METADATA_URL"));
    }
}
