//! SAML SPA Gate
//!
//! Serves a single-page application and a `whoami` endpoint, letting
//! through only browsers that hold a session established by SAML single
//! sign-on against the configured identity provider.

mod app;
mod config;
mod error;
mod guard;
mod saml;
mod session;
mod startup;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use config::AppConfig;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "saml-spa-gate")]
#[command(about = "Single-page application server behind SAML single sign-on")]
pub struct Args {
    /// Externally visible base URL of this service
    #[arg(long, env = "ROOT_URL")]
    pub root_url: Option<String>,

    /// URL of the identity provider's SAML metadata
    #[arg(long, env = "IDP_METADATA_URL")]
    pub idp_metadata_url: Option<String>,

    /// PEM certificate identifying this service provider
    #[arg(long, default_value = "okta-app.cert", env = "SAML_CERT_FILE")]
    pub cert: PathBuf,

    /// PEM private key matching the certificate
    #[arg(long, default_value = "okta-app.key", env = "SAML_KEY_FILE")]
    pub key: PathBuf,

    /// Directory holding the application bundle
    #[arg(long, default_value = "./dist", env = "DIST_DIR")]
    pub dist_dir: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:3000", env = "LISTEN_ADDR")]
    pub listen: SocketAddr,

    /// Session lifetime in seconds
    #[arg(long, default_value_t = 3600, env = "SESSION_TTL_SECS")]
    pub session_ttl_secs: u64,

    /// Accept IdP-initiated logins
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        env = "ALLOW_IDP_INITIATED"
    )]
    pub allow_idp_initiated: bool,

    /// Sign AuthnRequests even when the IdP does not require it
    #[arg(long, env = "SAML_SIGN_REQUESTS")]
    pub sign_requests: bool,

    /// Timeout for the IdP metadata fetch, in seconds
    #[arg(long, default_value_t = 10, env = "METADATA_TIMEOUT_SECS")]
    pub metadata_timeout_secs: u64,

    /// Enable verbose logging
    #[arg(short, long, env = "AUTH_VERBOSE")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Seed the environment before clap reads it
    let env_file = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "{}={},tower_http=info",
            env!("CARGO_CRATE_NAME"),
            log_level
        ))
        .json()
        .init();

    info!("Starting SAML SPA gate");

    match env_file {
        Ok(path) => info!(path = %path.display(), "Loaded .env file"),
        Err(_) => info!("No .env file found"),
    }

    let config = match AppConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e).context("invalid configuration");
        }
    };

    info!(
        root_url = %config.root_url,
        idp_metadata_url = %config.idp_metadata_url,
        dist_dir = %config.dist_dir.display(),
        session_ttl_secs = config.session_ttl_secs,
        allow_idp_initiated = config.allow_idp_initiated,
        "Configuration loaded"
    );

    let guard = match startup::initialize(&config).await {
        Ok(guard) => Arc::new(guard),
        Err(e) => {
            error!(error = %e, "SAML initialization failed");
            return Err(e).context("SAML initialization failed");
        }
    };

    let router = app::router(guard, &config.dist_dir);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["saml-spa-gate"]);
        assert_eq!(args.cert, PathBuf::from("okta-app.cert"));
        assert_eq!(args.listen.port(), 3000);
        assert_eq!(args.metadata_timeout_secs, 10);
    }

    #[test]
    fn test_disable_idp_initiated() {
        let args = Args::parse_from(["saml-spa-gate", "--allow-idp-initiated", "false"]);
        assert!(!args.allow_idp_initiated);
    }

    #[test]
    fn test_args_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
