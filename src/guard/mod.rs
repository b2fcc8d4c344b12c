//! SAML session guard.
//!
//! A single gate in front of the application: `require_account` wraps a
//! router so that only requests carrying a valid session cookie reach it,
//! and `saml_routes` exposes the unguarded `/saml/*` protocol endpoints.

mod handlers;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{SamlError, StartupError};
use crate::saml::config::{parse_cookie, SESSION_COOKIE_NAME};
use crate::saml::{SamlConfig, SamlProvider};
use crate::session::{generate_relay_state, Session, SessionCodec, TrackedRequest};

/// Gate holding the immutable SAML trust configuration.
pub struct SamlGuard {
    provider: SamlProvider,
    codec: SessionCodec,
    metadata_xml: String,
}

impl SamlGuard {
    pub fn new(provider: SamlProvider) -> Result<Self, StartupError> {
        let codec = SessionCodec::new(&provider.config().entity_id, provider.credential())?;
        let metadata_xml = provider.metadata_xml()?;

        Ok(Self {
            provider,
            codec,
            metadata_xml,
        })
    }

    pub fn config(&self) -> &SamlConfig {
        self.provider.config()
    }

    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    /// Wrap every route and the fallback of `inner` in the session check.
    pub fn require_account(self: &Arc<Self>, inner: Router) -> Router {
        inner.layer(middleware::from_fn_with_state(
            Arc::clone(self),
            require_session,
        ))
    }

    /// Unguarded SAML protocol endpoints under `/saml/`.
    pub fn saml_routes(self: &Arc<Self>) -> Router {
        handlers::router().with_state(Arc::clone(self))
    }

    /// Extract and verify the session cookie.
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Result<Session, SamlError> {
        let cookies = cookie_header(headers);
        let token = parse_cookie(&cookies, SESSION_COOKIE_NAME).ok_or_else(|| {
            SamlError::Token(jsonwebtoken::errors::ErrorKind::InvalidToken.into())
        })?;
        self.codec.decode_session(token)
    }

    /// Redirect the browser to the IdP, remembering `return_to`.
    pub fn start_auth_flow(&self, return_to: &str) -> Response {
        let config = self.config();
        let relay_state = generate_relay_state();

        let redirect = match self.provider.create_authn_request(&relay_state) {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "Failed to create SAML redirect");
                return internal_error();
            }
        };

        let tracked = TrackedRequest::new(
            &config.entity_id,
            relay_state.clone(),
            redirect.request_id,
            return_to.to_string(),
            config.tracking_ttl_secs,
        );
        let token = match self.codec.encode_tracked(&tracked) {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "Failed to sign tracked request");
                return internal_error();
            }
        };

        debug!(return_to = %return_to, "Redirecting to SAML IdP");

        (
            StatusCode::FOUND,
            [
                (header::LOCATION, redirect.url),
                (
                    header::SET_COOKIE,
                    config.build_tracking_cookie(&relay_state, &token),
                ),
            ],
        )
            .into_response()
    }
}

/// Middleware: forward requests with a valid session, redirect the rest.
async fn require_session(
    State(guard): State<Arc<SamlGuard>>,
    mut request: Request,
    next: Next,
) -> Response {
    match guard.session_from_headers(request.headers()) {
        Ok(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Err(e) => {
            debug!(path = %request.uri().path(), error = %e, "No valid SAML session");
            let return_to = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            guard.start_auth_flow(return_to)
        }
    }
}

/// All `Cookie` header values joined into one.
fn cookie_header(headers: &HeaderMap) -> String {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ")
}

/// `path` if it is a local absolute path, safe to redirect to.
fn local_path(path: &str) -> Option<&str> {
    let is_local = path.starts_with('/') && !path.starts_with("//") && !path.contains('\\');
    is_local.then_some(path)
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}
