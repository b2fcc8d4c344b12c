//! SAML protocol endpoints. None of these require a session.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{any, get, post},
    Form, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{cookie_header, internal_error, local_path, SamlGuard};
use crate::session::{tracked_request, tracked_requests, Session};

pub(super) fn router() -> Router<Arc<SamlGuard>> {
    Router::new()
        .route("/saml/metadata", get(metadata))
        .route("/saml/acs", post(assertion_consumer_service))
        .route("/saml/login", get(login))
        .route("/saml/logout", get(logout).post(logout))
        .route("/saml/", any(not_found))
        .route("/saml/{*rest}", any(not_found))
}

/// Form posted by the IdP to the ACS.
#[derive(Debug, Deserialize)]
struct AcsForm {
    #[serde(rename = "SAMLResponse")]
    saml_response: Option<String>,
    #[serde(rename = "RelayState")]
    relay_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginQuery {
    return_to: Option<String>,
}

async fn metadata(State(guard): State<Arc<SamlGuard>>) -> Response {
    (
        [(header::CONTENT_TYPE, "application/samlmetadata+xml")],
        guard.metadata_xml.clone(),
    )
        .into_response()
}

async fn assertion_consumer_service(
    State(guard): State<Arc<SamlGuard>>,
    headers: HeaderMap,
    Form(form): Form<AcsForm>,
) -> Response {
    let config = guard.config();
    let cookies = cookie_header(&headers);

    let Some(saml_response) = form.saml_response.filter(|r| !r.is_empty()) else {
        warn!("ACS request without SAMLResponse");
        return forbidden();
    };

    let request_ids: Vec<String> = tracked_requests(guard.codec(), &cookies)
        .into_iter()
        .map(|tracked| tracked.request_id)
        .collect();

    let assertion = match guard.provider.process_response(&saml_response, &request_ids) {
        Ok(a) => a,
        Err(e) => {
            warn!(error = %e, "SAML assertion validation failed");
            return forbidden();
        }
    };

    debug!(
        assertion_id = %assertion.assertion_id,
        idp = %assertion.idp_entity_id,
        session_index = assertion.session_index.as_deref().unwrap_or("none"),
        "Accepted SAML assertion"
    );

    let session = Session::from_assertion(&config.entity_id, assertion, config.session_ttl_secs);
    let token = match guard.codec().encode_session(&session) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "Failed to sign session");
            return internal_error();
        }
    };

    let mut set_cookies = vec![config.build_session_cookie(&token)];
    let relay_state = form.relay_state.filter(|s| !s.is_empty());

    let redirect_uri = match relay_state {
        Some(relay_state) => match tracked_request(guard.codec(), &cookies, &relay_state) {
            Some(tracked) => {
                set_cookies.push(config.clear_tracking_cookie(&relay_state));
                tracked.uri
            }
            // IdP-initiated logins may carry a target path as relay state.
            None if config.allow_idp_initiated => {
                local_path(&relay_state).unwrap_or("/").to_string()
            }
            None => "/".to_string(),
        },
        None => "/".to_string(),
    };

    info!(
        user_id = %session.user_id,
        redirect = %redirect_uri,
        "SAML authentication successful, session created"
    );

    (
        StatusCode::FOUND,
        [(header::LOCATION, redirect_uri)],
        AppendHeaders(
            set_cookies
                .into_iter()
                .map(|cookie| (header::SET_COOKIE, cookie)),
        ),
        (),
    )
        .into_response()
}

/// Start the login flow explicitly, e.g. from a "sign in" link.
async fn login(
    State(guard): State<Arc<SamlGuard>>,
    Query(query): Query<LoginQuery>,
) -> Response {
    let return_to = query
        .return_to
        .as_deref()
        .and_then(local_path)
        .unwrap_or("/");
    guard.start_auth_flow(return_to)
}

/// Drop the local session. The IdP session is left alone.
async fn logout(State(guard): State<Arc<SamlGuard>>) -> Response {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, guard.config().clear_session_cookie())],
        "Signed out",
    )
        .into_response()
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden").into_response()
}
