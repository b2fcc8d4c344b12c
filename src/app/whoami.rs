//! Identity of the signed-in user.

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::session::Session;

/// Identity exposed to the single-page application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Identity {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl Identity {
    /// Build from the session's `email`, `firstName` and `lastName` attributes.
    /// Missing attributes become empty strings.
    pub fn from_session(session: &Session) -> Self {
        let attribute = |name| session.get_attribute(name).unwrap_or_default().to_string();
        Self {
            email: attribute("email"),
            first_name: attribute("firstName"),
            last_name: attribute("lastName"),
        }
    }
}

pub async fn whoami(Extension(session): Extension<Session>) -> Response {
    let identity = Identity::from_session(&session);

    match serde_json::to_vec(&identity) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to serialize identity");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}
