//! Tracking of outstanding AuthnRequests.
//!
//! Each redirect to the IdP stores its request ID and the original URI in a
//! signed cookie keyed by a random relay state. The ACS uses these cookies to
//! build the set of acceptable `InResponseTo` values and to send the browser
//! back where it started.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use tracing::debug;

use super::codec::SessionCodec;
use super::types::TrackedRequest;
use crate::saml::config::{
    cookie_pairs, parse_cookie, tracking_cookie_name, TRACKING_COOKIE_PREFIX,
};

/// Generate an unguessable relay state.
pub fn generate_relay_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Look up the tracked request for `relay_state`.
pub fn tracked_request(
    codec: &SessionCodec,
    cookie_header: &str,
    relay_state: &str,
) -> Option<TrackedRequest> {
    let token = parse_cookie(cookie_header, &tracking_cookie_name(relay_state))?;
    match codec.decode_tracked(token) {
        Ok(tracked) if tracked.relay_state == relay_state => Some(tracked),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "Ignoring invalid tracking cookie");
            None
        }
    }
}

/// All valid tracked requests presented by the browser.
pub fn tracked_requests(codec: &SessionCodec, cookie_header: &str) -> Vec<TrackedRequest> {
    cookie_pairs(cookie_header)
        .filter_map(|(name, value)| {
            let relay_state = name.strip_prefix(TRACKING_COOKIE_PREFIX)?;
            codec
                .decode_tracked(value)
                .ok()
                .filter(|tracked| tracked.relay_state == relay_state)
        })
        .collect()
}
