//! Session management for SAML authentication.
//!
//! Sessions and outstanding AuthnRequests live in signed cookies; nothing is
//! stored server-side.

pub mod codec;
pub mod tracker;
pub mod types;

pub use codec::SessionCodec;
pub use tracker::{generate_relay_state, tracked_request, tracked_requests};
pub use types::{Session, TrackedRequest};
