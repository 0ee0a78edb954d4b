//! Device request authentication.

mod extract;
mod verifier;

pub use extract::envelope_from_request;
pub use verifier::{RequestVerifier, Stage};
