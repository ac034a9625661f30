//! Response handling on the way back to the client.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers from upstream responses
//! - Map round-trip failures to gateway errors
//!
//! # Design Decisions
//! - Bodies are never touched here; the transport already delivered them
//! - Every failure is a 502, matching a plain reverse proxy

use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;

use super::request::remove_hop_by_hop;
use crate::transport::RoundTripError;

pub fn prepare_response(mut response: Response<Body>) -> Response<Body> {
    remove_hop_by_hop(response.headers_mut());
    response
}

pub fn error_response(error: &RoundTripError) -> Response<Body> {
    let message = match error {
        RoundTripError::Upstream(_) => "Upstream request failed",
        RoundTripError::Capture(_) => "Upstream message could not be captured",
    };
    (StatusCode::BAD_GATEWAY, message).into_response()
}
