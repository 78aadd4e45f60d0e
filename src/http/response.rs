//! Outcome → HTTP response mapping.
//!
//! # Design Decisions
//! - Completed → 200 with the produced body
//! - Explicit failure → 500
//! - Timeout and cancellation → 503, distinguished by body text
//! - Rejected transitions → 409 Conflict

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::deferred::{DeferredError, Outcome};

/// Header carrying the deferred response id.
pub const X_REQUEST_ID: &str = "x-request-id";

pub const TIMED_OUT_BODY: &str = "request timed out";
pub const CANCELLED_BODY: &str = "request cancelled";

/// Serialize a terminal outcome onto the wire.
pub fn outcome_response(id: Uuid, outcome: &Outcome<String>) -> Response {
    let (status, body) = match outcome {
        Outcome::Completed(value) => (StatusCode::OK, value.clone()),
        Outcome::Failed(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        Outcome::TimedOut(_) => (StatusCode::SERVICE_UNAVAILABLE, TIMED_OUT_BODY.to_string()),
        Outcome::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, CANCELLED_BODY.to_string()),
    };
    with_request_id(id, (status, body).into_response())
}

/// Report a rejected transition to the caller.
pub fn rejection_response(err: &DeferredError) -> Response {
    (StatusCode::CONFLICT, err.to_string()).into_response()
}

fn with_request_id(id: Uuid, mut response: Response<Body>) -> Response<Body> {
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
