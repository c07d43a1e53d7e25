//! HTTP utility functions

use crate::models::{AuthenticatedUser, GateRequest, Role};
use chrono::{DateTime, Local};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, HeaderMap, Request, Response, StatusCode};
use std::net::SocketAddr;
use tracing::debug;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const USER_ID_HEADER: &str = "x-auth-user-id";
pub const USERNAME_HEADER: &str = "x-auth-username";
pub const ROLE_HEADER: &str = "x-auth-role";

/// Check if a header is a hop-by-hop header
pub fn is_hop_by_hop_header(name: &str) -> bool {
    let hop_by_hop_headers = [
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailers",
        "transfer-encoding",
        "upgrade",
    ];

    hop_by_hop_headers.contains(&name.to_lowercase().as_str())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Read the user the authentication layer attached to the request.
///
/// All three identity headers must be present and the role must be known,
/// otherwise the request is treated as anonymous.
pub fn extract_user(headers: &HeaderMap) -> Option<AuthenticatedUser> {
    let id = header_str(headers, USER_ID_HEADER)?;
    let username = header_str(headers, USERNAME_HEADER)?;
    let role_value = header_str(headers, ROLE_HEADER)?;

    let role = match role_value.parse::<Role>() {
        Ok(role) => role,
        Err(e) => {
            debug!("Ignoring identity headers for {}: {}", username, e);
            return None;
        }
    };

    Some(AuthenticatedUser {
        id: id.to_string(),
        username: username.to_string(),
        role,
    })
}

/// Build the gate view of an inbound hyper request
pub fn gate_request_from<B>(
    req: &Request<B>,
    remote_addr: Option<SocketAddr>,
    arrival: DateTime<Local>,
) -> GateRequest {
    let headers = req.headers();

    GateRequest {
        method: req.method().clone(),
        path: req.uri().path().to_string(),
        forwarded_for: header_str(headers, FORWARDED_FOR_HEADER).map(str::to_string),
        remote_addr: remote_addr.map(|addr| addr.ip().to_string()),
        user: extract_user(headers),
        arrival,
    }
}

/// Build a plain-text response
pub fn build_text_response(status: StatusCode, message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(message.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

/// Build a JSON response from an already serialized body
pub fn build_json_response(status: StatusCode, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Build error response
pub fn build_error_response(status: StatusCode, message: &str) -> Response<Body> {
    build_text_response(status, message)
}
