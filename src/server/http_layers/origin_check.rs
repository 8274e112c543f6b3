//! Cross-origin rejection for state-changing requests

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

/// Returns the `host[:port]` part of an absolute URL as sent by browsers.
fn netloc(url: &str) -> &str {
    let rest = match url.split_once("://") {
        Some((_, rest)) => rest,
        None => return "",
    };
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    match authority.rsplit_once('@') {
        Some((_, host)) => host,
        None => authority,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Same-origin rule for state-changing requests. `Origin` wins over
/// `Referer`; a request carrying neither is let through.
fn is_allowed(headers: &HeaderMap) -> bool {
    let host = header_str(headers, header::HOST).unwrap_or_default();
    if let Some(origin) = header_str(headers, header::ORIGIN) {
        return netloc(origin) == host;
    }
    if let Some(referer) = header_str(headers, header::REFERER) {
        return netloc(referer) == host;
    }
    true
}

fn changes_state(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

pub async fn check_origin(request: Request<Body>, next: Next) -> Response {
    if changes_state(request.method()) && !is_allowed(request.headers()) {
        warn!(
            "Rejected cross-origin {} {}",
            request.method(),
            request.uri().path()
        );
        return StatusCode::FORBIDDEN.into_response();
    }
    next.run(request).await
}
