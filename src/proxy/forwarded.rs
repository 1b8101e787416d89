//! Forwarding headers derived from a parsed PROXY header.
//!
//! The canonical client headers are only filled in when absent, so a value
//! set by an earlier hop is never overwritten.

use hyper::header::{HeaderMap, HeaderName, HeaderValue};

use super::info::ProxyEndpointInfo;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub const X_FORWARDED_PORT: HeaderName = HeaderName::from_static("x-forwarded-port");

/// Correlates a sniff call with its ingress call for the same connection.
pub const X_CONNECTION_ID: HeaderName = HeaderName::from_static("x-connection-id");

pub const X_ORIGINAL_REMOTE_ADDR: HeaderName = HeaderName::from_static("x-original-remote-addr");
pub const X_ORIGINAL_REMOTE_PORT: HeaderName = HeaderName::from_static("x-original-remote-port");
pub const X_PROXY_PROTOCOL_SOURCE: HeaderName =
    HeaderName::from_static("x-proxy-protocol-source");

/// Set `X-Forwarded-For`, `X-Real-IP` and `X-Forwarded-Port` from the
/// header's source where they are not already present.
///
/// Returns how many headers were added. Does nothing without info or when
/// the header carried no client address (LOCAL, UNKNOWN).
pub fn apply_forwarding_headers(
    headers: &mut HeaderMap,
    info: Option<&ProxyEndpointInfo>,
) -> usize {
    let Some(source) = info.and_then(|info| info.source()) else {
        return 0;
    };

    let mut added = 0;
    for (name, value) in [
        (X_FORWARDED_FOR, text_value(source.ip().to_string())),
        (X_REAL_IP, text_value(source.ip().to_string())),
        (X_FORWARDED_PORT, Some(HeaderValue::from(source.port()))),
    ] {
        if headers.contains_key(&name) {
            continue;
        }
        if let Some(value) = value {
            headers.insert(name, value);
            added += 1;
        }
    }
    added
}

/// Headers returned to the host alongside a header-stripped payload.
pub fn ingress_response_headers(
    info: Option<&ProxyEndpointInfo>,
    connection_id: &HeaderValue,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(X_CONNECTION_ID, connection_id.clone());

    if let Some(source) = info.and_then(|info| info.source()) {
        if let Some(addr) = text_value(source.ip().to_string()) {
            headers.insert(X_ORIGINAL_REMOTE_ADDR, addr);
        }
        headers.insert(X_ORIGINAL_REMOTE_PORT, HeaderValue::from(source.port()));
        if let Some(value) = text_value(source.to_string()) {
            headers.insert(X_PROXY_PROTOCOL_SOURCE, value);
        }
        apply_forwarding_headers(&mut headers, info);
    }

    headers
}

fn text_value(s: String) -> Option<HeaderValue> {
    HeaderValue::try_from(s).ok()
}
