//! PROXY Protocol Module
//!
//! Detects and parses HAProxy PROXY protocol v1/v2 headers at the start of a
//! connection, exposes the original client endpoints, and hands the rest of
//! the byte stream on untouched. Also encodes headers for the sending side.

mod detect;
mod encode;
mod error;
mod forwarded;
mod info;
mod listener;
mod parser;
mod stream;
mod v1;
mod v2;

pub use detect::{
    could_be_header, detect, Detection, PROXY_V1_SIGNATURE, PROXY_V2_SIGNATURE, V1_MAX_LINE,
    V2_HEADER_LEN,
};
pub use encode::{encode_v1, encode_v2};
pub use error::ProxyError;
pub use forwarded::{
    apply_forwarding_headers, ingress_response_headers, X_CONNECTION_ID, X_FORWARDED_FOR,
    X_FORWARDED_PORT, X_ORIGINAL_REMOTE_ADDR, X_ORIGINAL_REMOTE_PORT, X_PROXY_PROTOCOL_SOURCE,
    X_REAL_IP,
};
pub use info::{ProxyEndpointInfo, ProxyVersion, Transport};
pub use listener::ProxyListener;
pub use parser::{parse_header, strip_header};
pub use stream::{Classification, ProxiedStream, ProxySettings, TransportAddrs};
pub use v1::parse_v1;
pub use v2::{declared_len, parse_v2};
