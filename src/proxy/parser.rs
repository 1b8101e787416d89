//! PROXY Protocol Parser
//!
//! Dispatches a buffered prefix to the v1 (text) or v2 (binary) parser.

use tracing::debug;

use super::detect::{PROXY_V1_SIGNATURE, PROXY_V2_SIGNATURE};
use super::error::ProxyError;
use super::info::{ProxyEndpointInfo, ProxyVersion};
use super::v1::parse_v1;
use super::v2::parse_v2;

/// Parse the header of the given version at the start of `buf`.
pub fn parse_header(
    version: ProxyVersion,
    buf: &[u8],
) -> Result<(ProxyEndpointInfo, usize), ProxyError> {
    match version {
        ProxyVersion::V1 => parse_v1(buf),
        ProxyVersion::V2 => parse_v2(buf),
    }
}

/// Remove a leading PROXY header from a fully captured chunk of connection
/// data.
///
/// Dispatch is on the signature alone, so a payload that announces itself as
/// PROXY but is malformed or truncated is an error rather than passthrough.
/// Data without either signature is returned unchanged with no info.
pub fn strip_header(data: &[u8]) -> Result<(Option<ProxyEndpointInfo>, &[u8]), ProxyError> {
    let version = if data.starts_with(PROXY_V2_SIGNATURE) {
        ProxyVersion::V2
    } else if data.starts_with(PROXY_V1_SIGNATURE) {
        ProxyVersion::V1
    } else {
        return Ok((None, data));
    };

    let (info, consumed) = parse_header(version, data)?;
    let remaining = &data[consumed..];

    debug!(
        version = version.number(),
        header_len = consumed,
        remaining = remaining.len(),
        payload = payload_kind(remaining),
        "PROXY header stripped"
    );

    Ok((Some(info), remaining))
}

/// Rough label for what follows the header, for diagnostics only.
fn payload_kind(data: &[u8]) -> &'static str {
    match data.first().copied() {
        None => "empty",
        Some(0x16) => "tls-handshake",
        Some(b) if b.is_ascii_graphic() => "text",
        Some(_) => "binary",
    }
}
