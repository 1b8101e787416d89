//! PROXY header detection.
//!
//! Classification is purely signature based and fails closed: anything that
//! is not unambiguously a complete v1 line or a well-formed v2 preamble is
//! reported as [`Detection::None`].

/// PROXY v1 signature: "PROXY "
pub const PROXY_V1_SIGNATURE: &[u8] = b"PROXY ";

/// PROXY v2 signature (12 bytes)
pub const PROXY_V2_SIGNATURE: &[u8; 12] = b"\r\n\r\n\x00\r\nQUIT\n";

/// Maximum v1 line length including CRLF
pub const V1_MAX_LINE: usize = 107;

/// Fixed v2 preamble: signature, version/command, family/protocol, length
pub const V2_HEADER_LEN: usize = 16;

/// Outcome of inspecting a connection prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    None,
    V1,
    V2,
}

/// Classify a byte prefix. Never consumes; never guesses.
pub fn detect(prefix: &[u8]) -> Detection {
    if is_v2(prefix) {
        Detection::V2
    } else if is_v1(prefix) {
        Detection::V1
    } else {
        Detection::None
    }
}

fn is_v1(prefix: &[u8]) -> bool {
    if !prefix.starts_with(PROXY_V1_SIGNATURE) {
        return false;
    }
    let window = &prefix[..prefix.len().min(V1_MAX_LINE)];
    let Some(end) = find_crlf(window) else {
        return false;
    };
    let Ok(line) = std::str::from_utf8(&window[..end]) else {
        return false;
    };
    let mut fields = line.split_ascii_whitespace();
    fields.next() == Some("PROXY") && fields.count() >= 5
}

fn is_v2(prefix: &[u8]) -> bool {
    if prefix.len() < V2_HEADER_LEN || !prefix.starts_with(PROXY_V2_SIGNATURE) {
        return false;
    }
    let version = prefix[12] >> 4;
    let command = prefix[12] & 0x0F;
    version == 2 && (command == 0 || command == 1)
}

/// Whether more bytes could still turn `prefix` into a detected header.
///
/// True while the prefix is a (possibly partial) v1 or v2 signature and the
/// header is not yet decidable. Used to bound how long the adapter keeps
/// buffering before it commits to a classification.
pub fn could_be_header(prefix: &[u8]) -> bool {
    if detect(prefix) != Detection::None {
        return false;
    }
    let v2_sig = PROXY_V2_SIGNATURE.as_slice();
    if is_partial_match(prefix, v2_sig) {
        return prefix.len() < V2_HEADER_LEN;
    }
    if is_partial_match(prefix, PROXY_V1_SIGNATURE) {
        return prefix.len() < V1_MAX_LINE && find_crlf(prefix).is_none();
    }
    false
}

/// `prefix` and `signature` agree on their common length.
fn is_partial_match(prefix: &[u8], signature: &[u8]) -> bool {
    let n = prefix.len().min(signature.len());
    prefix[..n] == signature[..n]
}

pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}
