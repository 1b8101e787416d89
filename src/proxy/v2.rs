//! PROXY v2 (binary) parser.
//!
//! Wire format:
//! - 12 bytes signature
//! - 1 byte version (high nibble) and command (low nibble)
//! - 1 byte address family (high nibble) and transport protocol (low nibble)
//! - 2 bytes big-endian address block length
//! - address block: addresses, ports, then optional TLVs (skipped)

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use super::detect::{PROXY_V2_SIGNATURE, V2_HEADER_LEN};
use super::error::ProxyError;
use super::info::{ProxyEndpointInfo, ProxyVersion};

pub(crate) const COMMAND_LOCAL: u8 = 0x0;
pub(crate) const COMMAND_PROXY: u8 = 0x1;

pub(crate) const FAMILY_INET: u8 = 0x1;
pub(crate) const FAMILY_INET6: u8 = 0x2;

/// Length of IPv4 address block (4 + 4 + 2 + 2 = 12 bytes).
pub(crate) const IPV4_ADDR_LEN: usize = 12;

/// Length of IPv6 address block (16 + 16 + 2 + 2 = 36 bytes).
pub(crate) const IPV6_ADDR_LEN: usize = 36;

/// Total header length announced by a v2 preamble, if one is present.
pub fn declared_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < V2_HEADER_LEN {
        return None;
    }
    Some(V2_HEADER_LEN + u16::from_be_bytes([buf[14], buf[15]]) as usize)
}

/// Parse a v2 header at the start of `buf`.
///
/// Returns the endpoint info and the number of bytes consumed, which is
/// always `16 + length` where `length` is the declared address block size.
pub fn parse_v2(buf: &[u8]) -> Result<(ProxyEndpointInfo, usize), ProxyError> {
    let total = declared_len(buf).ok_or(ProxyError::Truncated {
        expected: V2_HEADER_LEN,
        actual: buf.len(),
    })?;

    if buf[..12] != PROXY_V2_SIGNATURE[..] {
        return Err(ProxyError::malformed("invalid v2 signature"));
    }

    let version = buf[12] >> 4;
    let command = buf[12] & 0x0F;
    if version != 2 {
        return Err(ProxyError::malformed(format!(
            "unsupported version {}",
            version
        )));
    }

    match command {
        COMMAND_LOCAL => {
            ensure_available(buf, total)?;
            Ok((ProxyEndpointInfo::local(ProxyVersion::V2), total))
        }
        COMMAND_PROXY => {
            let family = buf[13] >> 4;
            let required = match family {
                FAMILY_INET => IPV4_ADDR_LEN,
                FAMILY_INET6 => IPV6_ADDR_LEN,
                other => return Err(ProxyError::UnsupportedFamily(other)),
            };
            if total < V2_HEADER_LEN + required {
                return Err(ProxyError::Truncated {
                    expected: V2_HEADER_LEN + required,
                    actual: total,
                });
            }
            ensure_available(buf, total)?;

            let block = &buf[V2_HEADER_LEN..total];
            let (source, destination) = if family == FAMILY_INET {
                decode_inet(block)
            } else {
                decode_inet6(block)
            };
            let info = ProxyEndpointInfo::tcp(ProxyVersion::V2, source, destination)
                .ok_or_else(|| ProxyError::malformed("mixed address families"))?;
            Ok((info, total))
        }
        other => Err(ProxyError::malformed(format!(
            "unsupported command {:#x}",
            other
        ))),
    }
}

fn ensure_available(buf: &[u8], total: usize) -> Result<(), ProxyError> {
    if buf.len() < total {
        return Err(ProxyError::Truncated {
            expected: total,
            actual: buf.len(),
        });
    }
    Ok(())
}

/// Caller guarantees `block.len() >= IPV4_ADDR_LEN`.
fn decode_inet(block: &[u8]) -> (SocketAddr, SocketAddr) {
    let src_ip = Ipv4Addr::new(block[0], block[1], block[2], block[3]);
    let dst_ip = Ipv4Addr::new(block[4], block[5], block[6], block[7]);
    let src_port = u16::from_be_bytes([block[8], block[9]]);
    let dst_port = u16::from_be_bytes([block[10], block[11]]);
    (
        SocketAddr::from((src_ip, src_port)),
        SocketAddr::from((dst_ip, dst_port)),
    )
}

/// Caller guarantees `block.len() >= IPV6_ADDR_LEN`.
fn decode_inet6(block: &[u8]) -> (SocketAddr, SocketAddr) {
    let mut src = [0u8; 16];
    let mut dst = [0u8; 16];
    src.copy_from_slice(&block[0..16]);
    dst.copy_from_slice(&block[16..32]);
    let src_port = u16::from_be_bytes([block[32], block[33]]);
    let dst_port = u16::from_be_bytes([block[34], block[35]]);
    (
        SocketAddr::from((Ipv6Addr::from(src), src_port)),
        SocketAddr::from((Ipv6Addr::from(dst), dst_port)),
    )
}
