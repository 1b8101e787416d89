//! PROXY v1 (text) parser.
//!
//! `PROXY <TCP4|TCP6|UNKNOWN> <src-ip> <dst-ip> <src-port> <dst-port>\r\n`

use std::net::{IpAddr, SocketAddr};

use super::detect::find_crlf;
use super::error::ProxyError;
use super::info::{ProxyEndpointInfo, ProxyVersion, Transport};

/// Parse a v1 header at the start of `buf`.
///
/// Returns the endpoint info and the number of bytes consumed (the line
/// including its CRLF terminator). Bytes after the terminator are untouched.
pub fn parse_v1(buf: &[u8]) -> Result<(ProxyEndpointInfo, usize), ProxyError> {
    let end = find_crlf(buf).ok_or_else(|| ProxyError::malformed("v1 line has no CRLF"))?;
    let consumed = end + 2;

    let line = std::str::from_utf8(&buf[..end])
        .map_err(|_| ProxyError::malformed("v1 line is not valid UTF-8"))?;
    let parts: Vec<&str> = line.trim().split(' ').collect();

    if parts.len() < 6 {
        return Err(ProxyError::malformed(format!(
            "v1 line has {} fields, expected 6",
            parts.len()
        )));
    }
    if parts[0] != "PROXY" {
        return Err(ProxyError::malformed(format!(
            "v1 line starts with {:?}",
            parts[0]
        )));
    }

    let info = match Transport::from_token(parts[1]) {
        // Everything after UNKNOWN is ignored
        Transport::Unknown => ProxyEndpointInfo::local(ProxyVersion::V1),
        Transport::Tcp4 | Transport::Tcp6 => {
            let src_port = parse_port(parts[4], "source")?;
            let dst_port = parse_port(parts[5], "destination")?;
            let src = parse_ip(parts[2], "source")?;
            let dst = parse_ip(parts[3], "destination")?;
            let expect_v4 = parts[1] == "TCP4";
            if src.is_ipv4() != expect_v4 || dst.is_ipv4() != expect_v4 {
                return Err(ProxyError::malformed(format!(
                    "{} header carries {} -> {}",
                    parts[1], src, dst
                )));
            }
            ProxyEndpointInfo::tcp(
                ProxyVersion::V1,
                SocketAddr::new(src, src_port),
                SocketAddr::new(dst, dst_port),
            )
            .ok_or_else(|| ProxyError::malformed("mixed address families"))?
        }
        Transport::Other(_) => {
            let src_port = parse_port(parts[4], "source")?;
            let dst_port = parse_port(parts[5], "destination")?;
            let addresses = match (parts[2].parse::<IpAddr>(), parts[3].parse::<IpAddr>()) {
                (Ok(src), Ok(dst)) => Some((
                    SocketAddr::new(src, src_port),
                    SocketAddr::new(dst, dst_port),
                )),
                _ => None,
            };
            ProxyEndpointInfo::opaque(parts[1], addresses)
        }
    };

    Ok((info, consumed))
}

fn parse_port(field: &str, which: &str) -> Result<u16, ProxyError> {
    field
        .parse::<u16>()
        .map_err(|_| ProxyError::malformed(format!("invalid {} port {:?}", which, field)))
}

fn parse_ip(field: &str, which: &str) -> Result<IpAddr, ProxyError> {
    field
        .parse::<IpAddr>()
        .map_err(|_| ProxyError::malformed(format!("invalid {} address {:?}", which, field)))
}
