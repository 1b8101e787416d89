//! PROXY header generation.
//!
//! Renders a [`ProxyEndpointInfo`] back onto the wire, either as a v1 text
//! line or as a v2 binary header, for prepending to an upstream connection.

use std::net::{IpAddr, SocketAddr};

use bytes::{BufMut, BytesMut};

use super::detect::{PROXY_V2_SIGNATURE, V2_HEADER_LEN};
use super::info::ProxyEndpointInfo;
use super::v2::{
    COMMAND_LOCAL, COMMAND_PROXY, FAMILY_INET, FAMILY_INET6, IPV4_ADDR_LEN, IPV6_ADDR_LEN,
};

/// Version 2 in the high nibble.
const VERSION_2: u8 = 0x20;

/// Transport protocol: STREAM (TCP).
const TRANSPORT_STREAM: u8 = 0x01;

/// Encode as a v1 line, including the trailing CRLF.
///
/// Headers without addresses become the six-field UNKNOWN form so the line
/// stays within what the detector accepts.
pub fn encode_v1(info: &ProxyEndpointInfo) -> String {
    match (info.source(), info.destination()) {
        (Some(src), Some(dst)) => format!(
            "PROXY {} {} {} {} {}\r\n",
            info.transport(),
            src.ip(),
            dst.ip(),
            src.port(),
            dst.port()
        ),
        _ => "PROXY UNKNOWN 0.0.0.0 0.0.0.0 0 0\r\n".to_string(),
    }
}

/// Encode as a v2 header.
///
/// TCP endpoints produce a PROXY command with an IPv4 or IPv6 block; anything
/// without addresses produces a LOCAL command with an empty block.
pub fn encode_v2(info: &ProxyEndpointInfo) -> BytesMut {
    match (info.source(), info.destination()) {
        (Some(src), Some(dst)) => encode_v2_proxy(src, dst),
        _ => encode_v2_local(),
    }
}

fn encode_v2_local() -> BytesMut {
    let mut buf = BytesMut::with_capacity(V2_HEADER_LEN);
    buf.put_slice(PROXY_V2_SIGNATURE);
    buf.put_u8(VERSION_2 | COMMAND_LOCAL);
    buf.put_u8(0x00);
    buf.put_u16(0);
    buf
}

fn encode_v2_proxy(src: SocketAddr, dst: SocketAddr) -> BytesMut {
    let (family, len) = match src.ip() {
        IpAddr::V4(_) => (FAMILY_INET, IPV4_ADDR_LEN),
        IpAddr::V6(_) => (FAMILY_INET6, IPV6_ADDR_LEN),
    };
    let mut buf = BytesMut::with_capacity(V2_HEADER_LEN + len);

    buf.put_slice(PROXY_V2_SIGNATURE);
    buf.put_u8(VERSION_2 | COMMAND_PROXY);
    buf.put_u8((family << 4) | TRANSPORT_STREAM);
    buf.put_u16(len as u16);

    // ProxyEndpointInfo guarantees both addresses share a family.
    put_ip(&mut buf, src.ip());
    put_ip(&mut buf, dst.ip());
    buf.put_u16(src.port());
    buf.put_u16(dst.port());

    buf
}

fn put_ip(buf: &mut BytesMut, ip: IpAddr) {
    match ip {
        IpAddr::V4(v4) => buf.put_slice(&v4.octets()),
        IpAddr::V6(v6) => buf.put_slice(&v6.octets()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::info::ProxyVersion;
    use crate::proxy::{parse_v1, parse_v2};

    fn tcp(src: &str, dst: &str) -> ProxyEndpointInfo {
        ProxyEndpointInfo::tcp(ProxyVersion::V2, src.parse().unwrap(), dst.parse().unwrap())
            .unwrap()
    }

    #[test]
    fn test_encode_ipv4() {
        let encoded = encode_v2(&tcp("192.168.1.1:12345", "10.0.0.1:443"));

        // 12 signature + 4 header + 12 addresses
        assert_eq!(encoded.len(), 28);
        assert_eq!(&encoded[..12], PROXY_V2_SIGNATURE);
        assert_eq!(encoded[12], 0x21);
        assert_eq!(encoded[13], 0x11);
        assert_eq!(u16::from_be_bytes([encoded[14], encoded[15]]), 12);
    }

    #[test]
    fn test_encode_ipv6() {
        let encoded = encode_v2(&tcp("[2001:db8::1]:12345", "[2001:db8::2]:443"));

        // 12 signature + 4 header + 36 addresses
        assert_eq!(encoded.len(), 52);
        assert_eq!(encoded[13], 0x21);
        assert_eq!(u16::from_be_bytes([encoded[14], encoded[15]]), 36);

        let (parsed, consumed) = parse_v2(&encoded).unwrap();
        assert_eq!(consumed, 52);
        assert_eq!(parsed.source(), Some("[2001:db8::1]:12345".parse().unwrap()));
    }

    #[test]
    fn test_encode_local() {
        let encoded = encode_v2(&ProxyEndpointInfo::local(ProxyVersion::V2));
        assert_eq!(encoded.len(), 16);
        assert_eq!(encoded[12], 0x20);

        let (parsed, consumed) = parse_v2(&encoded).unwrap();
        assert_eq!(consumed, 16);
        assert!(!parsed.has_addresses());
    }

    #[test]
    fn test_encode_v1() {
        let info = tcp("192.0.2.100:45678", "198.51.100.50:443");
        assert_eq!(
            encode_v1(&info),
            "PROXY TCP4 192.0.2.100 198.51.100.50 45678 443\r\n"
        );

        let local = ProxyEndpointInfo::local(ProxyVersion::V1);
        let line = encode_v1(&local);
        let (parsed, consumed) = parse_v1(line.as_bytes()).unwrap();
        assert_eq!(consumed, line.len());
        assert_eq!(parsed, local);
    }
}
