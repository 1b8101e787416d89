//! Cross-checks against the `ppp` crate's decoder and builder.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use realip::proxy::{
    encode_v1, encode_v2, parse_v2, strip_header, ProxyEndpointInfo, ProxyVersion, Transport,
};

fn info(version: ProxyVersion, src: &str, dst: &str) -> ProxyEndpointInfo {
    ProxyEndpointInfo::tcp(version, src.parse().unwrap(), dst.parse().unwrap()).unwrap()
}

#[test]
fn encoded_v2_ipv4_decodes_with_ppp() {
    let info = info(ProxyVersion::V2, "192.0.2.100:45678", "198.51.100.50:443");
    let encoded = encode_v2(&info);

    let header = ppp::v2::Header::try_from(&encoded[..]).unwrap();
    match header.addresses {
        ppp::v2::Addresses::IPv4(addrs) => {
            let src = SocketAddr::new(IpAddr::V4(addrs.source_address), addrs.source_port);
            let dst = SocketAddr::new(
                IpAddr::V4(addrs.destination_address),
                addrs.destination_port,
            );
            assert_eq!(Some(src), info.source());
            assert_eq!(Some(dst), info.destination());
        }
        other => panic!("unexpected addresses: {:?}", other),
    }
}

#[test]
fn encoded_v2_ipv6_decodes_with_ppp() {
    let info = info(ProxyVersion::V2, "[2001:db8::1]:12345", "[2001:db8::2]:443");
    let encoded = encode_v2(&info);

    let header = ppp::v2::Header::try_from(&encoded[..]).unwrap();
    match header.addresses {
        ppp::v2::Addresses::IPv6(addrs) => {
            assert_eq!(addrs.source_address, "2001:db8::1".parse::<std::net::Ipv6Addr>().unwrap());
            assert_eq!(addrs.source_port, 12345);
            assert_eq!(addrs.destination_port, 443);
        }
        other => panic!("unexpected addresses: {:?}", other),
    }
}

#[test]
fn encoded_v2_local_decodes_with_ppp() {
    let encoded = encode_v2(&ProxyEndpointInfo::local(ProxyVersion::V2));

    let header = ppp::v2::Header::try_from(&encoded[..]).unwrap();
    assert!(matches!(header.addresses, ppp::v2::Addresses::Unspecified));
}

#[test]
fn encoded_v1_decodes_with_ppp() {
    let info = info(ProxyVersion::V1, "192.0.2.100:45678", "198.51.100.50:443");
    let line = encode_v1(&info);

    let header = ppp::v1::Header::try_from(line.as_bytes()).unwrap();
    match header.addresses {
        ppp::v1::Addresses::Tcp4(addrs) => {
            assert_eq!(addrs.source_address, Ipv4Addr::new(192, 0, 2, 100));
            assert_eq!(addrs.destination_address, Ipv4Addr::new(198, 51, 100, 50));
            assert_eq!(addrs.source_port, 45678);
            assert_eq!(addrs.destination_port, 443);
        }
        other => panic!("unexpected addresses: {:?}", other),
    }
}

#[test]
fn ppp_built_v2_with_tlvs_parses() {
    let addresses: ppp::v2::Addresses = ppp::v2::IPv4::new(
        Ipv4Addr::new(192, 0, 2, 100),
        Ipv4Addr::new(198, 51, 100, 50),
        45678,
        443,
    )
    .into();
    let mut data = ppp::v2::Builder::with_addresses(
        ppp::v2::Version::Two | ppp::v2::Command::Proxy,
        ppp::v2::Protocol::Stream,
        addresses,
    )
    .write_tlv(ppp::v2::Type::NoOp, b"padding")
    .unwrap()
    .build()
    .unwrap();
    let header_len = data.len();
    data.extend_from_slice(b"GET / HTTP/1.1\r\n\r\n");

    let (info, consumed) = parse_v2(&data).unwrap();
    assert_eq!(consumed, header_len);
    assert_eq!(info.transport(), &Transport::Tcp4);
    assert_eq!(info.source(), Some("192.0.2.100:45678".parse().unwrap()));

    let (_, remaining) = strip_header(&data).unwrap();
    assert_eq!(remaining, b"GET / HTTP/1.1\r\n\r\n");
}
