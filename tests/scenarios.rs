use std::net::SocketAddr;
use std::time::Duration;

use pretty_assertions::assert_eq;
use realip::config::{FailurePolicy, FeatureToggle};
use realip::proxy::{
    detect, parse_header, parse_v1, parse_v2, strip_header, Classification, Detection,
    ProxiedStream, ProxyError, ProxySettings, ProxyVersion, Transport, TransportAddrs,
    PROXY_V2_SIGNATURE,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn v2_header(ver_cmd: u8, fam_proto: u8, declared: u16, block: &[u8]) -> Vec<u8> {
    let mut buf = PROXY_V2_SIGNATURE.to_vec();
    buf.push(ver_cmd);
    buf.push(fam_proto);
    buf.extend_from_slice(&declared.to_be_bytes());
    buf.extend_from_slice(block);
    buf
}

fn settings(enabled: bool, on_error: FailurePolicy) -> ProxySettings {
    ProxySettings {
        toggle: FeatureToggle::new(enabled),
        timeout: Duration::from_secs(5),
        on_error,
        max_header_len: 536,
    }
}

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

#[test]
fn v1_tcp4_with_http_payload() {
    let data = b"PROXY TCP4 192.0.2.100 198.51.100.50 45678 443\r\nGET / HTTP/1.1\r\n\r\n";
    assert_eq!(detect(data), Detection::V1);

    let (info, consumed) = parse_header(ProxyVersion::V1, data).unwrap();
    assert_eq!(info.version(), ProxyVersion::V1);
    assert_eq!(info.transport(), &Transport::Tcp4);
    assert_eq!(info.source(), Some(addr("192.0.2.100:45678")));
    assert_eq!(info.destination(), Some(addr("198.51.100.50:443")));
    assert!(data[consumed..].starts_with(b"GET /"));
}

#[test]
fn v2_ipv4_with_tls_record() {
    let mut block = vec![192, 0, 2, 100, 198, 51, 100, 50];
    block.extend_from_slice(&45678u16.to_be_bytes());
    block.extend_from_slice(&443u16.to_be_bytes());
    let mut data = v2_header(0x21, 0x11, 12, &block);
    data.extend_from_slice(&[0x16, 0x03, 0x01, 0x00, 0x05]);

    assert_eq!(detect(&data), Detection::V2);
    let (info, consumed) = parse_v2(&data).unwrap();
    assert_eq!(info.transport(), &Transport::Tcp4);
    assert_eq!(info.source(), Some(addr("192.0.2.100:45678")));
    assert_eq!(info.destination(), Some(addr("198.51.100.50:443")));
    assert_eq!(data[consumed], 0x16);
    assert_eq!(data.len() - consumed, 5);
}

#[test]
fn v2_local_has_no_addresses() {
    let data = v2_header(0x20, 0x00, 0, &[]);

    let (info, consumed) = parse_v2(&data).unwrap();
    assert_eq!(consumed, 16);
    assert_eq!(info.transport(), &Transport::Unknown);
    assert!(!info.has_addresses());
    assert_eq!(info.source_address(), "0.0.0.0");
    assert_eq!(info.source_port(), 0);
}

#[test]
fn v2_short_address_block_is_truncated() {
    let data = v2_header(0x21, 0x11, 12, &[192, 0, 2, 100, 198, 51]);

    let err = parse_v2(&data).unwrap_err();
    assert!(matches!(err, ProxyError::Truncated { expected: 28, actual: 22 }));
}

#[test]
fn v1_with_four_fields_is_malformed() {
    let err = parse_v1(b"PROXY TCP4 192.0.2.1 198.51.100.1\r\n").unwrap_err();
    assert!(matches!(err, ProxyError::Malformed(_)));
}

#[test]
fn v2_ipv6_is_canonicalized() {
    let mut block = Vec::new();
    block.extend_from_slice(&"2001:db8::1".parse::<std::net::Ipv6Addr>().unwrap().octets());
    block.extend_from_slice(&"2001:db8::2".parse::<std::net::Ipv6Addr>().unwrap().octets());
    block.extend_from_slice(&12345u16.to_be_bytes());
    block.extend_from_slice(&443u16.to_be_bytes());
    let data = v2_header(0x21, 0x21, 36, &block);

    let (info, consumed) = parse_v2(&data).unwrap();
    assert_eq!(consumed, data.len());
    assert_eq!(info.transport(), &Transport::Tcp6);
    assert_eq!(info.source_address(), "2001:db8::1");
    assert_eq!(info.destination_address(), "2001:db8::2");
    assert_eq!(info.source_port(), 12345);
    assert_eq!(info.destination_port(), 443);
}

#[test]
fn strip_header_rejects_malformed_line() {
    assert!(strip_header(b"PROXY TCP4 192.0.2.1 198.51.100.1\r\n").is_err());
}

#[tokio::test]
async fn adapter_substitutes_addresses_over_duplex() {
    let (mut client, server) = tokio::io::duplex(256);
    let transport = TransportAddrs::new(addr("10.0.0.1:8080"), addr("10.0.0.2:50000"));

    let writer = tokio::spawn(async move {
        client
            .write_all(b"PROXY TCP6 2001:db8::1 2001:db8::2 12345 443\r\n")
            .await
            .unwrap();
        client.write_all(b"payload").await.unwrap();
    });

    let settings = settings(true, FailurePolicy::Reject);
    let mut stream = ProxiedStream::accept(server, transport, &settings).await.unwrap();
    writer.await.unwrap();

    assert_eq!(stream.peer_addr(), Some(addr("[2001:db8::1]:12345")));
    assert_eq!(stream.local_addr(), Some(addr("[2001:db8::2]:443")));
    assert_eq!(stream.transport_addrs(), transport);

    let mut payload = Vec::new();
    stream.read_to_end(&mut payload).await.unwrap();
    assert_eq!(payload, b"payload");
}

#[tokio::test]
async fn adapter_leaves_plain_traffic_alone() {
    let data = b"\x16\x03\x01\x00\x2a client hello bytes";
    let transport = TransportAddrs::new(addr("10.0.0.1:443"), addr("10.0.0.2:50000"));

    let mut stream =
        ProxiedStream::accept(&data[..], transport, &settings(true, FailurePolicy::Reject))
            .await
            .unwrap();
    assert!(matches!(stream.classification(), Classification::NotProxyProtocol));
    assert_eq!(stream.peer_addr(), Some(addr("10.0.0.2:50000")));

    let mut payload = Vec::new();
    stream.read_to_end(&mut payload).await.unwrap();
    assert_eq!(payload, data);
}

#[tokio::test]
async fn adapter_disabled_does_not_inspect() {
    let data = b"PROXY TCP4 192.0.2.100 198.51.100.50 45678 443\r\nhello";
    let transport = TransportAddrs::new(addr("10.0.0.1:443"), addr("10.0.0.2:50000"));

    let mut stream =
        ProxiedStream::accept(&data[..], transport, &settings(false, FailurePolicy::Reject))
            .await
            .unwrap();
    assert!(matches!(stream.classification(), Classification::Disabled));
    assert_eq!(stream.peer_addr(), Some(addr("10.0.0.2:50000")));

    let mut payload = Vec::new();
    stream.read_to_end(&mut payload).await.unwrap();
    assert_eq!(payload, data);
}

#[tokio::test]
async fn adapter_failure_policies() {
    let data = b"PROXY TCP4 192.0.2.100 198.51.100.50 45678 99999\r\nhello";
    let transport = TransportAddrs::default();

    let err = ProxiedStream::accept(&data[..], transport, &settings(true, FailurePolicy::Reject))
        .await
        .unwrap_err();
    assert!(err.is_header_error());

    let mut stream =
        ProxiedStream::accept(&data[..], transport, &settings(true, FailurePolicy::Passthrough))
            .await
            .unwrap();
    assert!(matches!(stream.classification(), Classification::ParseFailed(_)));
    assert_eq!(stream.peer_addr(), None);

    let mut payload = Vec::new();
    stream.read_to_end(&mut payload).await.unwrap();
    assert_eq!(payload, data);
}

#[tokio::test(start_paused = true)]
async fn adapter_times_out_on_stalled_header() {
    let (mut client, server) = tokio::io::duplex(64);
    client.write_all(b"PROXY TCP4 192.0.2.100").await.unwrap();

    let settings = ProxySettings {
        timeout: Duration::from_secs(2),
        ..settings(true, FailurePolicy::Reject)
    };
    let err = ProxiedStream::accept(server, TransportAddrs::default(), &settings)
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyError::Timeout));
    drop(client);
}

#[tokio::test(start_paused = true)]
async fn adapter_passes_through_silent_client() {
    let (mut client, server) = tokio::io::duplex(64);
    let settings = ProxySettings {
        timeout: Duration::from_secs(2),
        ..settings(true, FailurePolicy::Passthrough)
    };

    let mut stream = ProxiedStream::accept(server, TransportAddrs::default(), &settings)
        .await
        .unwrap();
    assert!(matches!(
        stream.classification(),
        Classification::NotProxyProtocol
    ));

    client.write_all(b"220 ready\r\n").await.unwrap();
    drop(client);
    let mut payload = Vec::new();
    stream.read_to_end(&mut payload).await.unwrap();
    assert_eq!(payload, b"220 ready\r\n");
}

#[tokio::test]
async fn adapter_rejects_oversized_v2_header() {
    let data = v2_header(0x21, 0x11, 4096, &[0u8; 32]);
    let err = ProxiedStream::accept(
        &data[..],
        TransportAddrs::default(),
        &settings(true, FailurePolicy::Reject),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ProxyError::Malformed(_)));
}
