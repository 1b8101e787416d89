//! Endpoint information recovered from a PROXY header.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// PROXY protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyVersion {
    V1,
    V2,
}

impl ProxyVersion {
    /// Numeric version as carried on the wire (1 or 2).
    pub fn number(self) -> u8 {
        match self {
            ProxyVersion::V1 => 1,
            ProxyVersion::V2 => 2,
        }
    }
}

/// Transport carried by the proxied connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp4,
    Tcp6,
    Unknown,
    /// Unrecognized v1 token, kept verbatim.
    Other(String),
}

impl Transport {
    /// Map a v1 transport token.
    pub fn from_token(token: &str) -> Self {
        match token {
            "TCP4" => Transport::Tcp4,
            "TCP6" => Transport::Tcp6,
            "UNKNOWN" => Transport::Unknown,
            other => Transport::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Transport::Tcp4 => "TCP4",
            Transport::Tcp6 => "TCP6",
            Transport::Unknown => "UNKNOWN",
            Transport::Other(token) => token,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Original connection endpoints carried by a PROXY header.
///
/// Values are only produced by a fully successful parse (or by
/// [`ProxyEndpointInfo::tcp`] / [`ProxyEndpointInfo::local`]); there is no
/// partially populated state. `source` and `destination` are both present or
/// both absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpointInfo {
    version: ProxyVersion,
    transport: Transport,
    addresses: Option<(SocketAddr, SocketAddr)>,
}

impl ProxyEndpointInfo {
    /// A proxied TCP connection. The transport follows the address family of
    /// `source`; mixed families are rejected.
    pub fn tcp(version: ProxyVersion, source: SocketAddr, destination: SocketAddr) -> Option<Self> {
        let transport = match (source.ip(), destination.ip()) {
            (IpAddr::V4(_), IpAddr::V4(_)) => Transport::Tcp4,
            (IpAddr::V6(_), IpAddr::V6(_)) => Transport::Tcp6,
            _ => return None,
        };
        Some(Self {
            version,
            transport,
            addresses: Some((source, destination)),
        })
    }

    /// A connection without client identity (v2 LOCAL, v1 UNKNOWN).
    pub fn local(version: ProxyVersion) -> Self {
        Self {
            version,
            transport: Transport::Unknown,
            addresses: None,
        }
    }

    /// A v1 header with an unrecognized transport token. Addresses are kept
    /// only when both literals parsed.
    pub(crate) fn opaque(token: &str, addresses: Option<(SocketAddr, SocketAddr)>) -> Self {
        Self {
            version: ProxyVersion::V1,
            transport: Transport::Other(token.to_string()),
            addresses,
        }
    }

    pub fn version(&self) -> ProxyVersion {
        self.version
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Original client address.
    pub fn source(&self) -> Option<SocketAddr> {
        self.addresses.map(|(src, _)| src)
    }

    /// Original destination address (usually the proxy's listener).
    pub fn destination(&self) -> Option<SocketAddr> {
        self.addresses.map(|(_, dst)| dst)
    }

    /// Canonical textual client address, `0.0.0.0` when absent.
    pub fn source_address(&self) -> String {
        self.source()
            .map(|addr| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .to_string()
    }

    /// Canonical textual destination address, `0.0.0.0` when absent.
    pub fn destination_address(&self) -> String {
        self.destination()
            .map(|addr| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .to_string()
    }

    pub fn source_port(&self) -> u16 {
        self.source().map_or(0, |addr| addr.port())
    }

    pub fn destination_port(&self) -> u16 {
        self.destination().map_or(0, |addr| addr.port())
    }

    /// Whether the header carried a client identity.
    pub fn has_addresses(&self) -> bool {
        self.addresses.is_some()
    }
}

impl fmt::Display for ProxyEndpointInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addresses {
            Some((src, dst)) => write!(
                f,
                "{} -> {} (v{}, {})",
                src,
                dst,
                self.version.number(),
                self.transport
            ),
            None => write!(f, "no address (v{}, {})", self.version.number(), self.transport),
        }
    }
}
