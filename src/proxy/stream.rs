//! Connection adapter.
//!
//! [`ProxiedStream`] owns an accepted byte stream, inspects its leading bytes
//! for a PROXY header, strips the header when one parses, and then behaves as
//! the original stream minus the header. Bytes inspected but not part of a
//! header are replayed to the reader before anything else.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::detect::{
    could_be_header, detect, Detection, PROXY_V1_SIGNATURE, PROXY_V2_SIGNATURE, V1_MAX_LINE,
    V2_HEADER_LEN,
};
use super::error::ProxyError;
use super::info::{ProxyEndpointInfo, ProxyVersion};
use super::parser::parse_header;
use super::v2::declared_len;
use crate::config::{FailurePolicy, FeatureToggle, ProxyProtocolConfig};

/// Initial capacity for the inspection buffer
const INITIAL_CAPACITY: usize = 512;

/// Per-listener settings for header handling
#[derive(Debug, Clone)]
pub struct ProxySettings {
    /// Sampled once per connection
    pub toggle: FeatureToggle,
    /// Deadline for the detection/parse phase
    pub timeout: Duration,
    pub on_error: FailurePolicy,
    /// Largest v2 header (preamble plus declared block) that will be buffered
    pub max_header_len: usize,
}

impl ProxySettings {
    pub fn new(toggle: FeatureToggle, config: &ProxyProtocolConfig) -> Self {
        Self {
            toggle,
            timeout: config.timeout_duration(),
            on_error: config.on_error,
            max_header_len: config.max_header_len,
        }
    }
}

/// Terminal classification of a connection's leading bytes
#[derive(Debug)]
pub enum Classification {
    /// Header handling was switched off when the connection arrived
    Disabled,
    /// No PROXY header; stream untouched
    NotProxyProtocol,
    /// Header parsed and removed from the stream
    HeaderParsed(ProxyEndpointInfo),
    /// Header detected but invalid; stream untouched (passthrough policy)
    ParseFailed(ProxyError),
}

/// Transport-level addresses of an accepted connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportAddrs {
    pub local: Option<SocketAddr>,
    pub peer: Option<SocketAddr>,
}

impl TransportAddrs {
    pub fn new(local: SocketAddr, peer: SocketAddr) -> Self {
        Self {
            local: Some(local),
            peer: Some(peer),
        }
    }
}

/// An accepted stream with any PROXY header removed.
///
/// At most `max(107, max_header_len)` bytes are buffered while the header is
/// inspected.
#[derive(Debug)]
pub struct ProxiedStream<S> {
    inner: S,
    buf: BytesMut,
    eof: bool,
    transport: TransportAddrs,
    classification: Classification,
}

impl<S: AsyncRead + Unpin> ProxiedStream<S> {
    /// Inspect `inner` for a PROXY header and wrap it.
    ///
    /// Returns an error only when the header is invalid, or started but
    /// stalled past the deadline, and the policy is [`FailurePolicy::Reject`];
    /// or when reading the stream fails.
    ///
    /// A client that sends nothing, or only part of a signature, before the
    /// deadline is not PROXY traffic and is handed on with its bytes intact.
    pub async fn accept(
        inner: S,
        transport: TransportAddrs,
        settings: &ProxySettings,
    ) -> Result<Self, ProxyError> {
        let mut stream = Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_CAPACITY),
            eof: false,
            transport,
            classification: Classification::NotProxyProtocol,
        };

        if !settings.toggle.is_enabled() {
            stream.classification = Classification::Disabled;
            return Ok(stream);
        }

        let read = timeout(
            settings.timeout,
            stream.read_header(settings.max_header_len),
        )
        .await;
        let outcome = match read {
            Ok(outcome) => outcome,
            Err(_) if stream.header_started() => Err(ProxyError::Timeout),
            Err(_) => {
                debug!(
                    peer = ?transport.peer,
                    buffered = stream.buf.len(),
                    "no PROXY header before deadline"
                );
                Ok(None)
            }
        };

        stream.classification = match outcome {
            Ok(None) => {
                debug!(peer = ?transport.peer, "no PROXY header");
                Classification::NotProxyProtocol
            }
            Ok(Some((info, consumed))) => {
                stream.buf.advance(consumed);
                info!(peer = ?transport.peer, header = %info, "PROXY header parsed");
                Classification::HeaderParsed(info)
            }
            Err(e) if e.is_header_error() || matches!(e, ProxyError::Timeout) => {
                warn!(
                    peer = ?transport.peer,
                    buffered = stream.buf.len(),
                    policy = ?settings.on_error,
                    error = %e,
                    "invalid PROXY header"
                );
                match settings.on_error {
                    FailurePolicy::Reject => return Err(e),
                    FailurePolicy::Passthrough => Classification::ParseFailed(e),
                }
            }
            Err(e) => return Err(e),
        };

        Ok(stream)
    }

    /// Buffer until the prefix is classified, then parse a detected header.
    ///
    /// Nothing is removed from the buffer here; the caller discards the
    /// header only once parsing succeeded.
    async fn read_header(
        &mut self,
        max_header_len: usize,
    ) -> Result<Option<(ProxyEndpointInfo, usize)>, ProxyError> {
        while !self.eof && could_be_header(&self.buf) {
            let want = if self.buf.starts_with(b"P") {
                V1_MAX_LINE
            } else {
                V2_HEADER_LEN
            };
            self.buffer_more(want).await?;
        }

        let version = match detect(&self.buf) {
            Detection::None => return Ok(None),
            Detection::V1 => ProxyVersion::V1,
            Detection::V2 => ProxyVersion::V2,
        };

        if version == ProxyVersion::V2 {
            if let Some(total) = declared_len(&self.buf) {
                if total > max_header_len {
                    return Err(ProxyError::malformed(format!(
                        "v2 header of {} bytes exceeds limit of {}",
                        total, max_header_len
                    )));
                }
                debug!(declared = total, buffered = self.buf.len(), "buffering v2 header");
                while !self.eof && self.buf.len() < total {
                    self.buffer_more(total).await?;
                }
            }
        }

        parse_header(version, &self.buf).map(Some)
    }

    /// A full v1 or v2 signature has arrived.
    fn header_started(&self) -> bool {
        self.buf.starts_with(PROXY_V1_SIGNATURE) || self.buf.starts_with(PROXY_V2_SIGNATURE)
    }

    /// Read from the inner stream until `limit` bytes are buffered or a read
    /// returns data or EOF.
    async fn buffer_more(&mut self, limit: usize) -> io::Result<usize> {
        let max = limit.saturating_sub(self.buf.len());
        let n = (&mut self.inner)
            .take(max as u64)
            .read_buf(&mut self.buf)
            .await?;
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }
}

impl<S> ProxiedStream<S> {
    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    /// Parsed header, if one was removed from the stream.
    pub fn proxy_info(&self) -> Option<&ProxyEndpointInfo> {
        match &self.classification {
            Classification::HeaderParsed(info) => Some(info),
            _ => None,
        }
    }

    /// Client address: the header's source when it carried one, else the
    /// transport peer.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.proxy_info()
            .and_then(|info| info.source())
            .or(self.transport.peer)
    }

    /// Local address: the header's destination when it carried one, else the
    /// transport local address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.proxy_info()
            .and_then(|info| info.destination())
            .or(self.transport.local)
    }

    /// Addresses of the underlying transport, never substituted.
    pub fn transport_addrs(&self) -> TransportAddrs {
        self.transport
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Returns the unread buffered bytes and the inner stream.
    pub fn into_parts(self) -> (Bytes, S) {
        (self.buf.freeze(), self.inner)
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ProxiedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        out: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if out.remaining() == 0 {
            Poll::Ready(Ok(()))
        } else if !self.buf.is_empty() {
            let n = self.buf.len().min(out.remaining());
            let chunk = self.buf.split_to(n);
            out.put_slice(&chunk);
            Poll::Ready(Ok(()))
        } else {
            Pin::new(&mut self.inner).poll_read(cx, out)
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ProxiedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
