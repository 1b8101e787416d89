//! PROXY header errors.

use std::fmt;

/// Errors that can occur while reading or parsing a PROXY header
#[derive(Debug)]
pub enum ProxyError {
    /// Structurally invalid v1 line or v2 field
    Malformed(String),
    /// Fewer bytes than the header requires
    Truncated {
        /// Bytes the header needs
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },
    /// v2 address family other than IPv4/IPv6
    UnsupportedFamily(u8),
    /// Timeout waiting for the PROXY header
    Timeout,
    /// IO error reading from the stream
    Io(std::io::Error),
}

impl ProxyError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ProxyError::Malformed(msg.into())
    }

    /// Whether the error came from the header bytes themselves rather than
    /// the transport.
    pub fn is_header_error(&self) -> bool {
        matches!(
            self,
            ProxyError::Malformed(_) | ProxyError::Truncated { .. } | ProxyError::UnsupportedFamily(_)
        )
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Malformed(msg) => write!(f, "malformed PROXY header: {}", msg),
            ProxyError::Truncated { expected, actual } => write!(
                f,
                "truncated PROXY header: expected {} bytes, got {}",
                expected, actual
            ),
            ProxyError::UnsupportedFamily(family) => {
                write!(f, "unsupported PROXY v2 address family: {:#x}", family)
            }
            ProxyError::Timeout => write!(f, "PROXY header timeout"),
            ProxyError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(e: std::io::Error) -> Self {
        ProxyError::Io(e)
    }
}
