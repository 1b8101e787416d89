//! `[proxy_protocol]` section.

use std::time::Duration;

use serde::Deserialize;

/// v2 preamble plus an IPv6 address block
const MIN_HEADER_LEN: usize = 52;

/// What to do with a connection whose PROXY header fails to parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Hand the connection on untouched, with its transport-level addresses
    #[default]
    Passthrough,
    /// Drop the connection
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyProtocolConfig {
    /// Initial state of the runtime toggle
    pub enabled: bool,
    /// Seconds allowed for the header to arrive
    pub timeout: u64,
    pub on_error: FailurePolicy,
    /// Upper bound on a v2 header's declared size, TLVs included
    pub max_header_len: usize,
}

impl Default for ProxyProtocolConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout: 5,
            on_error: FailurePolicy::Passthrough,
            max_header_len: 536,
        }
    }
}

impl ProxyProtocolConfig {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub(super) fn validate(&self) -> Result<(), String> {
        if self.timeout == 0 {
            return Err("proxy_protocol.timeout must be at least 1 second".to_string());
        }
        if self.max_header_len < MIN_HEADER_LEN {
            return Err(format!(
                "proxy_protocol.max_header_len must be at least {}",
                MIN_HEADER_LEN
            ));
        }
        Ok(())
    }
}
