//! Classification answers returned to the host.

use std::fmt;

use tracing::debug;

use crate::config::FeatureToggle;
use crate::proxy::{detect, Detection};

/// Answer to "does this connection carry a PROXY header?"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    /// A header was detected; route the connection to the ingress call.
    Captured,
    /// Not ours; the host handles the connection as usual.
    Unhandled,
    /// The request could not be evaluated.
    Error(String),
}

impl ControlOutcome {
    /// Numeric code understood by the host.
    pub fn status_code(&self) -> u16 {
        match self {
            ControlOutcome::Captured => 280,
            ControlOutcome::Unhandled => 284,
            ControlOutcome::Error(_) => 580,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ControlOutcome::Captured => "CAPTURED",
            ControlOutcome::Unhandled => "UNHANDLED",
            ControlOutcome::Error(_) => "ERROR",
        }
    }
}

impl fmt::Display for ControlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlOutcome::Error(reason) => write!(f, "ERROR: {}", reason),
            other => f.write_str(other.name()),
        }
    }
}

/// Classify a connection's leading bytes for the host.
pub fn sniff(prefix: &[u8], toggle: &FeatureToggle) -> ControlOutcome {
    if !toggle.is_enabled() {
        return ControlOutcome::Unhandled;
    }
    let detection = detect(prefix);
    debug!(prefix_len = prefix.len(), detection = ?detection, "sniffed connection prefix");
    match detection {
        Detection::None => ControlOutcome::Unhandled,
        Detection::V1 | Detection::V2 => ControlOutcome::Captured,
    }
}
