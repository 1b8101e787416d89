//! realip: recover the original client address from PROXY protocol v1/v2
//! headers.
//!
//! The [`proxy`] module holds the protocol core (detection, parsing,
//! encoding and a stream adapter). [`host`] serves it to a host process over
//! HTTP, and [`config`] loads the settings both share.

pub mod config;
pub mod host;
pub mod proxy;

pub use config::{Config, FailurePolicy, FeatureToggle};
pub use proxy::{
    detect, Detection, ProxiedStream, ProxyEndpointInfo, ProxyError, ProxyListener,
    ProxySettings, ProxyVersion,
};
