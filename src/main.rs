//! realip
//!
//! Serves the PROXY protocol endpoints to a host process:
//! - Classifies connection prefixes (captured / unhandled / error)
//! - Strips PROXY v1/v2 headers and returns the original client address
//! - Exposes a status and runtime toggle API

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use realip::config::Config;
use realip::host::{self, HostState, ServerError};
use realip::proxy::{ProxyListener, ProxySettings};
use realip::FeatureToggle;

#[derive(Debug, Parser)]
#[command(name = "realip", version, about)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address for the host endpoint server
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Start with PROXY header handling enabled
    #[arg(long)]
    enable: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if args.enable {
        config.proxy_protocol.enabled = true;
    }
    if let Some(level) = args.log_level {
        config.log.level = level;
    }

    // Prefer RUST_LOG, fall back to the configured level
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log.level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_addr = %config.server.bind,
        enabled = config.proxy_protocol.enabled,
        timeout_secs = config.proxy_protocol.timeout,
        on_error = ?config.proxy_protocol.on_error,
        "Starting realip"
    );

    let toggle = FeatureToggle::new(config.proxy_protocol.enabled);
    let settings = ProxySettings::new(toggle.clone(), &config.proxy_protocol);
    let listener = ProxyListener::bind(config.server.bind, settings)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.server.bind,
            source,
        })?;

    tokio::select! {
        result = host::run(listener, HostState::new(toggle)) => {
            if let Err(e) = &result {
                error!(error = %e, "host endpoint server failed");
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
