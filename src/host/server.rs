//! Host Endpoint Server
//!
//! HTTP/1 endpoints the host calls to classify connections and recover the
//! original client address, plus a small status/toggle API.
//!
//! Usage:
//!   # Classify the leading bytes of a connection
//!   curl -X POST --data-binary @prefix.bin http://localhost:8088/proxy_protocol_sniff
//!
//!   # Strip the header and get forwarding headers back
//!   curl -X POST -H 'X-Connection-ID: 42' --data-binary @conn.bin \
//!     http://localhost:8088/proxy_protocol_handler
//!
//!   # Switch header handling on
//!   curl -X POST -H 'X-CSRF-Token: t' -d '{"enabled":true}' \
//!     http://localhost:8088/ui/api/toggle

use std::convert::Infallible;
use std::fmt;
use std::io;
use std::net::SocketAddr;

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::outcome::{sniff, ControlOutcome};
use crate::config::FeatureToggle;
use crate::proxy::{ingress_response_headers, strip_header, ProxyListener, X_CONNECTION_ID};

pub const SNIFF_PATH: &str = "/proxy_protocol_sniff";
pub const INGRESS_PATH: &str = "/proxy_protocol_handler";
pub const STATUS_PATH: &str = "/ui/api/status";
pub const TOGGLE_PATH: &str = "/ui/api/toggle";

const CSRF_HEADER: &str = "x-csrf-token";

/// State shared by every request
#[derive(Debug, Clone)]
pub struct HostState {
    pub toggle: FeatureToggle,
    pub version: &'static str,
}

impl HostState {
    pub fn new(toggle: FeatureToggle) -> Self {
        Self {
            toggle,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug)]
pub enum ServerError {
    Bind { addr: SocketAddr, source: io::Error },
    Io(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Bind { addr, source } => write!(f, "failed to bind {}: {}", addr, source),
            ServerError::Io(e) => write!(f, "server I/O error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind { source, .. } => Some(source),
            ServerError::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(e: io::Error) -> Self {
        ServerError::Io(e)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub enabled: bool,
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct ToggleRequest {
    enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub result: String,
    pub enabled: bool,
}

/// Serve the host endpoints on `listener` until the task is dropped.
///
/// Connections to the server itself go through the PROXY listener, so a
/// load balancer in front of it is logged with the real client address.
pub async fn run(listener: ProxyListener, state: HostState) -> Result<(), ServerError> {
    info!(bind_addr = %listener.local_addr(), "host endpoint server listening");

    listener
        .serve(move |stream| {
            let state = state.clone();
            async move {
                debug!(client = ?stream.peer_addr(), "host connection");
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| handle_request(req, state.clone()));
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!(error = %e, "host connection error");
                }
            }
        })
        .await?;
    Ok(())
}

/// Route one request.
pub async fn handle_request<B>(
    req: Request<B>,
    state: HostState,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: fmt::Display,
{
    let response = match (req.method(), req.uri().path()) {
        (&Method::POST, SNIFF_PATH) => handle_sniff(req, &state).await,
        (&Method::POST, INGRESS_PATH) => handle_ingress(req, &state).await,
        (&Method::GET, STATUS_PATH) => handle_status(&state),
        (&Method::POST, TOGGLE_PATH) => handle_toggle(req, &state).await,
        (_, SNIFF_PATH | INGRESS_PATH | STATUS_PATH | TOGGLE_PATH) => {
            text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
        }
        _ => text(StatusCode::NOT_FOUND, "Not Found"),
    };

    Ok(response)
}

async fn handle_sniff<B>(req: Request<B>, state: &HostState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: fmt::Display,
{
    let outcome = match req.into_body().collect().await {
        Ok(body) => sniff(&body.to_bytes(), &state.toggle),
        Err(e) => ControlOutcome::Error(format!("failed to read body: {}", e)),
    };
    if let ControlOutcome::Error(reason) = &outcome {
        warn!(reason = %reason, "sniff failed");
    }

    let status =
        StatusCode::from_u16(outcome.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    text(status, outcome.name())
}

async fn handle_ingress<B>(req: Request<B>, state: &HostState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: fmt::Display,
{
    if !state.toggle.is_enabled() {
        return text(
            StatusCode::SERVICE_UNAVAILABLE,
            "PROXY protocol handling is disabled",
        );
    }

    let Some(connection_id) = req.headers().get(X_CONNECTION_ID).cloned() else {
        return text(StatusCode::BAD_REQUEST, "missing X-Connection-ID header");
    };

    let data = match req.into_body().collect().await {
        Ok(body) => body.to_bytes(),
        Err(e) => {
            warn!(error = %e, "failed to read ingress body");
            return text(StatusCode::BAD_REQUEST, "failed to read body");
        }
    };

    match strip_header(&data) {
        Ok((info, remaining)) => {
            let payload = data.slice(data.len() - remaining.len()..);
            match &info {
                Some(info) => info!(
                    connection_id = ?connection_id,
                    header = %info,
                    payload_len = payload.len(),
                    "PROXY header recovered"
                ),
                None => debug!(connection_id = ?connection_id, "no PROXY header in ingress data"),
            }

            let mut response = Response::new(Full::new(payload));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
            response
                .headers_mut()
                .extend(ingress_response_headers(info.as_ref(), &connection_id));
            response
        }
        Err(e) => {
            warn!(connection_id = ?connection_id, data_len = data.len(), error = %e, "PROXY header rejected");
            text(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

fn handle_status(state: &HostState) -> Response<Full<Bytes>> {
    let enabled = state.toggle.is_enabled();
    json(
        StatusCode::OK,
        &StatusResponse {
            status: status_text(enabled).to_string(),
            enabled,
            version: state.version.to_string(),
        },
    )
}

fn status_text(enabled: bool) -> &'static str {
    if enabled {
        "Enabled"
    } else {
        "Disabled"
    }
}

async fn handle_toggle<B>(req: Request<B>, state: &HostState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: fmt::Display,
{
    let has_token = req
        .headers()
        .get(CSRF_HEADER)
        .is_some_and(|token| !token.is_empty());
    if !has_token {
        return text(StatusCode::FORBIDDEN, "missing CSRF token");
    }

    let body = match req.into_body().collect().await {
        Ok(body) => body.to_bytes(),
        Err(e) => {
            warn!(error = %e, "failed to read toggle body");
            return text(StatusCode::BAD_REQUEST, "failed to read body");
        }
    };
    let request: ToggleRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return text(StatusCode::BAD_REQUEST, &format!("invalid request: {}", e)),
    };

    let previous = state.toggle.set(request.enabled);
    info!(enabled = request.enabled, previous, "PROXY protocol handling toggled");

    json(
        StatusCode::OK,
        &ToggleResponse {
            result: "success".to_string(),
            enabled: request.enabled,
        },
    )
}

fn text(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    respond(status, "text/plain", Bytes::copy_from_slice(body.as_bytes()))
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => respond(status, "application/json", Bytes::from(body)),
        Err(e) => {
            error!(error = %e, "failed to encode JSON response");
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn respond(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
