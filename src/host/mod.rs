//! Host Boundary
//!
//! Exposes the PROXY core to a host process over HTTP: a classification
//! call answering captured/unhandled/error, and an ingress call that strips
//! the header from captured bytes and returns forwarding headers.

mod outcome;
mod server;

pub use outcome::{sniff, ControlOutcome};
pub use server::{
    handle_request, run, HostState, ServerError, StatusResponse, ToggleResponse, INGRESS_PATH,
    SNIFF_PATH, STATUS_PATH, TOGGLE_PATH,
};
