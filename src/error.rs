//! Unified error types for the iris crate.
//!
//! Every operation maps the underlying OS error into one of these variants
//! at the point of the failing call; nothing is classified later from
//! ambient `errno` state.

use std::io;

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by endpoint operations.
///
/// Failures of a single candidate address (one family or one interface)
/// never surface here; the candidate loops swallow them and report only
/// when every candidate has been exhausted.
#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was absent or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Name or service lookup produced no candidate address.
    #[error("cannot resolve {host}:{service}: {detail}")]
    Resolution {
        host: String,
        service: String,
        detail: String,
    },

    /// No candidate address could be bound for a server endpoint.
    #[error("no address could be bound for service {service}")]
    Bind { service: String },

    /// No candidate address could be connected for a client endpoint.
    #[error("cannot connect to {host}:{service}")]
    Connect { host: String, service: String },

    /// Adding a descriptor to the readiness set failed.
    #[error("readiness registration failed")]
    Registration(#[source] io::Error),

    /// The readiness wait failed for a reason other than a signal.
    #[error("readiness wait failed")]
    Wait(#[source] io::Error),

    /// The kernel ran out of memory or buffers while tracking a peer.
    #[error("out of memory while tracking peer state")]
    OutOfMemory,

    /// A send, receive, or close on an established socket failed.
    #[error("i/o error")]
    Io(#[from] io::Error),
}
