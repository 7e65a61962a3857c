//! Endpoint types shared by the client and server surfaces.
//!
//! - [`client`]: the initiating endpoint, and the handle a server gets back
//!   for each delivered peer
//! - [`server`]: the accepting endpoint and its multiplexed `get_client`
//! - [`transfer`]: the blocking send/receive path both sides share

pub mod client;
pub mod server;
pub(crate) mod transfer;

use std::time::Duration;

/// Transport protocol of an endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Protocol {
    /// Stream sockets with an accept phase.
    #[default]
    Tcp,
    /// Datagram sockets; peers are discovered per datagram.
    Udp,
}

/// Role of an endpoint in an exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Client,
    Server,
}

/// When a blocking TCP receive stops short of a full buffer.
///
/// `UntilNul` reproduces the text-protocol convention of treating a NUL
/// byte as end-of-message. It is opt-in: it corrupts reads of any binary
/// payload that happens to contain a zero byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Termination {
    /// Read until the buffer is full or the peer closes.
    #[default]
    UntilFull,
    /// Additionally stop once a NUL byte has been received.
    UntilNul,
}

/// Largest payload sent in one datagram; bigger buffers are fragmented.
pub const UDP_PAYLOAD_MAX: usize = 1400;

/// How long a datagram receive waits for data before reporting none.
pub(crate) const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(5);
