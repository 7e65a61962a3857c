//! The initiating endpoint.

use crate::addr::{self, SockAddr};
use crate::error::{Error, Result};
use crate::net::{DEFAULT_RECV_TIMEOUT, Kind, Protocol, Termination, transfer};
use crate::socket::{self, Socket};

use log::warn;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// A client endpoint, or a server-side handle to one delivered peer.
///
/// A user-constructed client reaches a server through [`Client::attach`].
/// `Server::get_client` produces the server-side flavor: for TCP it owns
/// the accepted descriptor; for UDP it carries only the peer's address and
/// traffic keeps flowing through the server's listening socket.
///
/// # Example
/// ```ignore
/// use iris::{Client, Protocol};
///
/// let mut client = Client::new(Protocol::Tcp);
/// client.attach("localhost", "9999")?;
/// client.send_data(b"hello")?;
/// client.detach()?;
/// ```
#[derive(Debug)]
pub struct Client {
    protocol: Protocol,
    socket: Option<Socket>,
    peer: Option<SockAddr>,
    termination: Termination,
    recv_timeout: Duration,
}

impl Client {
    /// Creates a detached client endpoint.
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            socket: None,
            peer: None,
            termination: Termination::default(),
            recv_timeout: DEFAULT_RECV_TIMEOUT,
        }
    }

    /// Builds the handle `Server::get_client` delivers.
    ///
    /// Taking ownership of the descriptor and the captured peer address
    /// here is the single transfer point out of the engine.
    pub(crate) fn delivered(protocol: Protocol, socket: Option<Socket>, peer: SockAddr) -> Self {
        Self {
            protocol,
            socket,
            peer: Some(peer),
            termination: Termination::default(),
            recv_timeout: DEFAULT_RECV_TIMEOUT,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Switches the transport protocol of a detached client.
    ///
    /// Ignored on an attached client: the live socket already has a type.
    pub fn set_protocol(&mut self, protocol: Protocol) {
        if self.socket.is_some() {
            warn!("ignoring protocol change on an attached client");
            return;
        }
        self.protocol = protocol;
    }

    pub fn kind(&self) -> Kind {
        Kind::Client
    }

    /// Chooses when a TCP receive stops short of a full buffer.
    pub fn set_termination(&mut self, termination: Termination) {
        self.termination = termination;
    }

    /// Sets how long a datagram receive waits before reporting no data.
    pub fn set_receive_timeout(&mut self, timeout: Duration) {
        self.recv_timeout = timeout;
    }

    /// Connects to `host`/`service`.
    ///
    /// Candidates are tried in resolver order across IPv4 and IPv6; the
    /// first that yields a working socket (and, for TCP, a successful
    /// connect) wins. A UDP attach creates the socket and remembers the
    /// chosen address for later datagrams; no handshake takes place.
    pub fn attach(&mut self, host: &str, service: &str) -> Result<()> {
        if host.is_empty() {
            return Err(Error::InvalidArgument("host must not be empty"));
        }
        if service.is_empty() {
            return Err(Error::InvalidArgument("service must not be empty"));
        }

        let candidates = addr::resolve(Some(host), service, self.protocol, false)?;
        let (socket, peer) = socket::connect_first(&candidates, self.protocol, host, service)?;

        // Replacing an earlier attachment closes its socket.
        self.socket = Some(socket);
        self.peer = Some(peer);
        Ok(())
    }

    /// Closes the connection and forgets the peer.
    ///
    /// Detaching an already-detached client is a no-op; the descriptor is
    /// never closed twice.
    pub fn detach(&mut self) -> Result<()> {
        self.peer = None;
        match self.socket.take() {
            Some(socket) => socket.close().map_err(Error::Io),
            None => Ok(()),
        }
    }

    /// The underlying descriptor, if this handle owns one.
    pub fn socket(&self) -> Option<RawFd> {
        self.socket.as_ref().map(Socket::raw)
    }

    /// Adopts `fd` as this client's descriptor; it will be closed on detach
    /// or drop. A previously held descriptor is closed first.
    pub fn set_socket(&mut self, fd: RawFd) {
        self.socket = Some(Socket::from_raw(fd));
    }

    /// The peer this client exchanges data with.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer.as_ref().and_then(SockAddr::to_socket_addr)
    }

    /// Overrides the remembered peer address.
    pub fn set_peer_addr(&mut self, addr: SocketAddr) {
        self.peer = Some(SockAddr::from(addr));
    }

    pub(crate) fn peer(&self) -> Option<&SockAddr> {
        self.peer.as_ref()
    }

    /// Sends the buffer to the attached server.
    ///
    /// TCP retries partial sends until the whole buffer is out; UDP
    /// fragments it into datagrams of at most
    /// [`UDP_PAYLOAD_MAX`](crate::UDP_PAYLOAD_MAX) bytes.
    pub fn send_data(&self, data: &[u8]) -> Result<usize> {
        let fd = self.socket_fd()?;
        match self.protocol {
            Protocol::Tcp => transfer::send_stream(fd, data),
            Protocol::Udp => {
                let peer = self
                    .peer
                    .as_ref()
                    .ok_or(Error::InvalidArgument("client has no peer address"))?;
                transfer::send_datagrams(fd, data, peer)
            }
        }
    }

    /// Receives into the buffer from the attached server.
    pub fn receive_data(&self, data: &mut [u8]) -> Result<usize> {
        let fd = self.socket_fd()?;
        match self.protocol {
            Protocol::Tcp => transfer::recv_stream(fd, data, self.termination),
            Protocol::Udp => transfer::recv_datagram(fd, data, self.recv_timeout),
        }
    }

    fn socket_fd(&self) -> Result<RawFd> {
        self.socket
            .as_ref()
            .map(Socket::raw)
            .ok_or(Error::InvalidArgument("client is not attached"))
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(Protocol::Tcp)
    }
}
