//! The accepting endpoint and its multiplexed `get_client`.

use crate::addr;
use crate::error::{Error, Result};
use crate::mux::engine::{Engine, Ready};
use crate::net::client::Client;
use crate::net::{DEFAULT_RECV_TIMEOUT, Kind, Protocol, Termination, transfer};
use crate::socket;

use log::{info, warn};
use std::net::SocketAddr;
use std::time::Duration;

/// A server endpoint.
///
/// `start` binds every resolvable local address for the service and folds
/// the resulting sockets into one readiness set; [`Server::get_client`]
/// then blocks until some peer is ready and hands it back as a [`Client`].
///
/// One server runs one `get_client` loop on one thread; the type is not
/// meant to be shared across threads while a wait is in flight.
///
/// # Example
/// ```ignore
/// use iris::{Protocol, Server};
///
/// let mut server = Server::new(Protocol::Tcp);
/// server.start(None, "9999", 10)?;
/// loop {
///     let mut client = server.get_client()?;
///     let mut buf = [0u8; 100];
///     let n = server.receive_data(&mut buf, &client)?;
///     client.detach()?;
/// }
/// server.stop()?;
/// ```
pub struct Server {
    protocol: Protocol,
    engine: Option<Engine>,
    termination: Termination,
    recv_timeout: Duration,
}

impl Server {
    /// Creates a stopped server endpoint.
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            engine: None,
            termination: Termination::default(),
            recv_timeout: DEFAULT_RECV_TIMEOUT,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Switches the transport protocol of a stopped server.
    ///
    /// Ignored on a running server: the listening set already has a type.
    pub fn set_protocol(&mut self, protocol: Protocol) {
        if self.engine.is_some() {
            warn!("ignoring protocol change on a running server");
            return;
        }
        self.protocol = protocol;
    }

    pub fn kind(&self) -> Kind {
        Kind::Server
    }

    /// Chooses when a TCP receive stops short of a full buffer.
    pub fn set_termination(&mut self, termination: Termination) {
        self.termination = termination;
    }

    /// Sets how long a datagram receive waits before reporting no data.
    pub fn set_receive_timeout(&mut self, timeout: Duration) {
        self.recv_timeout = timeout;
    }

    /// Binds the service on every resolvable local address and starts
    /// watching the resulting sockets.
    ///
    /// `host = None` binds the wildcard address of every configured family.
    /// A candidate that cannot be bound is skipped; `start` succeeds as
    /// long as one listening socket comes up. `backlog` applies to TCP
    /// only and must be positive there.
    pub fn start(&mut self, host: Option<&str>, service: &str, backlog: i32) -> Result<()> {
        if self.engine.is_some() {
            return Err(Error::InvalidArgument("server is already started"));
        }
        if service.is_empty() {
            return Err(Error::InvalidArgument("service must not be empty"));
        }
        if self.protocol == Protocol::Tcp && backlog <= 0 {
            return Err(Error::InvalidArgument("backlog must be positive for TCP"));
        }

        let candidates = addr::resolve(host, service, self.protocol, true)?;
        let listeners = socket::build_listening(&candidates, self.protocol, backlog, service)?;
        let engine = Engine::new(self.protocol, listeners)?;
        info!("{:?} server listening on {:?}", self.protocol, engine.local_addrs());
        self.engine = Some(engine);
        Ok(())
    }

    /// Blocks until a peer is ready and returns a handle to it.
    ///
    /// For TCP, an accepted connection is delivered only once its first
    /// data arrives; the accept itself never satisfies this call. For UDP,
    /// the returned handle carries the datagram's source address and the
    /// payload stays queued for [`Server::receive_data`].
    ///
    /// After receiving from the peer, the caller is expected to detach the
    /// returned client.
    pub fn get_client(&mut self) -> Result<Client> {
        let engine = self
            .engine
            .as_mut()
            .ok_or(Error::InvalidArgument("server is not started"))?;
        let client = match engine.next_ready()? {
            Ready::Stream { socket, addr } => Client::delivered(Protocol::Tcp, Some(socket), addr),
            Ready::Datagram { addr } => Client::delivered(Protocol::Udp, None, addr),
        };
        Ok(client)
    }

    /// Stops the server, closing every descriptor it still owns exactly
    /// once. Stopping a stopped server is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        match self.engine.take() {
            Some(engine) => {
                let result = engine.shutdown();
                info!("{:?} server stopped", self.protocol);
                result
            }
            None => Ok(()),
        }
    }

    /// Local addresses actually bound, in candidate order.
    ///
    /// Useful with service `"0"`, where the kernel picks the ports. Empty
    /// while the server is stopped.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.engine.as_ref().map(Engine::local_addrs).unwrap_or_default()
    }

    /// Sends to a delivered client: over its own connection for TCP, or as
    /// datagrams from the listening socket for UDP.
    pub fn send_data(&self, data: &[u8], client: &Client) -> Result<usize> {
        let engine = self.running()?;
        match self.protocol {
            Protocol::Tcp => {
                let fd = client
                    .socket()
                    .ok_or(Error::InvalidArgument("client has no socket"))?;
                transfer::send_stream(fd, data)
            }
            Protocol::Udp => {
                let peer = client
                    .peer()
                    .ok_or(Error::InvalidArgument("client has no peer address"))?;
                transfer::send_datagrams(engine.first_listener(), data, peer)
            }
        }
    }

    /// Receives from a delivered client.
    ///
    /// UDP reads come off the listening socket the datagram is queued on;
    /// the handle itself holds no descriptor.
    pub fn receive_data(&self, data: &mut [u8], client: &Client) -> Result<usize> {
        let engine = self.running()?;
        match self.protocol {
            Protocol::Tcp => {
                let fd = client
                    .socket()
                    .ok_or(Error::InvalidArgument("client has no socket"))?;
                transfer::recv_stream(fd, data, self.termination)
            }
            Protocol::Udp => {
                transfer::recv_datagram(engine.first_listener(), data, self.recv_timeout)
            }
        }
    }

    fn running(&self) -> Result<&Engine> {
        self.engine
            .as_ref()
            .ok_or(Error::InvalidArgument("server is not started"))
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new(Protocol::Tcp)
    }
}
