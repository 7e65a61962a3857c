//! The accept/dispatch engine behind `Server::get_client`.
//!
//! Owns the listening sockets, the readiness set, and an arena of accepted
//! connections parked between their accept and their first data. Every
//! descriptor the engine manages is either registered with the set or
//! closed, never both, and a parked connection's peer address moves into
//! the delivered handle in one step.

use crate::addr::SockAddr;
use crate::error::{Error, Result};
use crate::mux::Tag;
use crate::mux::epoll::{Epoll, MAX_EVENTS_PER_WAIT};
use crate::net::Protocol;
use crate::socket::Socket;
use crate::util::slab::Slab;

use libc::{ENOBUFS, ENOMEM, epoll_event};
use log::{debug, warn};
use std::io;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;

/// An accepted connection parked until its first data arrives.
struct Registration {
    socket: Socket,
    addr: SockAddr,
}

/// A peer the engine judged ready for the caller.
pub(crate) enum Ready {
    /// An accepted TCP connection with data pending.
    Stream { socket: Socket, addr: SockAddr },
    /// The source of a pending datagram; the payload stays queued on the
    /// listening socket.
    Datagram { addr: SockAddr },
}

pub(crate) struct Engine {
    protocol: Protocol,
    listeners: Vec<Socket>,
    epoll: Epoll,
    peers: Slab<Registration>,
    events: Vec<epoll_event>,
}

impl Engine {
    /// Builds the engine around an already-bound listening set.
    ///
    /// Every listener is registered under its index. A listener that cannot
    /// be watched is skipped, as long as at least one makes it into the set.
    pub(crate) fn new(protocol: Protocol, listeners: Vec<Socket>) -> Result<Self> {
        let epoll = Epoll::create().map_err(Error::Registration)?;

        let mut registered = 0usize;
        let mut last_failure = None;
        for (index, listener) in listeners.iter().enumerate() {
            match epoll.register(listener.raw(), Tag::Listener(index).encode()) {
                Ok(()) => registered += 1,
                Err(err) => {
                    warn!("cannot watch listener {index}: {err}");
                    last_failure = Some(err);
                }
            }
        }
        if registered == 0 {
            let err = last_failure.unwrap_or_else(|| io::Error::other("empty listening set"));
            return Err(Error::Registration(err));
        }

        Ok(Self {
            protocol,
            listeners,
            epoll,
            peers: Slab::new(),
            events: vec![epoll_event { events: 0, u64: 0 }; MAX_EVENTS_PER_WAIT],
        })
    }

    /// Waits until a peer is deliverable and returns it.
    ///
    /// TCP readiness on a listening socket only arms a future delivery: the
    /// connection is accepted, its peer address captured, and the new
    /// descriptor parked in the readiness set until its first data arrives.
    /// UDP readiness resolves immediately through a non-consuming peek.
    /// Per-event failures are skipped; only a failed wait or exhausted
    /// kernel memory abort the loop.
    pub(crate) fn next_ready(&mut self) -> Result<Ready> {
        loop {
            let ready = self.epoll.wait(&mut self.events).map_err(Error::Wait)?;
            for i in 0..ready {
                let event = self.events[i];
                match Tag::decode(event.u64) {
                    Tag::Listener(index) => match self.protocol {
                        Protocol::Tcp => self.accept_pending(index)?,
                        Protocol::Udp => {
                            if let Some(addr) = self.probe_datagram(index)? {
                                return Ok(Ready::Datagram { addr });
                            }
                        }
                    },
                    Tag::Peer(id) => {
                        // First data on a parked connection: hand it over.
                        let Some(registration) = self.peers.remove(id) else {
                            continue;
                        };
                        self.epoll.deregister(registration.socket.raw());
                        return Ok(Ready::Stream {
                            socket: registration.socket,
                            addr: registration.addr,
                        });
                    }
                }
            }
        }
    }

    /// Accepts one connection off a ready listener and parks it.
    fn accept_pending(&mut self, index: usize) -> Result<()> {
        let Some(listener) = self.listeners.get(index) else {
            return Ok(());
        };
        let (socket, addr) = match listener.accept() {
            Ok(pair) => pair,
            Err(err) if is_out_of_memory(&err) => return Err(Error::OutOfMemory),
            Err(err) => {
                debug!("accept failed on listener {index}: {err}");
                return Ok(());
            }
        };

        let fd = socket.raw();
        let id = self.peers.insert(Registration { socket, addr });
        if let Err(err) = self.epoll.register(fd, Tag::Peer(id).encode()) {
            // Cannot watch it, cannot deliver it: drop the connection.
            warn!("cannot watch accepted connection: {err}");
            self.peers.remove(id);
        }
        Ok(())
    }

    /// Captures the source of a pending datagram without consuming it.
    fn probe_datagram(&self, index: usize) -> Result<Option<SockAddr>> {
        let Some(listener) = self.listeners.get(index) else {
            return Ok(None);
        };
        match listener.peek_from() {
            Ok(addr) => Ok(Some(addr)),
            Err(err) if is_out_of_memory(&err) => Err(Error::OutOfMemory),
            Err(err) => {
                debug!("datagram probe failed on listener {index}: {err}");
                Ok(None)
            }
        }
    }

    /// The descriptor the server's own datagram traffic goes through.
    pub(crate) fn first_listener(&self) -> RawFd {
        self.listeners[0].raw()
    }

    /// Local addresses of the listening set, in candidate order.
    pub(crate) fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|listener| listener.local_addr().ok())
            .collect()
    }

    /// Tears the engine down.
    ///
    /// Every parked connection and every listener is deregistered and closed
    /// exactly once, the readiness set last. The first close failure is
    /// reported after teardown finishes.
    pub(crate) fn shutdown(self) -> Result<()> {
        let Engine {
            mut listeners,
            epoll,
            mut peers,
            ..
        } = self;

        let mut first_failure: Option<io::Error> = None;
        for registration in peers.drain() {
            epoll.deregister(registration.socket.raw());
            if let Err(err) = registration.socket.close() {
                first_failure.get_or_insert(err);
            }
        }
        for listener in listeners.drain(..) {
            epoll.deregister(listener.raw());
            if let Err(err) = listener.close() {
                first_failure.get_or_insert(err);
            }
        }
        if let Err(err) = epoll.close() {
            first_failure.get_or_insert(err);
        }

        match first_failure {
            Some(err) => Err(Error::Io(err)),
            None => Ok(()),
        }
    }
}

fn is_out_of_memory(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(ENOMEM | ENOBUFS))
}
