//! Owned socket descriptors and the bind/connect candidate loops.
//!
//! A [`Socket`] closes its descriptor exactly once: explicitly through
//! [`Socket::close`] when the caller wants to see the failure, or on drop.

use crate::addr::{Candidate, SockAddr};
use crate::error::{Error, Result};
use crate::net::Protocol;

use libc::{MSG_PEEK, accept, bind, close, connect, getsockname, listen, recvfrom, socket};
use log::debug;
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;

/// An owned socket descriptor.
#[derive(Debug)]
pub(crate) struct Socket {
    fd: RawFd,
}

impl Socket {
    /// Creates a socket matching one resolved candidate.
    pub(crate) fn open(candidate: &Candidate) -> io::Result<Self> {
        let fd = unsafe { socket(candidate.family, candidate.socktype, candidate.protocol) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd })
    }

    /// Adopts an already-open descriptor; it will be closed with this handle.
    pub(crate) fn from_raw(fd: RawFd) -> Self {
        Self { fd }
    }

    pub(crate) fn raw(&self) -> RawFd {
        self.fd
    }

    pub(crate) fn bind(&self, addr: &SockAddr) -> io::Result<()> {
        if unsafe { bind(self.fd, addr.as_ptr(), addr.len()) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub(crate) fn listen(&self, backlog: i32) -> io::Result<()> {
        if unsafe { listen(self.fd, backlog) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub(crate) fn connect(&self, addr: &SockAddr) -> io::Result<()> {
        if unsafe { connect(self.fd, addr.as_ptr(), addr.len()) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Accepts one pending connection, capturing the peer address.
    pub(crate) fn accept(&self) -> io::Result<(Socket, SockAddr)> {
        let mut addr = SockAddr::zeroed();
        let fd = unsafe { accept(self.fd, addr.as_mut_ptr(), addr.len_mut()) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok((Socket { fd }, addr))
    }

    /// Captures the source of the next pending datagram without consuming
    /// it; the payload stays queued for a normal receive.
    pub(crate) fn peek_from(&self) -> io::Result<SockAddr> {
        let mut probe = [0u8; 1];
        let mut addr = SockAddr::zeroed();
        let got = unsafe {
            recvfrom(
                self.fd,
                probe.as_mut_ptr() as *mut _,
                probe.len(),
                MSG_PEEK,
                addr.as_mut_ptr(),
                addr.len_mut(),
            )
        };
        if got < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(addr)
    }

    /// Returns the local address this socket is bound to.
    pub(crate) fn local_addr(&self) -> io::Result<SocketAddr> {
        let mut addr = SockAddr::zeroed();
        if unsafe { getsockname(self.fd, addr.as_mut_ptr(), addr.len_mut()) } < 0 {
            return Err(io::Error::last_os_error());
        }
        addr.to_socket_addr()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unsupported address family"))
    }

    /// Closes the descriptor, surfacing the failure instead of swallowing it.
    pub(crate) fn close(self) -> io::Result<()> {
        let fd = self.fd;
        mem::forget(self);
        if unsafe { close(fd) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        unsafe {
            close(self.fd);
        }
    }
}

/// Builds the server's listening set from resolved candidates.
///
/// Candidates are tried in resolver order; one that fails at any step is
/// closed and skipped, so a multi-homed host with one dead family still
/// comes up. Fails only when every candidate was discarded.
pub(crate) fn build_listening(
    candidates: &[Candidate],
    protocol: Protocol,
    backlog: i32,
    service: &str,
) -> Result<Vec<Socket>> {
    let mut sockets = Vec::new();
    for candidate in candidates {
        let socket = match Socket::open(candidate) {
            Ok(socket) => socket,
            Err(err) => {
                debug!("skipping candidate {:?}: socket: {}", candidate.addr, err);
                continue;
            }
        };
        if let Err(err) = socket.bind(&candidate.addr) {
            debug!("skipping candidate {:?}: bind: {}", candidate.addr, err);
            continue;
        }
        if protocol == Protocol::Tcp {
            if let Err(err) = socket.listen(backlog) {
                debug!("skipping candidate {:?}: listen: {}", candidate.addr, err);
                continue;
            }
        }
        sockets.push(socket);
    }
    if sockets.is_empty() {
        return Err(Error::Bind {
            service: service.to_string(),
        });
    }
    Ok(sockets)
}

/// Connects the client side: the first candidate that fully succeeds wins.
///
/// A candidate that opens a socket but fails to connect is closed before
/// the next one is tried; no descriptor outlives its failed candidate.
pub(crate) fn connect_first(
    candidates: &[Candidate],
    protocol: Protocol,
    host: &str,
    service: &str,
) -> Result<(Socket, SockAddr)> {
    for candidate in candidates {
        let socket = match Socket::open(candidate) {
            Ok(socket) => socket,
            Err(err) => {
                debug!("skipping candidate {:?}: socket: {}", candidate.addr, err);
                continue;
            }
        };
        if protocol == Protocol::Tcp {
            if let Err(err) = socket.connect(&candidate.addr) {
                debug!("skipping candidate {:?}: connect: {}", candidate.addr, err);
                continue;
            }
        }
        return Ok((socket, candidate.addr));
    }
    Err(Error::Connect {
        host: host.to_string(),
        service: service.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn tcp_candidate(addr: SocketAddr) -> Candidate {
        Candidate {
            family: libc::AF_INET,
            socktype: libc::SOCK_STREAM,
            protocol: 0,
            addr: SockAddr::from(addr),
        }
    }

    #[test]
    fn listening_set_survives_one_dead_candidate() {
        let occupied = TcpListener::bind("127.0.0.1:0").expect("bind occupied port");
        let taken = occupied.local_addr().expect("local addr");

        let candidates = [
            tcp_candidate(taken), // collides with the std listener
            tcp_candidate("127.0.0.1:0".parse().unwrap()),
        ];
        let set = build_listening(&candidates, Protocol::Tcp, 8, "0").expect("partial success");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn listening_set_fails_when_every_candidate_dies() {
        let occupied = TcpListener::bind("127.0.0.1:0").expect("bind occupied port");
        let taken = occupied.local_addr().expect("local addr");

        let err = build_listening(&[tcp_candidate(taken)], Protocol::Tcp, 8, "9").unwrap_err();
        assert!(matches!(err, Error::Bind { .. }));
    }
}
