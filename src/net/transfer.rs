//! Blocking data transfer over one connected or bound socket.
//!
//! TCP transfers loop until the full buffer is handled; UDP transfers work
//! in [`UDP_PAYLOAD_MAX`]-sized datagrams with no sequencing or
//! acknowledgement of their own.

use crate::addr::SockAddr;
use crate::error::{Error, Result};
use crate::net::{Termination, UDP_PAYLOAD_MAX};

use libc::{POLLIN, poll, pollfd, recv, recvfrom, send, sendto};
use std::io;
use std::os::unix::io::RawFd;
use std::ptr;
use std::time::Duration;

/// Sends the whole buffer over a stream socket.
///
/// Partial sends are retried until everything is out; a short send is never
/// reported as success.
pub(crate) fn send_stream(fd: RawFd, data: &[u8]) -> Result<usize> {
    let mut total = 0;
    while total < data.len() {
        let sent = unsafe { send(fd, data[total..].as_ptr() as *const _, data.len() - total, 0) };
        if sent < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        if sent == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                "send returned zero bytes",
            )));
        }
        total += sent as usize;
    }
    Ok(total)
}

/// Sends the buffer as a train of datagrams no larger than
/// [`UDP_PAYLOAD_MAX`].
///
/// The receiver is responsible for reassembly; nothing here sequences or
/// acknowledges the fragments.
pub(crate) fn send_datagrams(fd: RawFd, data: &[u8], peer: &SockAddr) -> Result<usize> {
    if data.is_empty() {
        // An empty buffer still transmits one observable empty datagram.
        return send_one_datagram(fd, data, peer);
    }
    let mut total = 0;
    for chunk in data.chunks(UDP_PAYLOAD_MAX) {
        total += send_one_datagram(fd, chunk, peer)?;
    }
    Ok(total)
}

fn send_one_datagram(fd: RawFd, chunk: &[u8], peer: &SockAddr) -> Result<usize> {
    let sent = unsafe {
        sendto(
            fd,
            chunk.as_ptr() as *const _,
            chunk.len(),
            0,
            peer.as_ptr(),
            peer.len(),
        )
    };
    if sent < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }
    Ok(sent as usize)
}

/// Fills the buffer from a stream socket.
///
/// Stops early when the peer closes, or, under [`Termination::UntilNul`],
/// once a NUL byte shows up in the received bytes. Returns the byte count
/// actually received.
pub(crate) fn recv_stream(fd: RawFd, data: &mut [u8], termination: Termination) -> Result<usize> {
    let mut total = 0;
    while total < data.len() {
        let got = unsafe { recv(fd, data[total..].as_mut_ptr() as *mut _, data.len() - total, 0) };
        if got < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        if got == 0 {
            break;
        }
        let chunk = &data[total..total + got as usize];
        let saw_nul = chunk.contains(&0);
        total += got as usize;
        if termination == Termination::UntilNul && saw_nul {
            break;
        }
    }
    Ok(total)
}

/// Receives one datagram, waiting up to `timeout` for it to arrive.
///
/// A timeout with nothing queued is not an error: the receive reports zero
/// bytes and the caller decides whether to retry.
pub(crate) fn recv_datagram(fd: RawFd, data: &mut [u8], timeout: Duration) -> Result<usize> {
    if !wait_readable(fd, timeout).map_err(Error::Io)? {
        return Ok(0);
    }
    let got = unsafe {
        recvfrom(
            fd,
            data.as_mut_ptr() as *mut _,
            data.len(),
            0,
            ptr::null_mut(),
            ptr::null_mut(),
        )
    };
    if got < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }
    Ok(got as usize)
}

/// Polls one descriptor for read readiness.
fn wait_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut fds = pollfd {
        fd,
        events: POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
    loop {
        let ready = unsafe { poll(&mut fds, 1, timeout_ms) };
        if ready > 0 {
            return Ok(true);
        }
        if ready == 0 {
            return Ok(false);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}
