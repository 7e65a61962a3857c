//! Level-triggered epoll wrapper.

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLLIN, epoll_create1, epoll_ctl, epoll_event,
    epoll_wait,
};
use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::ptr;

/// Upper bound on events handled per wait, bounding per-iteration latency.
pub(crate) const MAX_EVENTS_PER_WAIT: usize = 1000;

/// An owned epoll instance.
///
/// Registrations are read-interest only and level-triggered: a socket with
/// unread data stays ready on the next wait.
pub(crate) struct Epoll {
    epfd: RawFd,
}

impl Epoll {
    pub(crate) fn create() -> io::Result<Self> {
        let epfd = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epfd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { epfd })
    }

    /// Registers a descriptor for read readiness under the given token.
    ///
    /// The token is returned verbatim with every event for this descriptor
    /// and must stay meaningful for the lifetime of the registration.
    pub(crate) fn register(&self, fd: RawFd, token: u64) -> io::Result<()> {
        let mut event = epoll_event {
            events: EPOLLIN as u32,
            u64: token,
        };
        if unsafe { epoll_ctl(self.epfd, EPOLL_CTL_ADD, fd, &mut event) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Removes a descriptor from the set. Best-effort: a descriptor that is
    /// already gone is nothing the caller can act on.
    pub(crate) fn deregister(&self, fd: RawFd) {
        unsafe {
            epoll_ctl(self.epfd, EPOLL_CTL_DEL, fd, ptr::null_mut());
        }
    }

    /// Blocks until at least one registered descriptor is ready.
    ///
    /// Interruption by a signal is retried transparently; any other failure
    /// is returned. Fills `events` and returns the number of ready entries.
    pub(crate) fn wait(&self, events: &mut [epoll_event]) -> io::Result<usize> {
        loop {
            let ready =
                unsafe { epoll_wait(self.epfd, events.as_mut_ptr(), events.len() as i32, -1) };
            if ready >= 0 {
                return Ok(ready as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// Closes the epoll descriptor, surfacing the failure.
    pub(crate) fn close(self) -> io::Result<()> {
        let epfd = self.epfd;
        mem::forget(self);
        if unsafe { libc::close(epfd) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epfd);
        }
    }
}
