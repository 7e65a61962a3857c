//! Address resolution and owned socket addresses.
//!
//! Wraps `getaddrinfo` and converts its linked candidate list into an
//! owned vector, so unsuccessful candidates are dropped by filtering
//! instead of in-place node surgery on the list.

use crate::error::{Error, Result};
use crate::net::Protocol;

use libc::{
    AF_INET, AF_INET6, AI_ADDRCONFIG, AI_PASSIVE, SOCK_DGRAM, SOCK_STREAM, addrinfo, c_int,
    freeaddrinfo, gai_strerror, getaddrinfo, sockaddr, sockaddr_in, sockaddr_in6,
    sockaddr_storage, socklen_t,
};
use std::ffi::{CStr, CString};
use std::fmt;
use std::mem;
use std::net::{IpAddr, SocketAddr};
use std::ptr;

/// An owned socket address: raw `sockaddr_storage` bytes plus their length.
///
/// Big enough for any family the kernel hands back, and usable directly as
/// the out-parameter of `accept`, `recvfrom`, and `getsockname`.
#[derive(Clone, Copy)]
pub(crate) struct SockAddr {
    storage: sockaddr_storage,
    len: socklen_t,
}

impl SockAddr {
    /// An empty address sized to receive any family from the kernel.
    pub(crate) fn zeroed() -> Self {
        Self {
            storage: unsafe { mem::zeroed() },
            len: mem::size_of::<sockaddr_storage>() as socklen_t,
        }
    }

    /// Copies `len` bytes of address data out of a resolver node.
    ///
    /// # Safety
    /// `raw` must point to at least `len` readable bytes of address data.
    pub(crate) unsafe fn from_raw(raw: *const sockaddr, len: socklen_t) -> Self {
        let mut addr = Self::zeroed();
        let copied = (len as usize).min(mem::size_of::<sockaddr_storage>());
        unsafe {
            ptr::copy_nonoverlapping(raw as *const u8, &mut addr.storage as *mut _ as *mut u8, copied);
        }
        addr.len = copied as socklen_t;
        addr
    }

    pub(crate) fn as_ptr(&self) -> *const sockaddr {
        &self.storage as *const _ as *const sockaddr
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut sockaddr {
        &mut self.storage as *mut _ as *mut sockaddr
    }

    pub(crate) fn len(&self) -> socklen_t {
        self.len
    }

    pub(crate) fn len_mut(&mut self) -> &mut socklen_t {
        &mut self.len
    }

    /// Decodes into a standard address, for display and for callers.
    ///
    /// Returns `None` for families the crate does not speak.
    pub(crate) fn to_socket_addr(&self) -> Option<SocketAddr> {
        match self.storage.ss_family as c_int {
            AF_INET => {
                let sin = unsafe { ptr::read(&self.storage as *const _ as *const sockaddr_in) };
                let ip = IpAddr::from(sin.sin_addr.s_addr.to_ne_bytes());
                Some(SocketAddr::new(ip, u16::from_be(sin.sin_port)))
            }
            AF_INET6 => {
                let sin6 = unsafe { ptr::read(&self.storage as *const _ as *const sockaddr_in6) };
                let ip = IpAddr::from(sin6.sin6_addr.s6_addr);
                Some(SocketAddr::new(ip, u16::from_be(sin6.sin6_port)))
            }
            _ => None,
        }
    }
}

impl From<SocketAddr> for SockAddr {
    fn from(addr: SocketAddr) -> Self {
        let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
        let len = match addr {
            SocketAddr::V4(v4) => {
                let sin = sockaddr_in {
                    sin_family: AF_INET as libc::sa_family_t,
                    sin_port: v4.port().to_be(),
                    sin_addr: libc::in_addr {
                        s_addr: u32::from_ne_bytes(v4.ip().octets()),
                    },
                    sin_zero: [0; 8],
                };
                unsafe { ptr::write(&mut storage as *mut _ as *mut sockaddr_in, sin) };
                mem::size_of::<sockaddr_in>()
            }
            SocketAddr::V6(v6) => {
                let sin6 = sockaddr_in6 {
                    sin6_family: AF_INET6 as libc::sa_family_t,
                    sin6_port: v6.port().to_be(),
                    sin6_flowinfo: v6.flowinfo(),
                    sin6_addr: libc::in6_addr {
                        s6_addr: v6.ip().octets(),
                    },
                    sin6_scope_id: v6.scope_id(),
                };
                unsafe { ptr::write(&mut storage as *mut _ as *mut sockaddr_in6, sin6) };
                mem::size_of::<sockaddr_in6>()
            }
        };
        Self {
            storage,
            len: len as socklen_t,
        }
    }
}

impl fmt::Debug for SockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_socket_addr() {
            Some(addr) => write!(f, "{addr}"),
            None => write!(f, "<family {}>", self.storage.ss_family),
        }
    }
}

/// One resolved candidate: everything `socket(2)` plus `bind(2)` or
/// `connect(2)` need to try it.
pub(crate) struct Candidate {
    pub(crate) family: c_int,
    pub(crate) socktype: c_int,
    pub(crate) protocol: c_int,
    pub(crate) addr: SockAddr,
}

/// Resolves a host/service pair into candidate addresses.
///
/// Both IPv4 and IPv6 candidates are requested where the host environment
/// is configured for them. `host = None` with `passive = true` asks for
/// the wildcard bind addresses; a client must always name its host.
///
/// This performs no I/O beyond name resolution: candidates come back in
/// resolver order and the callers decide which of them work.
pub(crate) fn resolve(
    host: Option<&str>,
    service: &str,
    protocol: Protocol,
    passive: bool,
) -> Result<Vec<Candidate>> {
    if host.is_none() && !passive {
        return Err(Error::InvalidArgument("host is required for a client endpoint"));
    }

    let c_host = match host {
        Some(h) => {
            Some(CString::new(h).map_err(|_| Error::InvalidArgument("host contains a NUL byte"))?)
        }
        None => None,
    };
    let c_service =
        CString::new(service).map_err(|_| Error::InvalidArgument("service contains a NUL byte"))?;

    let mut hints: addrinfo = unsafe { mem::zeroed() };
    hints.ai_family = libc::AF_UNSPEC;
    hints.ai_socktype = match protocol {
        Protocol::Tcp => SOCK_STREAM,
        Protocol::Udp => SOCK_DGRAM,
    };
    if passive {
        // Wildcard bind addresses for every configured family.
        hints.ai_flags = AI_PASSIVE | AI_ADDRCONFIG;
    }

    let mut list: *mut addrinfo = ptr::null_mut();
    let status = unsafe {
        getaddrinfo(
            c_host.as_ref().map_or(ptr::null(), |h| h.as_ptr()),
            c_service.as_ptr(),
            &hints,
            &mut list,
        )
    };
    if status != 0 {
        return Err(resolution_error(host, service, gai_detail(status)));
    }

    let mut candidates = Vec::new();
    let mut node = list;
    while !node.is_null() {
        let info = unsafe { &*node };
        if !info.ai_addr.is_null() {
            candidates.push(Candidate {
                family: info.ai_family,
                socktype: info.ai_socktype,
                protocol: info.ai_protocol,
                addr: unsafe { SockAddr::from_raw(info.ai_addr, info.ai_addrlen) },
            });
        }
        node = info.ai_next;
    }
    unsafe { freeaddrinfo(list) };

    if candidates.is_empty() {
        return Err(resolution_error(host, service, "no usable candidate".into()));
    }
    Ok(candidates)
}

fn resolution_error(host: Option<&str>, service: &str, detail: String) -> Error {
    Error::Resolution {
        host: host.unwrap_or("*").to_string(),
        service: service.to_string(),
        detail,
    }
}

fn gai_detail(status: c_int) -> String {
    unsafe { CStr::from_ptr(gai_strerror(status)) }
        .to_string_lossy()
        .into_owned()
}
