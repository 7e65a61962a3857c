//! A small and scalable networking runtime for Linux.
//!
//! This crate provides unified client/server endpoints over TCP and UDP,
//! IPv4 and IPv6, with multiplexed connection acceptance on the server
//! side: every bound socket joins one epoll set, and `Server::get_client`
//! turns readiness events into delivered peers.
//!
//! # Architecture
//!
//! - **addr**: name resolution into owned candidate addresses
//! - **socket**: owned descriptors and the bind/connect candidate loops
//! - **mux**: the readiness set and the accept/dispatch engine
//! - **net**: the public [`Client`]/[`Server`] endpoints and the blocking
//!   transfer path they share
//!
//! # Example
//!
//! ```ignore
//! use iris::{Protocol, Server};
//!
//! let mut server = Server::new(Protocol::Tcp);
//! server.start(None, "9999", 10)?;
//! loop {
//!     let mut client = server.get_client()?;
//!     let mut buf = [0u8; 100];
//!     let n = server.receive_data(&mut buf, &client)?;
//!     client.detach()?;
//! }
//! server.stop()?;
//! ```

mod addr;
mod error;
mod mux;
mod net;
mod socket;
mod util;

pub use error::{Error, Result};
pub use net::client::Client;
pub use net::server::Server;
pub use net::{Kind, Protocol, Termination, UDP_PAYLOAD_MAX};
