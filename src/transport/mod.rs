//! Datagram Transport Module
//!
//! The send/receive seam between the membership core and the network. The
//! protocol only needs addressed, best-effort datagrams; reliability where it
//! matters (view installation) comes from the monotonic view-identifier
//! guard, not from the transport.
//!
//! ## Implementations
//! - [`UdpTransport`]: the production transport, one UDP socket per member.
//! - [`MemoryHub`] / [`MemoryTransport`]: an in-process fabric with cuttable
//!   links, used by tests to simulate dead locators and network partitions.

pub mod memory;
pub mod udp;

use std::net::SocketAddr;

use anyhow::Result;
use async_trait::async_trait;

pub use memory::{MemoryHub, MemoryTransport};
pub use udp::UdpTransport;

/// Largest datagram the protocol ever sends. Views of realistic clusters fit
/// with ample headroom.
pub const MAX_DATAGRAM: usize = 64 * 1024;

/// Addressed, best-effort datagram delivery.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The local endpoint peers should reply to.
    fn local_addr(&self) -> SocketAddr;

    /// Sends one datagram. Loss is acceptable; the caller's protocol layer
    /// handles retries where they matter.
    async fn send(&self, target: SocketAddr, payload: &[u8]) -> Result<()>;

    /// Receives the next datagram and its source endpoint.
    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)>;
}
