use std::net::SocketAddr;

use anyhow::Result;
use async_trait::async_trait;
use tokio::net::UdpSocket;

use super::{Transport, MAX_DATAGRAM};

/// One UDP socket carrying all membership traffic for a member.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Binds the socket. Pass port 0 to let the OS pick one; `local_addr`
    /// reports the actual binding either way.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        Ok(Self { socket, local_addr })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn send(&self, target: SocketAddr, payload: &[u8]) -> Result<()> {
        self.socket.send_to(payload, target).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (len, src) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((buf, src))
    }
}
