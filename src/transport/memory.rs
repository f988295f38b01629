use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::Transport;

/// In-process datagram fabric. Endpoints register against it and exchange
/// payloads through channels; individual links can be cut and healed to
/// simulate unreachable locators and network partitions.
pub struct MemoryHub {
    endpoints: Mutex<HashMap<SocketAddr, mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>>>,
    cut_links: Mutex<HashSet<(SocketAddr, SocketAddr)>>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            endpoints: Mutex::new(HashMap::new()),
            cut_links: Mutex::new(HashSet::new()),
        })
    }

    /// Registers a new endpoint on the fabric.
    pub fn endpoint(self: &Arc<Self>, addr: SocketAddr) -> MemoryTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        self.endpoints.lock().unwrap().insert(addr, tx);
        MemoryTransport {
            addr,
            hub: Arc::clone(self),
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Silently drops traffic in both directions between `a` and `b`.
    pub fn cut(&self, a: SocketAddr, b: SocketAddr) {
        let mut cut = self.cut_links.lock().unwrap();
        cut.insert((a, b));
        cut.insert((b, a));
    }

    /// Restores a previously cut link.
    pub fn heal(&self, a: SocketAddr, b: SocketAddr) {
        let mut cut = self.cut_links.lock().unwrap();
        cut.remove(&(a, b));
        cut.remove(&(b, a));
    }

    /// Cuts every link between the two groups, both directions.
    pub fn partition(&self, left: &[SocketAddr], right: &[SocketAddr]) {
        for a in left {
            for b in right {
                self.cut(*a, *b);
            }
        }
    }

    fn deliver(&self, from: SocketAddr, to: SocketAddr, payload: Vec<u8>) {
        if self.cut_links.lock().unwrap().contains(&(from, to)) {
            return;
        }
        if let Some(tx) = self.endpoints.lock().unwrap().get(&to) {
            // A closed receiver behaves like a crashed process: the datagram
            // is lost, which is exactly UDP semantics.
            let _ = tx.send((payload, from));
        }
    }
}

/// One endpoint on a [`MemoryHub`].
pub struct MemoryTransport {
    addr: SocketAddr,
    hub: Arc<MemoryHub>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>>,
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn send(&self, target: SocketAddr, payload: &[u8]) -> Result<()> {
        self.hub.deliver(self.addr, target, payload.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)> {
        self.rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| anyhow!("memory transport closed"))
    }
}
