//! In-process transport over tokio channels.
//!
//! Wires any number of transports together through a shared [`MemoryHub`],
//! implementing the full [`Transport`] contract (reply correlation,
//! expected-reply collection, fire-and-forget broadcast) without sockets.
//! Used by the engine integration tests; delivery is reliable and ordered
//! per sender, which real transports do not promise.

use crate::transport::{InboundHandler, Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use quorumcast_messages::Message;
use quorumcast_types::Peer;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Shared registry connecting [`MemoryTransport`]s by address.
pub struct MemoryHub {
    inboxes: Mutex<HashMap<SocketAddr, mpsc::UnboundedSender<Message>>>,
}

impl MemoryHub {
    /// Create an empty hub.
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryHub {
            inboxes: Mutex::new(HashMap::new()),
        })
    }

    fn register(&self, address: SocketAddr, inbox: mpsc::UnboundedSender<Message>) {
        self.inboxes.lock().insert(address, inbox);
    }

    fn unregister(&self, address: SocketAddr) {
        self.inboxes.lock().remove(&address);
    }

    fn deliver(&self, address: SocketAddr, message: Message) -> bool {
        match self.inboxes.lock().get(&address) {
            Some(inbox) => inbox.send(message).is_ok(),
            None => false,
        }
    }
}

/// Correlation identities are `"{requester address}#{sequence}"`, so a reply
/// can be routed from the identity alone.
fn identity_address(identity: &[u8]) -> Option<SocketAddr> {
    let text = std::str::from_utf8(identity).ok()?;
    let (address, _seq) = text.rsplit_once('#')?;
    address.parse().ok()
}

/// A [`Transport`] delivering messages through a [`MemoryHub`].
pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
    local: Peer,
    handler: Mutex<Option<InboundHandler>>,
    pending: Mutex<HashMap<Vec<u8>, mpsc::UnboundedSender<Message>>>,
    running: watch::Sender<bool>,
    stop_signal: CancellationToken,
    sequence: AtomicU64,
}

impl MemoryTransport {
    /// Create a transport for `local`, attached to `hub`.
    pub fn new(hub: Arc<MemoryHub>, local: Peer) -> Self {
        let (running, _) = watch::channel(false);
        MemoryTransport {
            hub,
            local,
            handler: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            running,
            stop_signal: CancellationToken::new(),
            sequence: AtomicU64::new(0),
        }
    }

    fn next_identity(&self) -> Vec<u8> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}#{}", self.local.address(), seq).into_bytes()
    }

    fn route_inbound(&self, message: Message) {
        if let Some(identity) = &message.identity {
            if identity_address(identity) == Some(self.local.address()) {
                // A reply to one of our requests.
                match self.pending.lock().get(identity) {
                    Some(collector) => {
                        let _ = collector.send(message);
                    }
                    None => trace!("dropping reply outside its request window"),
                }
                return;
            }
        }
        let handler = self.handler.lock().clone();
        match handler {
            // Handlers may overlap across messages, as over a real wire.
            Some(handler) => {
                tokio::spawn(handler(message));
            }
            None => trace!("no inbound handler registered, message dropped"),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn as_peer(&self) -> Peer {
        self.local
    }

    async fn start(&self, cancel: CancellationToken) -> Result<(), TransportError> {
        let (inbox, mut receiver) = mpsc::unbounded_channel();
        self.hub.register(self.local.address(), inbox);
        self.running.send_replace(true);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.stop_signal.cancelled() => break,
                inbound = receiver.recv() => match inbound {
                    Some(message) => self.route_inbound(message),
                    None => break,
                }
            }
        }
        self.hub.unregister(self.local.address());
        self.running.send_replace(false);
        Ok(())
    }

    async fn stop(&self, grace: Duration) -> Result<(), TransportError> {
        self.stop_signal.cancel();
        let mut running = self.running.subscribe();
        let drained = async {
            while *running.borrow() {
                if running.changed().await.is_err() {
                    break;
                }
            }
        };
        if tokio::time::timeout(grace, drained).await.is_err() {
            warn!("transport did not drain within its grace period");
        }
        Ok(())
    }

    async fn wait_until_running(&self) {
        let mut running = self.running.subscribe();
        while !*running.borrow() {
            if running.changed().await.is_err() {
                return;
            }
        }
    }

    async fn send_message(
        &self,
        peer: &Peer,
        mut message: Message,
        timeout: Duration,
        expected_replies: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, TransportError> {
        let identity = self.next_identity();
        message.remote = Some(self.local);
        message.identity = Some(identity.clone());

        let (collector, mut replies_rx) = mpsc::unbounded_channel();
        self.pending.lock().insert(identity.clone(), collector);

        if !self.hub.deliver(peer.address(), message) {
            self.pending.lock().remove(&identity);
            return Err(TransportError::Unreachable(*peer));
        }

        let mut replies = Vec::new();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        while replies.len() < expected_replies {
            tokio::select! {
                _ = &mut deadline => break,
                _ = cancel.cancelled() => break,
                reply = replies_rx.recv() => match reply {
                    Some(message) => replies.push(message),
                    None => break,
                }
            }
        }
        self.pending.lock().remove(&identity);
        Ok(replies)
    }

    async fn reply_message(&self, message: Message) -> Result<(), TransportError> {
        let Some(identity) = message.identity.as_deref() else {
            return Err(TransportError::NoCorrelation);
        };
        let Some(address) = identity_address(identity) else {
            return Err(TransportError::NoCorrelation);
        };
        if self.hub.deliver(address, message) {
            Ok(())
        } else {
            Err(TransportError::Shutdown)
        }
    }

    fn broadcast_message(&self, peers: &[Peer], message: Message) {
        // Each copy gets a fresh identity so receivers can answer with a
        // liveness pong; pongs arriving after the (nonexistent) request
        // window are dropped by route_inbound.
        for peer in peers {
            let mut copy = message.clone();
            copy.remote = Some(self.local);
            copy.identity = Some(self.next_identity());
            if !self.hub.deliver(peer.address(), copy) {
                trace!(peer = %peer, "broadcast target unreachable");
            }
        }
    }

    fn register_handler(&self, handler: InboundHandler) {
        // Last registration wins.
        *self.handler.lock() = Some(handler);
    }
}
