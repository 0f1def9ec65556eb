//! The wire-transport contract consumed by the gossip engine.

use async_trait::async_trait;
use futures::future::BoxFuture;
use quorumcast_messages::Message;
use quorumcast_types::Peer;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Callback the transport invokes once per inbound message.
///
/// Invocations may overlap across peers; the handler owns its message.
pub type InboundHandler = Arc<dyn Fn(Message) -> BoxFuture<'static, ()> + Send + Sync>;

/// Transport-level failures.
///
/// All of these are transient from the gossip engine's point of view:
/// dissemination falls back to the next heartbeat cycle instead of retrying.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not running")]
    NotRunning,

    #[error("peer {0} is unreachable")]
    Unreachable(Peer),

    #[error("request to {0} timed out")]
    Timeout(Peer),

    #[error("message has no reply correlation identity")]
    NoCorrelation,

    #[error("transport shut down")]
    Shutdown,
}

/// Send/receive primitives the gossip engine drives.
///
/// The engine does not own socket plumbing, handshakes, or protocol-version
/// negotiation; it consumes this contract. Implementations must tag inbound
/// messages with the originating [`Peer`] and the request's correlation
/// identity so replies can be routed back.
#[async_trait]
pub trait Transport: Send + Sync {
    /// This transport's own peer representation.
    fn as_peer(&self) -> Peer;

    /// Run the transport until `cancel` fires or [`Transport::stop`] is
    /// called. Resolves once the receive loop has terminated.
    async fn start(&self, cancel: CancellationToken) -> Result<(), TransportError>;

    /// Request shutdown, allowing up to `grace` for in-flight work to drain.
    async fn stop(&self, grace: Duration) -> Result<(), TransportError>;

    /// Wait until the transport reports itself running.
    async fn wait_until_running(&self);

    /// Send `message` to `peer` and collect replies until `expected_replies`
    /// have arrived or `timeout` elapses. Fewer replies than expected is not
    /// an error; the caller gets whatever arrived in time.
    async fn send_message(
        &self,
        peer: &Peer,
        message: Message,
        timeout: Duration,
        expected_replies: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, TransportError>;

    /// Send a reply tagged with a prior request's correlation identity
    /// (`message.identity`).
    async fn reply_message(&self, message: Message) -> Result<(), TransportError>;

    /// Fire-and-forget multicast to `peers`. Delivery failures are the
    /// transport's to log; the caller never observes them.
    fn broadcast_message(&self, peers: &[Peer], message: Message);

    /// Register the single inbound-message callback. The last registration
    /// wins; there is no multi-subscriber fan-out.
    fn register_handler(&self, handler: InboundHandler);
}
