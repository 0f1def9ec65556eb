//! The gossip engine.

use crate::cache::MessageCache;
use crate::config::GossipConfig;
use crate::peers::{sample_peers, PeerTable};
use crate::seen::SeenSet;
use crate::transport::{Transport, TransportError};
use futures::future;
use parking_lot::Mutex;
use quorumcast_messages::{Message, MessageBody};
use quorumcast_types::{MessageId, Peer};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Callback receiving every newly delivered application message.
///
/// By contract a returned error is logged and discarded at the gossip
/// boundary. Delivery is at-most-effort, and one failing handler must not
/// halt dissemination.
pub type MessageProcessor =
    Arc<dyn Fn(Message) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// Engine lifecycle states.
///
/// There is no partial-failure state: startup either reaches `Running` or
/// the caller aborts it via cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Not started, or terminated.
    Stopped,
    /// Transport coming up and the liveness gate in progress.
    Starting,
    /// Heartbeat and dispatch active.
    Running,
}

/// Fatal engine failures.
///
/// Only transport-level startup/shutdown problems surface here; bad peers
/// and malformed gossip payloads are logged and dropped.
#[derive(Debug, Error)]
pub enum GossipError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// The epidemic dissemination engine.
///
/// Owns the message cache and seen set, drives the heartbeat/anti-entropy
/// machinery over an externally provided [`Transport`], and forwards
/// application messages to the configured processor. Cheap to clone-share
/// via the internal `Arc`.
#[derive(Clone)]
pub struct Gossip {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    table: PeerTable,
    cache: MessageCache,
    seen: SeenSet,
    process: MessageProcessor,
    config: GossipConfig,
    state: watch::Sender<EngineState>,
    heartbeat_cancel: Mutex<Option<CancellationToken>>,
    rng: Mutex<ChaCha8Rng>,
}

impl Gossip {
    /// Create an engine over `transport`, fanning out to `peers`.
    ///
    /// `process` receives every newly delivered application message. The
    /// local peer and duplicate identities are dropped from `peers`.
    pub fn new(
        transport: Arc<dyn Transport>,
        peers: Vec<Peer>,
        process: MessageProcessor,
        config: GossipConfig,
    ) -> Self {
        let table = PeerTable::new(transport.as_peer(), peers);
        let rng = match config.sample_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let (state, _) = watch::channel(EngineState::Stopped);
        Gossip {
            inner: Arc::new(Inner {
                cache: MessageCache::new(config.cache_generations, config.generation_capacity),
                seen: SeenSet::new(config.seen_capacity),
                transport,
                table,
                process,
                config,
                state,
                heartbeat_cancel: Mutex::new(None),
                rng: Mutex::new(rng),
            }),
        }
    }

    /// This engine's own peer representation.
    pub fn as_peer(&self) -> Peer {
        self.inner.transport.as_peer()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        *self.inner.state.borrow()
    }

    /// Wait until the engine reaches [`EngineState::Running`].
    pub async fn wait_until_running(&self) {
        let mut state = self.inner.state.subscribe();
        while *state.borrow() != EngineState::Running {
            if state.changed().await.is_err() {
                return;
            }
        }
    }

    /// Run the engine until the transport terminates or `cancel` fires.
    ///
    /// Starts the transport, waits for it to report ready, registers the
    /// inbound dispatcher, then holds at the liveness gate: every poll
    /// interval all known peers are pinged in parallel, and the engine
    /// proceeds only once responders exceed two thirds of the peer count.
    /// After the gate the heartbeat loop and the transport run concurrently;
    /// this call resolves when either finishes.
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), GossipError> {
        let inner = &self.inner;
        let heartbeat_cancel = cancel.child_token();
        *inner.heartbeat_cancel.lock() = Some(heartbeat_cancel.clone());
        inner.state.send_replace(EngineState::Starting);

        let transport = Arc::clone(&inner.transport);
        let transport_cancel = cancel.clone();
        let mut transport_task =
            tokio::spawn(async move { transport.start(transport_cancel).await });

        inner.transport.wait_until_running().await;
        self.register_dispatcher(heartbeat_cancel.clone());

        if !inner.liveness_gate(&cancel).await {
            // Only cancellation exits the gate early; the transport saw the
            // same token and is already unwinding.
            debug!("startup cancelled during liveness gate");
            let _ = transport_task.await;
            inner.state.send_replace(EngineState::Stopped);
            return Ok(());
        }
        debug!("enough peers are alive, gossip running");
        inner.state.send_replace(EngineState::Running);

        let result = tokio::select! {
            joined = &mut transport_task => match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(error)) => Err(GossipError::Transport(error)),
                Err(join_error) => {
                    warn!(%join_error, "transport task aborted");
                    Ok(())
                }
            },
            _ = inner.heartbeat_loop(&heartbeat_cancel) => Ok(()),
        };
        inner.state.send_replace(EngineState::Stopped);
        result
    }

    /// Stop the engine: cancel the heartbeat loop and shut the transport
    /// down within `grace`.
    pub async fn stop(&self, grace: Duration) -> Result<(), GossipError> {
        if let Some(cancel) = self.inner.heartbeat_cancel.lock().take() {
            cancel.cancel();
        }
        self.inner.transport.stop(grace).await?;
        self.inner.state.send_replace(EngineState::Stopped);
        Ok(())
    }

    /// Feed a message into the dissemination path.
    ///
    /// Used both for locally produced messages (so they enter the cache and
    /// get advertised) and internally for messages arriving off the wire.
    /// Delivery is at-most-effort: ids already seen within the TTL return
    /// early, cache refusal skips the message silently, and processor errors
    /// are logged and discarded.
    pub fn add_message(&self, message: Message) {
        self.inner.add_message(message);
    }

    /// Feed several messages into the dissemination path.
    pub fn add_messages(&self, messages: impl IntoIterator<Item = Message>) {
        self.inner.add_messages(messages);
    }

    fn register_dispatcher(&self, cancel: CancellationToken) {
        let inner = Arc::clone(&self.inner);
        self.inner
            .transport
            .register_handler(Arc::new(move |message| {
                let inner = Arc::clone(&inner);
                let cancel = cancel.clone();
                Box::pin(async move {
                    tokio::select! {
                        _ = inner.dispatch(message, &cancel) => {}
                        _ = cancel.cancelled() => {}
                    }
                })
            }));
    }
}

impl Inner {
    /// Classify one inbound message and run its handler.
    async fn dispatch(&self, message: Message, cancel: &CancellationToken) {
        trace!(kind = message.kind().name(), "handling inbound message");
        match &message.body {
            MessageBody::Ping => self.reply_pong(&message).await,
            MessageBody::Pong => {
                // Correlated pongs are routed to their requester by the
                // transport; one arriving here lost its request window.
                trace!("ignoring uncorrelated pong");
            }
            MessageBody::Have { ids } => {
                let ids = ids.clone();
                self.handle_have(&message, ids, cancel).await;
            }
            MessageBody::Want { ids } => {
                let ids = ids.clone();
                self.handle_want(&message, ids).await;
            }
            MessageBody::Proposal(_) | MessageBody::Vote(_) => self.add_message(message),
        }
    }

    async fn reply_pong(&self, request: &Message) {
        let pong = Message {
            body: MessageBody::Pong,
            remote: None,
            identity: request.identity.clone(),
        };
        if let Err(error) = self.transport.reply_message(pong).await {
            debug!(%error, "failed to reply pong");
        }
    }

    /// Digest advertisement: answer the liveness signal, then pull whatever
    /// we have not seen from the advertising peer.
    async fn handle_have(
        &self,
        request: &Message,
        ids: Vec<MessageId>,
        cancel: &CancellationToken,
    ) {
        let Some(peer) = request.remote else {
            trace!("digest advertisement without origin, dropped");
            return;
        };
        self.reply_pong(request).await;

        let total = ids.len();
        let missing: Vec<MessageId> = ids
            .into_iter()
            .filter(|id| !self.seen.contains(id))
            .collect();
        trace!(
            total,
            missing = missing.len(),
            peer = %peer,
            "handled digest advertisement"
        );
        if missing.is_empty() {
            return;
        }

        let expected = missing.len();
        let want = Message::new(MessageBody::Want { ids: missing });
        match self
            .transport
            .send_message(&peer, want, self.config.pull_timeout, expected, cancel)
            .await
        {
            Ok(replies) => {
                trace!(
                    expected,
                    received = replies.len(),
                    peer = %peer,
                    "anti-entropy pull finished"
                );
                self.add_messages(replies);
            }
            // No retry; the next heartbeat cycle re-advertises.
            Err(error) => debug!(peer = %peer, %error, "anti-entropy pull failed"),
        }
    }

    /// Content request: reply with every requested message still cached,
    /// stamped with our own address and the requester's correlation
    /// identity. All replies go out concurrently.
    async fn handle_want(&self, request: &Message, ids: Vec<MessageId>) {
        let mut replies = Vec::new();
        for id in ids {
            match self.cache.get(&id) {
                Ok(mut message) => {
                    message.remote = Some(self.transport.as_peer());
                    message.identity = request.identity.clone();
                    replies.push(message);
                }
                // Evicted since it was advertised; the requester may still
                // pull it from another peer's digest.
                Err(_) => trace!(id = %id, "wanted message no longer cached"),
            }
        }
        let sends = replies
            .into_iter()
            .map(|message| self.transport.reply_message(message));
        for result in future::join_all(sends).await {
            if let Err(error) = result {
                debug!(%error, "failed to send wanted message");
            }
        }
    }

    /// Delivery path: deduplicate, cache, mark seen, hand to the processor.
    ///
    /// A seen id returns early, so within the seen TTL the processor runs at
    /// most once per message. Cache refusal (duplicate, full generation)
    /// skips delivery silently; processor errors are logged and discarded.
    fn add_message(&self, message: Message) {
        let id = message.id();
        if self.seen.contains(&id) {
            trace!(id = %id, "message seen recently, ignored");
            return;
        }
        if let Err(error) = self.cache.put(message.clone()) {
            trace!(id = %id, %error, "message not cached, delivery skipped");
            return;
        }
        self.seen.mark(id, self.config.seen_ttl);
        if let Err(error) = (self.process)(message) {
            debug!(id = %id, %error, "message processor failed; dissemination continues");
        }
    }

    fn add_messages(&self, messages: impl IntoIterator<Item = Message>) {
        for message in messages {
            self.add_message(message);
        }
    }

    /// Ping all peers in parallel until more than two thirds respond.
    ///
    /// Returns `false` if cancelled first. An empty peer table passes
    /// trivially: there is nobody to gossip with, but also nobody to wait
    /// for.
    async fn liveness_gate(&self, cancel: &CancellationToken) -> bool {
        let peers = self.table.peers();
        if peers.is_empty() {
            warn!("peer table is empty, skipping liveness gate");
            return true;
        }
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let probes = peers.iter().map(|peer| self.probe_peer(peer, cancel));
            let pongs = future::join_all(probes)
                .await
                .into_iter()
                .filter(|alive| *alive)
                .count();
            let two_thirds = peers.len() as f64 * 2.0 / 3.0;
            debug!(pongs, total = peers.len(), "checked peer liveness");
            if pongs as f64 > two_thirds {
                return true;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.liveness_poll_interval) => {}
                _ = cancel.cancelled() => return false,
            }
        }
    }

    async fn probe_peer(&self, peer: &Peer, cancel: &CancellationToken) -> bool {
        let ping = Message::new(MessageBody::Ping);
        match self
            .transport
            .send_message(peer, ping, self.config.liveness_ping_timeout, 1, cancel)
            .await
        {
            Ok(replies) => replies
                .iter()
                .any(|reply| matches!(reply.body, MessageBody::Pong)),
            Err(error) => {
                debug!(peer = %peer, %error, "liveness ping failed");
                false
            }
        }
    }

    /// Advertise the current generation to a random peer sample, then
    /// rotate the cache. Runs until cancelled.
    async fn heartbeat_loop(&self, cancel: &CancellationToken) {
        while !cancel.is_cancelled() {
            let ids = self.cache.gossip_ids();
            if !ids.is_empty() {
                let targets = {
                    let mut rng = self.rng.lock();
                    sample_peers(&mut *rng, self.table.peers(), self.config.fanout)
                };
                trace!(
                    ids = ids.len(),
                    peers = targets.len(),
                    "broadcasting digest"
                );
                let have = Message::new(MessageBody::Have { ids });
                self.transport.broadcast_message(&targets, have);
            }
            self.cache.shift();
            tokio::select! {
                _ = tokio::time::sleep(self.config.heartbeat_interval) => {}
                _ = cancel.cancelled() => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumcast_messages::{ProposalMessage, VoteMessage};
    use quorumcast_types::{KeyPair, Vote, VoteFlag};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullTransport {
        local: Peer,
    }

    #[async_trait::async_trait]
    impl Transport for NullTransport {
        fn as_peer(&self) -> Peer {
            self.local
        }

        async fn start(&self, cancel: CancellationToken) -> Result<(), TransportError> {
            cancel.cancelled().await;
            Ok(())
        }

        async fn stop(&self, _grace: Duration) -> Result<(), TransportError> {
            Ok(())
        }

        async fn wait_until_running(&self) {}

        async fn send_message(
            &self,
            peer: &Peer,
            _message: Message,
            _timeout: Duration,
            _expected_replies: usize,
            _cancel: &CancellationToken,
        ) -> Result<Vec<Message>, TransportError> {
            Err(TransportError::Unreachable(*peer))
        }

        async fn reply_message(&self, _message: Message) -> Result<(), TransportError> {
            Ok(())
        }

        fn broadcast_message(&self, _peers: &[Peer], _message: Message) {}

        fn register_handler(&self, _handler: crate::InboundHandler) {}
    }

    fn make_peer(seed: u8) -> Peer {
        let keypair = KeyPair::from_seed([seed; 32]);
        let addr: SocketAddr = format!("127.0.0.1:{}", 9100 + seed as u16).parse().unwrap();
        Peer::new(addr, keypair.public())
    }

    fn make_engine(counter: Arc<AtomicUsize>) -> Gossip {
        let transport = Arc::new(NullTransport {
            local: make_peer(0),
        });
        let process: MessageProcessor = Arc::new(move |_msg| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        Gossip::new(transport, vec![], process, GossipConfig::for_testing())
    }

    fn make_vote_message(seed: u8) -> Message {
        let keypair = KeyPair::from_seed([seed; 32]);
        let vote = Vote::signed(1, 0, None, 7, VoteFlag::Commit, &keypair);
        Message::new(MessageBody::Vote(VoteMessage::new(vote)))
    }

    #[test]
    fn duplicate_delivery_invokes_processor_once() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let engine = make_engine(Arc::clone(&delivered));
        let message = make_vote_message(1);
        engine.add_message(message.clone());
        engine.add_message(message);
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_messages_are_each_delivered() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let engine = make_engine(Arc::clone(&delivered));
        engine.add_messages([make_vote_message(1), make_vote_message(2)]);
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn processor_error_does_not_poison_later_deliveries() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        let process: MessageProcessor = Arc::new(move |_msg| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err("processor exploded".into())
            } else {
                Ok(())
            }
        });
        let transport = Arc::new(NullTransport {
            local: make_peer(0),
        });
        let engine = Gossip::new(transport, vec![], process, GossipConfig::for_testing());
        engine.add_message(make_vote_message(1));
        engine.add_message(make_vote_message(2));
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn locally_added_messages_are_advertised() {
        let engine = make_engine(Arc::new(AtomicUsize::new(0)));
        let keypair = KeyPair::from_seed([1u8; 32]);
        let proposal = Message::new(MessageBody::Proposal(ProposalMessage {
            validator: keypair.public(),
            height: 1,
            round: 0,
            block_hash: None,
            payload: b"block".to_vec(),
            valid_round: -1,
        }));
        let id = proposal.id();
        engine.add_message(proposal);
        assert_eq!(engine.inner.cache.gossip_ids(), vec![id]);
    }

    #[tokio::test]
    async fn stop_before_start_is_clean() {
        let engine = make_engine(Arc::new(AtomicUsize::new(0)));
        assert_eq!(engine.state(), EngineState::Stopped);
        engine.stop(Duration::from_millis(10)).await.unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);
    }
}
