//! End-to-end engine tests over the in-memory transport.

use quorumcast_gossip::{
    EngineState, Gossip, GossipConfig, MemoryHub, MemoryTransport, MessageProcessor, Transport,
};
use quorumcast_messages::{Message, MessageBody, MessageKind, ProposalMessage};
use quorumcast_types::{KeyPair, Peer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn make_peer(seed: u8) -> Peer {
    let keypair = KeyPair::from_seed([seed; 32]);
    let addr: SocketAddr = format!("127.0.0.1:{}", 9300 + seed as u16).parse().unwrap();
    Peer::new(addr, keypair.public())
}

fn make_proposal(seed: u8) -> Message {
    let keypair = KeyPair::from_seed([seed; 32]);
    Message::new(MessageBody::Proposal(ProposalMessage {
        validator: keypair.public(),
        height: 1,
        round: 0,
        block_hash: None,
        payload: vec![seed; 8],
        valid_round: -1,
    }))
}

/// Build an engine on `hub`, forwarding delivered messages to a channel.
fn make_engine(
    hub: &Arc<MemoryHub>,
    local: Peer,
    peers: Vec<Peer>,
) -> (Gossip, mpsc::UnboundedReceiver<Message>) {
    init_tracing();
    let (delivered_tx, delivered_rx) = mpsc::unbounded_channel();
    let process: MessageProcessor = Arc::new(move |message| {
        let _ = delivered_tx.send(message);
        Ok(())
    });
    let transport = Arc::new(MemoryTransport::new(Arc::clone(hub), local));
    let engine = Gossip::new(transport, peers, process, GossipConfig::for_testing());
    (engine, delivered_rx)
}

fn spawn_engine(engine: &Gossip, cancel: &CancellationToken) {
    let engine = engine.clone();
    let cancel = cancel.clone();
    tokio::spawn(async move { engine.start(cancel).await });
}

/// A bare transport that answers pings and records every other inbound
/// message kind, an observation post for what the engine puts on the wire.
fn spawn_observer(
    hub: &Arc<MemoryHub>,
    local: Peer,
    cancel: &CancellationToken,
) -> (Arc<MemoryTransport>, mpsc::UnboundedReceiver<MessageKind>) {
    let transport = Arc::new(MemoryTransport::new(Arc::clone(hub), local));
    let (kinds_tx, kinds_rx) = mpsc::unbounded_channel();
    let replier = Arc::clone(&transport);
    transport.register_handler(Arc::new(move |message| {
        let replier = Arc::clone(&replier);
        let kinds_tx = kinds_tx.clone();
        Box::pin(async move {
            match message.body {
                MessageBody::Ping | MessageBody::Have { .. } => {
                    let pong = Message {
                        body: MessageBody::Pong,
                        remote: None,
                        identity: message.identity.clone(),
                    };
                    let _ = replier.reply_message(pong).await;
                    let _ = kinds_tx.send(message.kind());
                }
                _ => {
                    let _ = kinds_tx.send(message.kind());
                }
            }
        })
    }));
    let runner = Arc::clone(&transport);
    let run_cancel = cancel.clone();
    tokio::spawn(async move { runner.start(run_cancel).await });
    (transport, kinds_rx)
}

#[tokio::test]
async fn message_disseminates_between_engines() {
    let hub = MemoryHub::new();
    let cancel = CancellationToken::new();
    let peer_a = make_peer(1);
    let peer_b = make_peer(2);

    let (engine_a, _delivered_a) = make_engine(&hub, peer_a, vec![peer_b]);
    let (engine_b, mut delivered_b) = make_engine(&hub, peer_b, vec![peer_a]);
    spawn_engine(&engine_a, &cancel);
    spawn_engine(&engine_b, &cancel);
    engine_a.wait_until_running().await;
    engine_b.wait_until_running().await;

    let proposal = make_proposal(7);
    let id = proposal.id();
    engine_a.add_message(proposal);

    // B learns the id from A's next heartbeat digest and pulls the message.
    let received = timeout(Duration::from_secs(5), delivered_b.recv())
        .await
        .expect("message was not disseminated in time")
        .expect("delivery channel closed");
    assert_eq!(received.id(), id);
    assert_eq!(received.kind(), MessageKind::Proposal);

    // Deduplication holds across further heartbeats: nothing is delivered
    // twice.
    assert!(
        timeout(Duration::from_millis(300), delivered_b.recv())
            .await
            .is_err(),
        "message delivered more than once"
    );

    cancel.cancel();
}

#[tokio::test]
async fn seen_ids_trigger_no_want() {
    let hub = MemoryHub::new();
    let cancel = CancellationToken::new();
    let peer_a = make_peer(1);
    let peer_b = make_peer(2);

    let (engine_a, _delivered_a) = make_engine(&hub, peer_a, vec![peer_b]);
    spawn_engine(&engine_a, &cancel);
    let (observer, mut observed) = spawn_observer(&hub, peer_b, &cancel);
    observer.wait_until_running().await;
    engine_a.wait_until_running().await;

    // A has already delivered this message, so its id is in the seen set.
    let proposal = make_proposal(7);
    let id = proposal.id();
    engine_a.add_message(proposal);

    let have = Message::new(MessageBody::Have { ids: vec![id] });
    observer
        .send_message(&peer_a, have, Duration::from_millis(100), 0, &cancel)
        .await
        .unwrap();

    // A must not ask for anything it has seen. Drain the observer for a
    // while; Have broadcasts from A's heartbeat are fine, Want is not.
    let drain = timeout(Duration::from_millis(400), async {
        while let Some(kind) = observed.recv().await {
            assert_ne!(kind, MessageKind::Want, "engine pulled an already-seen id");
        }
    })
    .await;
    assert!(drain.is_err(), "observer channel closed unexpectedly");

    cancel.cancel();
}

#[tokio::test]
async fn unseen_ids_trigger_a_want() {
    let hub = MemoryHub::new();
    let cancel = CancellationToken::new();
    let peer_a = make_peer(1);
    let peer_b = make_peer(2);

    let (engine_a, _delivered_a) = make_engine(&hub, peer_a, vec![peer_b]);
    spawn_engine(&engine_a, &cancel);
    let (observer, mut observed) = spawn_observer(&hub, peer_b, &cancel);
    observer.wait_until_running().await;
    engine_a.wait_until_running().await;

    // Advertise an id A has never seen.
    let id = make_proposal(9).id();
    let have = Message::new(MessageBody::Have { ids: vec![id] });
    observer
        .send_message(&peer_a, have, Duration::from_millis(100), 0, &cancel)
        .await
        .unwrap();

    let want_seen = timeout(Duration::from_secs(2), async {
        while let Some(kind) = observed.recv().await {
            if kind == MessageKind::Want {
                return;
            }
        }
    })
    .await;
    assert!(want_seen.is_ok(), "engine never pulled the advertised id");

    cancel.cancel();
}

#[tokio::test]
async fn liveness_gate_holds_until_peers_respond() {
    let hub = MemoryHub::new();
    let cancel = CancellationToken::new();
    let peer_a = make_peer(1);
    let peer_b = make_peer(2);

    let (engine_a, _delivered_a) = make_engine(&hub, peer_a, vec![peer_b]);
    spawn_engine(&engine_a, &cancel);

    // B is down: the gate cannot pass.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(engine_a.state(), EngineState::Starting);

    // B comes up; the gate clears on a subsequent poll.
    let (_observer, _observed) = spawn_observer(&hub, peer_b, &cancel);
    timeout(Duration::from_secs(2), engine_a.wait_until_running())
        .await
        .expect("gate never cleared after the peer came up");

    cancel.cancel();
}

#[tokio::test]
async fn cancelled_startup_returns_cleanly() {
    let hub = MemoryHub::new();
    let cancel = CancellationToken::new();
    let peer_a = make_peer(1);
    // The only peer never comes up, so the gate can only exit by
    // cancellation.
    let (engine_a, _delivered_a) = make_engine(&hub, peer_a, vec![make_peer(2)]);

    let runner = engine_a.clone();
    let run_cancel = cancel.clone();
    let task = tokio::spawn(async move { runner.start(run_cancel).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let result = timeout(Duration::from_secs(1), task)
        .await
        .expect("start did not return after cancellation")
        .expect("start task panicked");
    assert!(result.is_ok());
    assert_eq!(engine_a.state(), EngineState::Stopped);
}

#[tokio::test]
async fn stop_terminates_a_running_engine() {
    let hub = MemoryHub::new();
    let cancel = CancellationToken::new();
    let peer_a = make_peer(1);
    let peer_b = make_peer(2);

    let (engine_a, _delivered_a) = make_engine(&hub, peer_a, vec![peer_b]);
    let (engine_b, _delivered_b) = make_engine(&hub, peer_b, vec![peer_a]);

    let runner = engine_a.clone();
    let run_cancel = cancel.clone();
    let task = tokio::spawn(async move { runner.start(run_cancel).await });
    spawn_engine(&engine_b, &cancel);

    engine_a.wait_until_running().await;
    engine_a.stop(Duration::from_millis(500)).await.unwrap();

    let result = timeout(Duration::from_secs(1), task)
        .await
        .expect("start did not return after stop")
        .expect("start task panicked");
    assert!(result.is_ok());
    assert_eq!(engine_a.state(), EngineState::Stopped);

    cancel.cancel();
}

#[tokio::test]
async fn want_for_evicted_id_gets_no_reply() {
    let hub = MemoryHub::new();
    let cancel = CancellationToken::new();
    let peer_a = make_peer(1);
    let peer_b = make_peer(2);

    let (engine_a, _delivered_a) = make_engine(&hub, peer_a, vec![peer_b]);
    spawn_engine(&engine_a, &cancel);
    let (observer, _observed) = spawn_observer(&hub, peer_b, &cancel);
    observer.wait_until_running().await;
    engine_a.wait_until_running().await;

    // An id nothing ever cached: the engine skips it silently.
    let want = Message::new(MessageBody::Want {
        ids: vec![make_proposal(42).id()],
    });
    let replies = observer
        .send_message(&peer_a, want, Duration::from_millis(300), 1, &cancel)
        .await
        .unwrap();
    assert!(replies.is_empty());

    cancel.cancel();
}
