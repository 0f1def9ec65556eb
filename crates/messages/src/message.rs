//! The message envelope and kind dispatch table.

use crate::consensus::{ProposalMessage, VoteMessage};
use crate::frames::{read_message_id, read_u32, CodecError};
use quorumcast_types::{MessageId, Peer};
use sha2::{Digest, Sha256};

/// Message kind tags as they appear on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Liveness probe.
    Ping,
    /// Liveness reply.
    Pong,
    /// Digest advertisement: "I have these message ids".
    Have,
    /// Anti-entropy pull: "send me these message ids".
    Want,
    /// Block proposal (application message).
    Proposal,
    /// Consensus vote (application message).
    Vote,
}

impl MessageKind {
    /// Stable single-byte wire encoding.
    pub fn as_byte(self) -> u8 {
        match self {
            MessageKind::Ping => 0x01,
            MessageKind::Pong => 0x02,
            MessageKind::Have => 0x03,
            MessageKind::Want => 0x04,
            MessageKind::Proposal => 0x10,
            MessageKind::Vote => 0x11,
        }
    }

    /// Decode from the wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(MessageKind::Ping),
            0x02 => Some(MessageKind::Pong),
            0x03 => Some(MessageKind::Have),
            0x04 => Some(MessageKind::Want),
            0x10 => Some(MessageKind::Proposal),
            0x11 => Some(MessageKind::Vote),
            _ => None,
        }
    }

    /// Get a human-readable name for this message kind.
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::Ping => "Ping",
            MessageKind::Pong => "Pong",
            MessageKind::Have => "Have",
            MessageKind::Want => "Want",
            MessageKind::Proposal => "Proposal",
            MessageKind::Vote => "Vote",
        }
    }

    /// Whether this kind is delivered to the application processor rather
    /// than handled by the gossip engine itself.
    pub fn is_application(self) -> bool {
        matches!(self, MessageKind::Proposal | MessageKind::Vote)
    }
}

/// Typed message bodies.
///
/// The gossip engine dispatches on this union; there is no open-ended
/// runtime type inspection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageBody {
    /// Liveness probe.
    Ping,
    /// Liveness reply.
    Pong,
    /// Digest advertisement carrying recently cached message ids.
    Have { ids: Vec<MessageId> },
    /// Anti-entropy request for the listed message ids.
    Want { ids: Vec<MessageId> },
    /// Block proposal.
    Proposal(ProposalMessage),
    /// Consensus vote.
    Vote(VoteMessage),
}

impl MessageBody {
    /// The kind tag of this body.
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::Ping => MessageKind::Ping,
            MessageBody::Pong => MessageKind::Pong,
            MessageBody::Have { .. } => MessageKind::Have,
            MessageBody::Want { .. } => MessageKind::Want,
            MessageBody::Proposal(_) => MessageKind::Proposal,
            MessageBody::Vote(_) => MessageKind::Vote,
        }
    }

    /// Serialize the body to its wire frames (kind frame excluded).
    pub fn to_frames(&self) -> Vec<Vec<u8>> {
        match self {
            MessageBody::Ping | MessageBody::Pong => Vec::new(),
            MessageBody::Have { ids } | MessageBody::Want { ids } => id_frames(ids),
            MessageBody::Proposal(proposal) => proposal.to_frames(),
            MessageBody::Vote(vote) => vote.to_frames(),
        }
    }

    fn from_frames(kind: MessageKind, frames: &[Vec<u8>]) -> Result<Self, CodecError> {
        match kind {
            MessageKind::Ping => {
                crate::frames::check_count(frames, 0)?;
                Ok(MessageBody::Ping)
            }
            MessageKind::Pong => {
                crate::frames::check_count(frames, 0)?;
                Ok(MessageBody::Pong)
            }
            MessageKind::Have => Ok(MessageBody::Have {
                ids: ids_from_frames(frames)?,
            }),
            MessageKind::Want => Ok(MessageBody::Want {
                ids: ids_from_frames(frames)?,
            }),
            MessageKind::Proposal => Ok(MessageBody::Proposal(ProposalMessage::from_frames(
                frames,
            )?)),
            MessageKind::Vote => Ok(MessageBody::Vote(VoteMessage::from_frames(frames)?)),
        }
    }
}

/// Id lists serialize as a count frame followed by one 32-byte frame per id.
fn id_frames(ids: &[MessageId]) -> Vec<Vec<u8>> {
    let mut frames = Vec::with_capacity(1 + ids.len());
    frames.push((ids.len() as u32).to_le_bytes().to_vec());
    frames.extend(ids.iter().map(|id| id.as_bytes().to_vec()));
    frames
}

fn ids_from_frames(frames: &[Vec<u8>]) -> Result<Vec<MessageId>, CodecError> {
    if frames.is_empty() {
        return Err(CodecError::FrameCount {
            expected: 1,
            got: 0,
        });
    }
    let count = read_u32(frames, 0)? as usize;
    crate::frames::check_count(frames, 1 + count)?;
    (1..=count).map(|i| read_message_id(frames, i)).collect()
}

/// A message in transit through the gossip layer.
///
/// `remote` is the originating peer as reported by the transport; it is
/// absent for locally produced messages. `identity` is the opaque
/// correlation token replies must carry so the transport can route them back
/// to the requester.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Typed body.
    pub body: MessageBody,
    /// Originating peer, absent for locally produced messages.
    pub remote: Option<Peer>,
    /// Opaque reply-correlation token.
    pub identity: Option<Vec<u8>>,
}

impl Message {
    /// Wrap a body into a fresh, locally produced message.
    pub fn new(body: MessageBody) -> Self {
        Message {
            body,
            remote: None,
            identity: None,
        }
    }

    /// The kind tag of this message.
    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    /// Content-derived identifier.
    ///
    /// A pure function of the kind tag and the body frames: equal frames
    /// always yield equal identifiers, regardless of envelope metadata.
    pub fn id(&self) -> MessageId {
        let mut hasher = Sha256::new();
        hasher.update([self.kind().as_byte()]);
        for frame in self.body.to_frames() {
            hasher.update((frame.len() as u32).to_le_bytes());
            hasher.update(&frame);
        }
        MessageId::from_raw(hasher.finalize().into())
    }

    /// Serialize to wire frames: a single kind byte followed by the body
    /// frames.
    pub fn to_frames(&self) -> Vec<Vec<u8>> {
        let mut frames = vec![vec![self.kind().as_byte()]];
        frames.extend(self.body.to_frames());
        frames
    }

    /// Reconstruct a message from wire frames.
    ///
    /// Envelope metadata (`remote`, `identity`) is transport state and is
    /// stamped by the receiving transport, not carried in frames.
    pub fn from_frames(frames: &[Vec<u8>]) -> Result<Self, CodecError> {
        let kind_frame = frames.first().ok_or(CodecError::Empty)?;
        if kind_frame.len() != 1 {
            return Err(CodecError::FrameWidth {
                index: 0,
                expected: 1,
                got: kind_frame.len(),
            });
        }
        let kind = MessageKind::from_byte(kind_frame[0])
            .ok_or(CodecError::UnknownKind(kind_frame[0]))?;
        let body = MessageBody::from_frames(kind, &frames[1..])?;
        Ok(Message::new(body))
    }
}
