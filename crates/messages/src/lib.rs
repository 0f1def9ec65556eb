//! Network messages for the Quorumcast consensus protocol.
//!
//! Every message serializes to an ordered sequence of opaque binary frames;
//! deserialization reconstructs fields positionally. The first frame on the
//! wire is a single kind byte, followed by the body frames of that kind.
//! Frame order and widths are part of the wire contract and must not change.

mod consensus;
mod frames;
mod message;

pub use consensus::{ProposalMessage, VoteMessage};
pub use frames::{CodecError, NIL_FRAME};
pub use message::{Message, MessageBody, MessageKind};
