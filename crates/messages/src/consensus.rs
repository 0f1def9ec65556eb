//! Application-level consensus messages.
//!
//! These are the payloads the gossip layer disseminates and hands to the
//! consensus state machine. Their frame layouts are fixed for wire
//! compatibility.

use crate::frames::{
    check_count, read_byte, read_hash_or_nil, read_i32, read_key, read_signature_or_nil,
    read_u32, read_u64, write_hash_or_nil, write_signature_or_nil, CodecError,
};
use quorumcast_types::{BlockHash, PublicKey, Vote, VoteFlag};

/// A block proposal for one (height, round).
///
/// # Wire Format
///
/// ```text
/// frame 0: validator public key      (32 bytes)
/// frame 1: height                    (8-byte little endian)
/// frame 2: round                     (4-byte little endian)
/// frame 3: block hash, or nil byte   (32 bytes | 1 byte)
/// frame 4: marshalled block payload  (opaque)
/// frame 5: valid round               (4-byte little endian, signed)
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposalMessage {
    /// The proposing validator.
    pub validator: PublicKey,
    /// Target chain height.
    pub height: u64,
    /// Target consensus round.
    pub round: u32,
    /// Hash of the proposed block, when one is set.
    pub block_hash: Option<BlockHash>,
    /// Marshalled block contents, opaque to this layer.
    pub payload: Vec<u8>,
    /// Last round that reached a prevote quorum, `-1` if none.
    pub valid_round: i32,
}

impl ProposalMessage {
    pub(crate) const FRAME_COUNT: usize = 6;

    pub(crate) fn to_frames(&self) -> Vec<Vec<u8>> {
        vec![
            self.validator.as_bytes().to_vec(),
            self.height.to_le_bytes().to_vec(),
            self.round.to_le_bytes().to_vec(),
            write_hash_or_nil(self.block_hash.as_ref()),
            self.payload.clone(),
            self.valid_round.to_le_bytes().to_vec(),
        ]
    }

    pub(crate) fn from_frames(frames: &[Vec<u8>]) -> Result<Self, CodecError> {
        check_count(frames, Self::FRAME_COUNT)?;
        Ok(ProposalMessage {
            validator: read_key(frames, 0)?,
            height: read_u64(frames, 1)?,
            round: read_u32(frames, 2)?,
            block_hash: read_hash_or_nil(frames, 3)?,
            payload: frames[4].clone(),
            valid_round: read_i32(frames, 5)?,
        })
    }
}

/// A consensus vote in transit.
///
/// # Wire Format
///
/// ```text
/// frame 0: validator public key      (32 bytes)
/// frame 1: height                    (8-byte little endian)
/// frame 2: round                     (4-byte little endian)
/// frame 3: block hash, or nil byte   (32 bytes | 1 byte)
/// frame 4: vote flag                 (1 byte)
/// frame 5: timestamp, unix millis    (8-byte little endian)
/// frame 6: signature, or nil byte    (64 bytes | 1 byte)
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteMessage {
    /// The carried vote.
    pub vote: Vote,
}

impl VoteMessage {
    pub(crate) const FRAME_COUNT: usize = 7;

    /// Wrap a vote for dissemination.
    pub fn new(vote: Vote) -> Self {
        VoteMessage { vote }
    }

    /// Consume and return the inner vote.
    pub fn into_vote(self) -> Vote {
        self.vote
    }

    pub(crate) fn to_frames(&self) -> Vec<Vec<u8>> {
        let vote = &self.vote;
        vec![
            vote.validator.as_bytes().to_vec(),
            vote.height.to_le_bytes().to_vec(),
            vote.round.to_le_bytes().to_vec(),
            write_hash_or_nil(vote.block_hash.as_ref()),
            vec![vote.flag.as_byte()],
            vote.timestamp_ms.to_le_bytes().to_vec(),
            write_signature_or_nil(vote.signature.as_ref()),
        ]
    }

    pub(crate) fn from_frames(frames: &[Vec<u8>]) -> Result<Self, CodecError> {
        check_count(frames, Self::FRAME_COUNT)?;
        let flag_byte = read_byte(frames, 4)?;
        let flag =
            VoteFlag::from_byte(flag_byte).ok_or(CodecError::InvalidValue { index: 4 })?;
        Ok(VoteMessage {
            vote: Vote {
                validator: read_key(frames, 0)?,
                height: read_u64(frames, 1)?,
                round: read_u32(frames, 2)?,
                block_hash: read_hash_or_nil(frames, 3)?,
                flag,
                timestamp_ms: read_u64(frames, 5)?,
                signature: read_signature_or_nil(frames, 6)?,
            },
        })
    }
}
