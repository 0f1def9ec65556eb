//! Consensus votes.

use crate::signing::vote_signing_message;
use crate::{BlockHash, KeyPair, PublicKey, Signature};

/// The stage a vote attests to, ordered by strength.
///
/// A validator's recorded vote may only move upward through this ordering
/// within a single round: `Null < Absent < Commit`. `Absent` is the
/// prevote-equivalent marker, `Commit` the precommit-equivalent one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VoteFlag {
    /// No vote cast yet.
    Null,
    /// Prevote-stage vote.
    Absent,
    /// Commit-stage vote.
    Commit,
}

impl VoteFlag {
    /// Stable single-byte wire encoding.
    pub fn as_byte(self) -> u8 {
        match self {
            VoteFlag::Null => 0,
            VoteFlag::Absent => 1,
            VoteFlag::Commit => 2,
        }
    }

    /// Decode from the wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(VoteFlag::Null),
            1 => Some(VoteFlag::Absent),
            2 => Some(VoteFlag::Commit),
            _ => None,
        }
    }
}

/// A single validator's vote for one (height, round).
///
/// A vote without a signature is a placeholder meaning "no vote cast"; such
/// votes exist only as the initial rows of a vote set and are never accepted
/// from the network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    /// Target chain height.
    pub height: u64,
    /// Target consensus round.
    pub round: u32,
    /// The block being voted for, if any.
    pub block_hash: Option<BlockHash>,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// The validator that cast this vote.
    pub validator: PublicKey,
    /// Stage marker.
    pub flag: VoteFlag,
    /// Detached signature over [`Vote::signing_bytes`]; `None` for
    /// placeholders.
    pub signature: Option<Signature>,
}

impl Vote {
    /// The unsigned Null placeholder a vote set row starts from.
    pub fn nil_placeholder(
        height: u64,
        round: u32,
        block_hash: Option<BlockHash>,
        validator: PublicKey,
    ) -> Self {
        Vote {
            height,
            round,
            block_hash,
            timestamp_ms: 0,
            validator,
            flag: VoteFlag::Null,
            signature: None,
        }
    }

    /// Create and sign a vote with the given keypair.
    pub fn signed(
        height: u64,
        round: u32,
        block_hash: Option<BlockHash>,
        timestamp_ms: u64,
        flag: VoteFlag,
        keypair: &KeyPair,
    ) -> Self {
        let mut vote = Vote {
            height,
            round,
            block_hash,
            timestamp_ms,
            validator: keypair.public(),
            flag,
            signature: None,
        };
        vote.signature = Some(keypair.sign(&vote.signing_bytes()));
        vote
    }

    /// Whether a signature is attached.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// The canonical domain-separated byte encoding this vote signs.
    pub fn signing_bytes(&self) -> Vec<u8> {
        vote_signing_message(
            self.height,
            self.round,
            self.block_hash.as_ref(),
            self.timestamp_ms,
            &self.validator,
            self.flag,
        )
    }

    /// Verify the attached signature against the embedded validator key.
    ///
    /// Unsigned votes never verify.
    pub fn verify(&self) -> bool {
        match &self.signature {
            Some(sig) => self.validator.verify(&self.signing_bytes(), sig),
            None => false,
        }
    }
}
