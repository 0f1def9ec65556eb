//! Domain-separated signing messages.
//!
//! Every signature in the protocol covers a domain tag followed by a
//! canonical field encoding, so a signature produced for one message class
//! can never verify as another.

use crate::{BlockHash, PublicKey, VoteFlag};

/// Domain separator for consensus votes.
pub const DOMAIN_VOTE: &[u8] = b"quorumcast-vote-v1:";

/// Build the canonical signing message for a vote.
///
/// Field order is fixed: height, round, block hash (zero hash when absent,
/// disambiguated by the presence byte), timestamp, validator key, flag.
pub fn vote_signing_message(
    height: u64,
    round: u32,
    block_hash: Option<&BlockHash>,
    timestamp_ms: u64,
    validator: &PublicKey,
    flag: VoteFlag,
) -> Vec<u8> {
    let mut msg = Vec::with_capacity(DOMAIN_VOTE.len() + 8 + 4 + 1 + 32 + 8 + 32 + 1);
    msg.extend_from_slice(DOMAIN_VOTE);
    msg.extend_from_slice(&height.to_le_bytes());
    msg.extend_from_slice(&round.to_le_bytes());
    match block_hash {
        Some(hash) => {
            msg.push(1);
            msg.extend_from_slice(hash.as_bytes());
        }
        None => {
            msg.push(0);
            msg.extend_from_slice(&[0u8; 32]);
        }
    }
    msg.extend_from_slice(&timestamp_ms.to_le_bytes());
    msg.extend_from_slice(validator.as_bytes());
    msg.push(flag.as_byte());
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_hash_differs_from_zero_hash() {
        let validator = PublicKey::from_raw([1u8; 32]);
        let zero = BlockHash::from_raw([0u8; 32]);
        let without = vote_signing_message(1, 0, None, 0, &validator, VoteFlag::Commit);
        let with_zero =
            vote_signing_message(1, 0, Some(&zero), 0, &validator, VoteFlag::Commit);
        assert_ne!(without, with_zero);
    }

    #[test]
    fn flag_changes_message() {
        let validator = PublicKey::from_raw([1u8; 32]);
        let absent = vote_signing_message(1, 0, None, 0, &validator, VoteFlag::Absent);
        let commit = vote_signing_message(1, 0, None, 0, &validator, VoteFlag::Commit);
        assert_ne!(absent, commit);
    }
}
