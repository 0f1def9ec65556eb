//! Per-round vote collection and supermajority detection.

use parking_lot::Mutex;
use quorumcast_types::{BlockHash, PublicKey, Vote, VoteFlag};
use std::collections::HashMap;
use tracing::trace;

/// A collection of votes for one (height, round).
///
/// The validator set is fixed at construction and defines both the iteration
/// order of [`VoteSet::votes`] and the quorum denominator. Every validator
/// always has exactly one recorded vote, initialized to an unsigned Null
/// placeholder; [`VoteSet::add`] is the only mutation path.
///
/// The whole validate-then-write sequence of `add` runs under one lock, and
/// the supermajority queries take the same lock, so a query never observes a
/// vote map mid-update.
pub struct VoteSet {
    height: u64,
    round: u32,
    validator_set: Vec<PublicKey>,
    votes: Mutex<HashMap<PublicKey, Vote>>,
}

impl VoteSet {
    /// Create a vote set for the given (height, round) target.
    ///
    /// `block_hash` is the value the round is trying to decide; it seeds the
    /// placeholder rows only and places no constraint on incoming votes.
    /// The order of `validators` is preserved.
    pub fn new(
        height: u64,
        round: u32,
        block_hash: Option<BlockHash>,
        validators: impl IntoIterator<Item = PublicKey>,
    ) -> Self {
        let validator_set: Vec<PublicKey> = validators.into_iter().collect();
        let votes = validator_set
            .iter()
            .map(|&validator| {
                (
                    validator,
                    Vote::nil_placeholder(height, round, block_hash, validator),
                )
            })
            .collect();
        VoteSet {
            height,
            round,
            validator_set,
            votes: Mutex::new(votes),
        }
    }

    /// Target height.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Target round.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// The fixed, ordered validator set.
    pub fn validator_set(&self) -> &[PublicKey] {
        &self.validator_set
    }

    /// Snapshot of the recorded votes, in validator-set order.
    pub fn votes(&self) -> Vec<Vote> {
        let votes = self.votes.lock();
        self.validator_set
            .iter()
            .map(|validator| votes[validator].clone())
            .collect()
    }

    /// Validate and record a vote.
    ///
    /// Returns `false` without mutating anything if the vote is unsigned,
    /// fails signature verification, comes from a non-member, targets a
    /// different height or round, or would downgrade the validator's
    /// recorded flag. On success the validator's stored vote is replaced.
    pub fn add(&self, vote: Vote) -> bool {
        let mut votes = self.votes.lock();
        if !self.is_vote_valid(&votes, &vote) {
            trace!(
                height = vote.height,
                round = vote.round,
                validator = ?vote.validator,
                flag = ?vote.flag,
                "rejected vote"
            );
            return false;
        }
        votes.insert(vote.validator, vote);
        true
    }

    /// Whether more than two thirds of the validator set cast any signed
    /// vote, regardless of flag.
    pub fn has_two_third_any(&self) -> bool {
        self.count_exceeds_two_thirds(|vote| vote.is_signed())
    }

    /// Whether more than two thirds of the validator set cast a signed
    /// prevote ([`VoteFlag::Absent`]).
    pub fn has_two_third_prevote(&self) -> bool {
        self.count_exceeds_two_thirds(|vote| vote.is_signed() && vote.flag == VoteFlag::Absent)
    }

    /// Whether more than two thirds of the validator set cast a signed
    /// commit vote ([`VoteFlag::Commit`]).
    pub fn has_two_third_commit(&self) -> bool {
        self.count_exceeds_two_thirds(|vote| vote.is_signed() && vote.flag == VoteFlag::Commit)
    }

    /// Strict real-number comparison against 2N/3, so e.g. N=3 needs 3
    /// matching votes while N=4 needs only 3.
    fn count_exceeds_two_thirds(&self, matches: impl Fn(&Vote) -> bool) -> bool {
        let votes = self.votes.lock();
        let count = votes.values().filter(|vote| matches(vote)).count();
        let two_thirds = self.validator_set.len() as f64 * 2.0 / 3.0;
        count as f64 > two_thirds
    }

    fn is_vote_valid(&self, votes: &HashMap<PublicKey, Vote>, vote: &Vote) -> bool {
        if !vote.is_signed() {
            return false;
        }
        if !vote.verify() {
            return false;
        }
        let Some(current) = votes.get(&vote.validator) else {
            // The voter is not a validator.
            return false;
        };
        if vote.height != self.height {
            return false;
        }
        if vote.round != self.round {
            return false;
        }
        if vote.flag < current.flag {
            return false;
        }
        true
    }
}
