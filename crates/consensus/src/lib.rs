//! Quorum certification for Quorumcast consensus rounds.
//!
//! Each consensus round owns a [`VoteSet`]: the structure that validates
//! incoming votes from the network and answers whether a two-thirds
//! supermajority of the round's validator set has been reached.

mod vote_set;

pub use vote_set::VoteSet;
