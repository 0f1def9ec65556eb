//! Core types for the Quorumcast consensus network.
//!
//! This crate provides the foundational types used throughout the gossip and
//! consensus layers:
//!
//! - **Primitives**: [`Hash32`] and the content-derived identifiers built on it
//! - **Crypto**: [`KeyPair`], [`PublicKey`], [`Signature`] (Ed25519)
//! - **Network identity**: [`Peer`]
//! - **Consensus**: [`Vote`], [`VoteFlag`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod crypto;
mod hash;
mod peer;
mod signing;
mod vote;

pub use crypto::{KeyPair, PublicKey, Signature};
pub use hash::{BlockHash, Hash32, MessageId};
pub use peer::Peer;
pub use signing::{vote_signing_message, DOMAIN_VOTE};
pub use vote::{Vote, VoteFlag};
