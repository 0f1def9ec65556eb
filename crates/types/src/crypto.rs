//! Ed25519 key and signature wrappers.
//!
//! Thin newtypes around `ed25519-dalek` so the rest of the workspace never
//! handles raw dalek types. Public keys store their compressed bytes, which
//! keeps them `Copy` and usable as ordered map keys.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::RngCore;
use std::fmt;

/// An Ed25519 public key identifying a validator or peer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Number of bytes in a compressed public key.
    pub const LEN: usize = 32;

    /// Construct from raw compressed-point bytes.
    ///
    /// The bytes are not validated here; an unparseable key simply fails
    /// every signature verification.
    pub fn from_raw(raw: [u8; 32]) -> Self {
        PublicKey(raw)
    }

    /// Construct from a byte slice of exactly 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let raw: [u8; 32] = slice.try_into().ok()?;
        Some(PublicKey(raw))
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verify `signature` over `message` against this key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify_strict(message, &sig).is_ok()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &hex::encode(self.0)[..8])
    }
}

/// A detached Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    /// Number of bytes in a signature.
    pub const LEN: usize = 64;

    /// Construct from raw signature bytes.
    pub fn from_raw(raw: [u8; 64]) -> Self {
        Signature(raw)
    }

    /// Construct from a byte slice of exactly 64 bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let raw: [u8; 64] = slice.try_into().ok()?;
        Some(Signature(raw))
    }

    /// The raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sig:{}", &hex::encode(self.0)[..8])
    }
}

/// An Ed25519 signing key with its derived public half.
pub struct KeyPair {
    signing: SigningKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh keypair from the given randomness source.
    pub fn generate<R: RngCore>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    /// Derive a keypair deterministically from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(&seed);
        let public = PublicKey(signing.verifying_key().to_bytes());
        KeyPair { signing, public }
    }

    /// The public half of this keypair.
    pub fn public(&self) -> PublicKey {
        self.public
    }

    /// Sign `message` with this key.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing.sign(message).to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
