//! 32-byte hashes and the identifiers derived from them.

use sha2::{Digest, Sha256};
use std::fmt;

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash32([u8; 32]);

impl Hash32 {
    /// The all-zero hash.
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    /// Number of bytes in a hash.
    pub const LEN: usize = 32;

    /// Hash arbitrary input data.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Hash32(hasher.finalize().into())
    }

    /// Construct from an already-computed digest.
    pub fn from_raw(raw: [u8; 32]) -> Self {
        Hash32(raw)
    }

    /// Construct from a byte slice, returning `None` unless it is exactly
    /// 32 bytes long.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let raw: [u8; 32] = slice.try_into().ok()?;
        Some(Hash32(raw))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable.
        write!(f, "{}", &hex::encode(self.0)[..8])
    }
}

macro_rules! hash_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub Hash32);

        impl $name {
            /// Hash arbitrary input data.
            pub fn from_bytes(data: &[u8]) -> Self {
                $name(Hash32::from_bytes(data))
            }

            /// Construct from an already-computed digest.
            pub fn from_raw(raw: [u8; 32]) -> Self {
                $name(Hash32::from_raw(raw))
            }

            /// Construct from a byte slice of exactly 32 bytes.
            pub fn from_slice(slice: &[u8]) -> Option<Self> {
                Hash32::from_slice(slice).map($name)
            }

            /// The raw digest bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                self.0.as_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(&self.0, f)
            }
        }
    };
}

hash_newtype! {
    /// Content-derived identifier of a network message.
    ///
    /// Computed over a message's kind tag and serialized frames, so equal
    /// frames always produce equal identifiers.
    MessageId
}

hash_newtype! {
    /// Hash of a proposed block.
    BlockHash
}
