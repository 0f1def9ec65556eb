//! Frame-level decoding helpers.
//!
//! Malformed frames are the one hard-failure class in this layer: a frame
//! sequence that does not match the expected count or widths surfaces as a
//! [`CodecError`] to the caller instead of being silently dropped.

use quorumcast_types::{BlockHash, MessageId, PublicKey, Signature};
use thiserror::Error;

/// Reserved sentinel byte standing in for an absent hash or signature frame.
///
/// An optional frame is distinguished by length: 32 (or 64) bytes of payload
/// versus this single byte.
pub const NIL_FRAME: u8 = 0x78;

/// Errors raised while reconstructing a message from wire frames.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty frame sequence")]
    Empty,

    #[error("unknown message kind {0:#04x}")]
    UnknownKind(u8),

    #[error("expected {expected} frames, got {got}")]
    FrameCount { expected: usize, got: usize },

    #[error("frame {index} has width {got}, expected {expected}")]
    FrameWidth {
        index: usize,
        expected: usize,
        got: usize,
    },

    #[error("frame {index} carries an invalid value")]
    InvalidValue { index: usize },
}

fn check_width(frames: &[Vec<u8>], index: usize, expected: usize) -> Result<&[u8], CodecError> {
    let frame = &frames[index];
    if frame.len() != expected {
        return Err(CodecError::FrameWidth {
            index,
            expected,
            got: frame.len(),
        });
    }
    Ok(frame)
}

pub(crate) fn check_count(frames: &[Vec<u8>], expected: usize) -> Result<(), CodecError> {
    if frames.len() != expected {
        return Err(CodecError::FrameCount {
            expected,
            got: frames.len(),
        });
    }
    Ok(())
}

pub(crate) fn read_u64(frames: &[Vec<u8>], index: usize) -> Result<u64, CodecError> {
    let frame = check_width(frames, index, 8)?;
    Ok(u64::from_le_bytes(frame.try_into().expect("width checked")))
}

pub(crate) fn read_u32(frames: &[Vec<u8>], index: usize) -> Result<u32, CodecError> {
    let frame = check_width(frames, index, 4)?;
    Ok(u32::from_le_bytes(frame.try_into().expect("width checked")))
}

pub(crate) fn read_i32(frames: &[Vec<u8>], index: usize) -> Result<i32, CodecError> {
    let frame = check_width(frames, index, 4)?;
    Ok(i32::from_le_bytes(frame.try_into().expect("width checked")))
}

pub(crate) fn read_byte(frames: &[Vec<u8>], index: usize) -> Result<u8, CodecError> {
    let frame = check_width(frames, index, 1)?;
    Ok(frame[0])
}

pub(crate) fn read_key(frames: &[Vec<u8>], index: usize) -> Result<PublicKey, CodecError> {
    let frame = check_width(frames, index, PublicKey::LEN)?;
    PublicKey::from_slice(frame).ok_or(CodecError::FrameWidth {
        index,
        expected: PublicKey::LEN,
        got: frame.len(),
    })
}

pub(crate) fn read_message_id(frames: &[Vec<u8>], index: usize) -> Result<MessageId, CodecError> {
    let frame = check_width(frames, index, 32)?;
    MessageId::from_slice(frame).ok_or(CodecError::FrameWidth {
        index,
        expected: 32,
        got: frame.len(),
    })
}

/// Frame of either a 32-byte block hash or the single nil sentinel byte.
pub(crate) fn read_hash_or_nil(
    frames: &[Vec<u8>],
    index: usize,
) -> Result<Option<BlockHash>, CodecError> {
    let frame = &frames[index];
    match frame.len() {
        1 if frame[0] == NIL_FRAME => Ok(None),
        32 => Ok(BlockHash::from_slice(frame)),
        got => Err(CodecError::FrameWidth {
            index,
            expected: 32,
            got,
        }),
    }
}

pub(crate) fn write_hash_or_nil(hash: Option<&BlockHash>) -> Vec<u8> {
    match hash {
        Some(hash) => hash.as_bytes().to_vec(),
        None => vec![NIL_FRAME],
    }
}

/// Frame of either a 64-byte signature or the single nil sentinel byte.
pub(crate) fn read_signature_or_nil(
    frames: &[Vec<u8>],
    index: usize,
) -> Result<Option<Signature>, CodecError> {
    let frame = &frames[index];
    match frame.len() {
        1 if frame[0] == NIL_FRAME => Ok(None),
        64 => Ok(Signature::from_slice(frame)),
        got => Err(CodecError::FrameWidth {
            index,
            expected: Signature::LEN,
            got,
        }),
    }
}

pub(crate) fn write_signature_or_nil(signature: Option<&Signature>) -> Vec<u8> {
    match signature {
        Some(sig) => sig.as_bytes().to_vec(),
        None => vec![NIL_FRAME],
    }
}
