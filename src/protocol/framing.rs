use byteorder::{ByteOrder, LittleEndian};

use super::{FrameError, LEN_PREFIX_SIZE};

/// Build the 4-byte little-endian prefix for a payload of `len` bytes.
pub fn frame_prefix(len: usize) -> Result<[u8; LEN_PREFIX_SIZE], FrameError> {
    let len32 = u32::try_from(len).map_err(|_| FrameError::TooLarge {
        max: u32::MAX as usize,
        actual: len,
    })?;
    let mut prefix = [0u8; LEN_PREFIX_SIZE];
    LittleEndian::write_u32(&mut prefix, len32);
    Ok(prefix)
}

/// Prepend the length prefix: [len u32 LE][payload...].
///
/// `max_payload` is the largest payload a receiver is configured to accept.
pub fn encode_frame(payload: &[u8], max_payload: usize) -> Result<Vec<u8>, FrameError> {
    if payload.len() > max_payload {
        return Err(FrameError::TooLarge {
            max: max_payload,
            actual: payload.len(),
        });
    }
    let prefix = frame_prefix(payload.len())?;
    let mut out = Vec::with_capacity(LEN_PREFIX_SIZE + payload.len());
    out.extend_from_slice(&prefix);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Read the declared payload length, if a whole prefix is present.
pub fn peek_len(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < LEN_PREFIX_SIZE {
        return None;
    }
    Some(LittleEndian::read_u32(&bytes[..LEN_PREFIX_SIZE]) as usize)
}

/// Split one complete frame off the front of `bytes`.
///
/// Returns the payload and the remaining bytes after the frame.
pub fn decode_frame(bytes: &[u8]) -> Result<(&[u8], &[u8]), FrameError> {
    let Some(len) = peek_len(bytes) else {
        return Err(FrameError::Truncated {
            needed: LEN_PREFIX_SIZE,
            available: bytes.len(),
        });
    };
    let total = LEN_PREFIX_SIZE.saturating_add(len);
    if bytes.len() < total {
        return Err(FrameError::Truncated {
            needed: total,
            available: bytes.len(),
        });
    }
    Ok((&bytes[LEN_PREFIX_SIZE..total], &bytes[total..]))
}
