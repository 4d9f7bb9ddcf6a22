//! # Frame Decoder
//!
//! Verifies a received frame and extracts its payload.

use bytes::Buf;

use super::crc::crc32;
use super::protocol::*;
use crate::error::FrameError;

/// Decode a complete frame
///
/// # Arguments
///
/// * `frame` - Complete frame bytes (length, payload, CRC)
///
/// # Returns
///
/// * `Result<&[u8], FrameError>` - The verified payload, borrowed from `frame`
///
/// # Errors
///
/// - `Truncated` if the frame is shorter than the envelope or than its
///   declared length
/// - `ChecksumMismatch` if the CRC does not match, or if bytes trail the
///   declared frame
pub fn decode(frame: &[u8]) -> Result<&[u8], FrameError> {
    if frame.len() < FRAME_OVERHEAD {
        return Err(FrameError::Truncated {
            expected: FRAME_OVERHEAD,
            actual: frame.len(),
        });
    }

    let mut header = &frame[..FRAME_LENGTH_SIZE];
    let declared = header.get_u32() as usize;

    let expected = declared.saturating_add(FRAME_OVERHEAD);
    if frame.len() < expected {
        return Err(FrameError::Truncated {
            expected,
            actual: frame.len(),
        });
    }

    let crc_start = FRAME_LENGTH_SIZE + declared;
    let computed = crc32(&frame[..crc_start]);
    let mut trailer = &frame[crc_start..expected];
    let received = trailer.get_u32();

    if computed != received {
        return Err(FrameError::ChecksumMismatch { computed, received });
    }

    // Trailing bytes are not covered by the checksum
    if frame.len() > expected {
        let mut tail = &frame[frame.len() - FRAME_CRC_SIZE..];
        return Err(FrameError::ChecksumMismatch {
            computed: crc32(&frame[..frame.len() - FRAME_CRC_SIZE]),
            received: tail.get_u32(),
        });
    }

    Ok(&frame[FRAME_LENGTH_SIZE..crc_start])
}
