//! # Frame Encoder
//!
//! Wraps a payload into a length + CRC-32 envelope.

use bytes::{BufMut, Bytes, BytesMut};

use super::crc::crc32;
use super::protocol::*;

/// Encode a payload into a complete frame
///
/// # Arguments
///
/// * `payload` - Serialized message bytes
///
/// # Returns
///
/// * `Bytes` - Frame of `payload.len() + 8` bytes: length, payload, CRC
///
/// # Examples
///
/// ```
/// use uav_commander::framing::encode;
///
/// let frame = encode(b"hello");
/// assert_eq!(frame.len(), 13);
/// assert_eq!(&frame[..4], &[0, 0, 0, 5]);
/// ```
pub fn encode(payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(payload.len() + FRAME_OVERHEAD);
    frame.put_u32(payload.len() as u32);
    frame.put_slice(payload);

    // CRC over Length + Payload
    let crc = crc32(&frame);
    frame.put_u32(crc);

    frame.freeze()
}
