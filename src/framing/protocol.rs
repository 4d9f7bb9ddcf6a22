//! # Frame Layout
//!
//! ```text
//! +----------------+-----------------+----------------+
//! | length (u32 BE)| payload (N)     | crc32 (u32 BE) |
//! +----------------+-----------------+----------------+
//! ```
//!
//! The checksum covers the length field and the payload.

/// Size of the big-endian payload length prefix
pub const FRAME_LENGTH_SIZE: usize = 4;

/// Size of the trailing CRC-32
pub const FRAME_CRC_SIZE: usize = 4;

/// Envelope overhead added to every payload
pub const FRAME_OVERHEAD: usize = FRAME_LENGTH_SIZE + FRAME_CRC_SIZE;

/// Largest UDP payload over IPv4 (65535 - 8 byte UDP header - 20 byte IP header)
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Largest payload that still fits one datagram once framed
pub const MAX_PAYLOAD_SIZE: usize = MAX_DATAGRAM_SIZE - FRAME_OVERHEAD;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overhead() {
        assert_eq!(FRAME_OVERHEAD, 8);
        assert_eq!(MAX_PAYLOAD_SIZE, 65_499);
    }
}
