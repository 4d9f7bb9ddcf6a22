//! # Framing Module
//!
//! Length and checksum envelope wrapped around every datagram exchanged with
//! the ground client.
//!
//! This module handles:
//! - Frame layout constants
//! - CRC-32 checksum calculation
//! - Wrapping payloads into frames
//! - Verifying and unwrapping received frames

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod crc;

pub use decoder::decode;
pub use encoder::encode;
