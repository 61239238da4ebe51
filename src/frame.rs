//! Nibble framing and parity for M-Bus messages.
//!
//! A message is a `u64` read as sixteen 4-bit nibbles, most significant first. On the
//! wire the leading run of zero nibbles is dropped, the remaining nibbles are sent
//! verbatim, and a parity nibble closes the frame:
//!
//! ```text
//! parity = (n15 ^ n14 ^ ... ^ n0) + 1   (mod 16)
//! ```
//!
//! Because the leading zeros never reach the wire, a receiver recovers only the
//! nibbles that were sent. Callers must know which message shape they expect before
//! reading field offsets out of a received value.
//!
//! ## Functions
//!
//! - [`parity`]: parity nibble of a message
//! - [`Frame`]: the nibbles of an outbound frame, parity included
//! - [`FrameReceiver`]: accumulates received bits and validates the frame

use heapless::Vec;

use crate::bit::Bit;
use crate::consts::{DATA_NIBBLES, MAX_FRAME_BITS, MAX_FRAME_NIBBLES};
use crate::error::FrameError;

/// Returns nibble `index` (0 = least significant) of `value`.
pub const fn nibble(value: u64, index: usize) -> u8 {
    ((value >> (index * 4)) & 0xF) as u8
}

/// Computes the parity nibble of a message: the XOR of all 16 data nibbles plus one,
/// wrapping `0xF` to `0x0`.
pub fn parity(message: u64) -> u8 {
    let folded = (0..DATA_NIBBLES).fold(0u8, |acc, i| acc ^ nibble(message, i));
    folded.wrapping_add(1) & 0xF
}

/// The nibbles of one outbound frame, in transmission order, parity last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    nibbles: Vec<u8, MAX_FRAME_NIBBLES>,
}

impl Frame {
    /// Builds the frame for `message`, dropping its leading zero nibbles.
    ///
    /// An all-zero message yields a frame holding only its parity nibble.
    pub fn new(message: u64) -> Self {
        let mut nibbles = Vec::new();
        for i in (0..DATA_NIBBLES).rev() {
            let n = nibble(message, i);
            if n == 0 && nibbles.is_empty() {
                continue;
            }
            // Capacity is one more than the data nibbles, so neither push can fail.
            let _ = nibbles.push(n);
        }
        let _ = nibbles.push(parity(message));
        Self { nibbles }
    }

    /// All nibbles of the frame, parity included.
    pub fn nibbles(&self) -> &[u8] {
        &self.nibbles
    }

    /// The data nibbles actually sent, without parity.
    pub fn data(&self) -> &[u8] {
        &self.nibbles[..self.nibbles.len() - 1]
    }

    /// The trailing parity nibble.
    pub fn parity(&self) -> u8 {
        self.nibbles[self.nibbles.len() - 1]
    }

    /// Number of bits the frame occupies on the wire.
    pub fn bit_len(&self) -> usize {
        self.nibbles.len() * 4
    }

    /// The bits of the frame in transmission order, MSB of each nibble first.
    pub fn bits(&self) -> impl Iterator<Item = Bit> + '_ {
        self.nibbles
            .iter()
            .flat_map(|&n| (0..4).rev().map(move |i| Bit::of_nibble(n, i)))
    }
}

/// Collects received bits into a frame.
///
/// Bits are shifted in from the right. The accumulator is wide enough for the
/// longest frame (16 data nibbles and parity); anything longer is rejected by
/// [`finish`](FrameReceiver::finish).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameReceiver {
    raw: u128,
    bits: u16,
}

impl FrameReceiver {
    /// Creates an empty receiver.
    pub const fn new() -> Self {
        Self { raw: 0, bits: 0 }
    }

    /// Shifts one bit into the frame.
    pub fn push(&mut self, bit: Bit) {
        if self.bits < MAX_FRAME_BITS {
            self.raw = (self.raw << 1) | u128::from(bit.value());
        }
        self.bits = self.bits.saturating_add(1);
    }

    /// Number of bits pushed so far.
    pub fn bit_count(&self) -> u16 {
        self.bits
    }

    /// Validates the collected bits and returns the message without its parity nibble.
    ///
    /// # Errors
    /// - [`FrameError::Framing`] if no bits arrived, the count is not a multiple of 4,
    ///   or the frame is longer than 17 nibbles
    /// - [`FrameError::Parity`] if the last nibble is not the parity of the others
    pub fn finish(self) -> Result<u64, FrameError> {
        if self.bits == 0 || self.bits % 4 != 0 || self.bits > MAX_FRAME_BITS {
            return Err(FrameError::Framing { bits: self.bits });
        }
        let received = (self.raw & 0xF) as u8;
        let data = (self.raw >> 4) as u64;
        let expected = parity(data);
        if expected != received {
            return Err(FrameError::Parity { expected, received });
        }
        Ok(data)
    }
}
