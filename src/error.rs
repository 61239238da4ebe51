//! Error types for frame reception and message encoding/decoding.
//!
//! None of these are fatal. [`MBus::receive()`](crate::driver::MBus::receive) folds every
//! [`FrameError`] into `None` after logging it; use
//! [`MBus::poll_receive()`](crate::driver::MBus::poll_receive) to see the cause.

/// Why a received pulse train was not accepted as a frame.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum FrameError {
    /// The number of received bits is zero, not a whole number of nibbles, or
    /// longer than the largest possible frame.
    #[error("framing error ({bits} bits received)")]
    Framing {
        /// Number of bits registered before the window closed.
        bits: u16,
    },

    /// The trailing parity nibble does not match the received data.
    #[error("parity mismatch (expected {expected:#x}, received {received:#x})")]
    Parity {
        /// Parity computed over the received data nibbles.
        expected: u8,
        /// Parity nibble found at the end of the frame.
        received: u8,
    },

    /// The line was held LOW for a whole receive window and no pulse arrived.
    #[error("receive window elapsed without a pulse")]
    Timeout,
}

/// Why a message could not be built from, or decoded into, CD-changer fields.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum MessageError {
    /// A field value does not fit its BCD slots.
    #[error("{field} out of range ({value}, max {max})")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Value that was given.
        value: u16,
        /// Largest accepted value.
        max: u16,
    },

    /// The message does not start with the header expected for its type.
    #[error("unexpected message header ({message:#x})")]
    HeaderMismatch {
        /// The whole message as received.
        message: u64,
    },

    /// A nibble that must hold a BCD digit or a known code holds something else.
    #[error("invalid {field} nibble ({value:#x})")]
    InvalidDigit {
        /// Name of the field the nibble belongs to.
        field: &'static str,
        /// The nibble value found.
        value: u8,
    },

    /// The message is not a known head-unit command.
    #[error("unknown command ({message:#x})")]
    UnknownCommand {
        /// The whole message as received.
        message: u64,
    },
}
