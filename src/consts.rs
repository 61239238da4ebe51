//! Constants used across the M-Bus protocol implementation.
//!
//! This module defines the bit timing of the physical layer, the frame limits,
//! and the opcode templates of the CD-changer messages.
//!
//! ## Key Concepts
//!
//! - **Bit timing**: every bit is one HIGH pulse followed by a LOW gap, 3 ms in total.
//!   The length of the HIGH pulse carries the value.
//! - **Receive thresholds**: the receiver measures how long the line stays LOW after a
//!   bit window opens and sorts the measurement against two thresholds.
//! - **Templates**: each outbound message starts from a fixed value and has its
//!   fields OR-ed in at fixed nibble offsets (offset 0 is the least-significant nibble).
//! - **Commands**: inbound head-unit commands are recognised by their exact value.
//!
//! These values are shared by the transmit and receive paths, so both sides of a
//! loopback agree on the same timing.

/// Duration (µs) of the HIGH pulse for a logical `0`.
pub const ZERO_HIGH_US: u32 = 600;

/// Duration (µs) of the LOW gap following a logical `0`.
pub const ZERO_LOW_US: u32 = 2_400;

/// Duration (µs) of the HIGH pulse for a logical `1`.
pub const ONE_HIGH_US: u32 = 1_800;

/// Duration (µs) of the LOW gap following a logical `1`.
pub const ONE_LOW_US: u32 = 1_200;

/// Total duration (µs) of one bit on the wire, whatever its value.
pub const BIT_PERIOD_US: u32 = 3_000;

/// Lower bound (exclusive, µs) of a measurement that decodes as a `0`.
///
/// Anything at or below this is treated as noise.
pub const RX_ZERO_MIN_US: u32 = 600;

/// Upper bound (exclusive, µs) of a `0`, and lower bound (exclusive) of a `1`.
pub const RX_ONE_MIN_US: u32 = 1_400;

/// Length (µs) of a receive window. The receiver gives up when no new bit window
/// opens within this time.
pub const RX_WINDOW_US: u32 = 4_000;

/// Number of data nibbles in a message.
pub const DATA_NIBBLES: usize = 16;

/// Number of nibbles in the longest frame: every data nibble plus parity.
pub const MAX_FRAME_NIBBLES: usize = DATA_NIBBLES + 1;

/// Number of bits in the longest frame.
pub const MAX_FRAME_BITS: u16 = (MAX_FRAME_NIBBLES * 4) as u16;

/// Template of the playing-track status message.
pub const PLAYING_TRACK_TEMPLATE: u64 = 0x990000100000001;

/// Template of the disc change message. The status class nibble selects the meaning.
pub const DISC_CHANGE_TEMPLATE: u64 = 0x9B000000001;

/// Template of the disc info message.
pub const DISC_INFO_TEMPLATE: u64 = 0x9C001000000F;

/// Template of the changer error message.
pub const CHANGER_ERROR_TEMPLATE: u64 = 0x9F00000;

/// "Please wait" reply. Same value as a changer error message reporting no error.
pub const WAIT: u64 = 0x9F00000;

/// Reply to a head-unit ping.
pub const PING_OK: u64 = 0x98;

/// Announces the discs available in the magazine.
pub const AVAILABLE_DISCS: u64 = 0x9D00000000;

/// Initialization handshake, sent in this order after power-up.
pub const INIT_SEQUENCE: [u64; 3] = [0x9A0000000000, AVAILABLE_DISCS, 0x9E0000000];

/// Head-unit ping. Also used as a status request.
pub const CMD_PING: u64 = 0x18;

/// Head-unit play command.
pub const CMD_PLAY: u64 = 0x11101;

/// Head-unit pause command.
pub const CMD_PAUSE: u64 = 0x11102;

/// Head-unit stop command.
pub const CMD_STOP: u64 = 0x11140;

/// Head-unit fast forward command.
pub const CMD_FAST_FORWARD: u64 = 0x11105;

/// Head-unit fast reverse command.
pub const CMD_FAST_REVERSE: u64 = 0x11109;

/// Head-unit fast forward command while paused.
pub const CMD_FAST_FORWARD_PAUSED: u64 = 0x11106;

/// Head-unit fast reverse command while paused.
pub const CMD_FAST_REVERSE_PAUSED: u64 = 0x1110A;

/// Head-unit resume command.
pub const CMD_RESUME: u64 = 0x11181;

/// Head-unit resume command, staying paused.
pub const CMD_RESUME_PAUSED: u64 = 0x11182;

/// Head-unit shutdown command.
pub const CMD_SHUTDOWN: u64 = 0x11142;

/// Leading nibbles of a disc/track selection command.
pub const SELECT_PREFIX: u64 = 0x113;
