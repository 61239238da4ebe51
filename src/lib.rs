//! # mbus-cdc
//!
//! A portable, no_std Rust codec for the Alpine M-Bus, the single-wire bus that
//! head-units use to control an external CD changer. It lets a microcontroller
//! pose as the changer.
//!
//! This crate implements the bus in software using:
//! - `embedded-hal` traits for digital I/O and pulse timing
//! - a [`MicrosClock`](platform::MicrosClock) to measure incoming pulses
//! - nibble framing with leading-zero suppression and a parity nibble
//! - the CD-changer message layouts (play status, disc change, disc info, errors)
//!
//! ## Crate features
//! | Feature                | Description |
//! |------------------------|-------------|
//! | `std`                  | Disables `#![no_std]` support |
//! | `global-bus` (default) | Helpers to share one bus through `critical_section` |
//! | `defmt-0-3`            | Uses `defmt` logging |
//! | `log`                  | Uses `log` logging |
//!
//! ## Software Features
//!
//! - **Transmitter and receiver** in pure software (no UART, timer capture or DMA)
//! - Pulse-width bit encoding: 600 µs HIGH for `0`, 1800 µs HIGH for `1`, 3 ms per bit
//! - Parity-checked frames of up to 16 data nibbles
//! - Encoders and decoders for every changer status message, plus inbound
//!   head-unit command recognition
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mbus_cdc::driver::MBus;
//! use mbus_cdc::message::{ChangingStatus, Command, PlayState};
//!
//! let mut bus = MBus::new(tx_pin, rx_pin, delay, micros);
//! bus.send_init();
//! loop {
//!     match bus.receive_command() {
//!         Some(Command::Ping) => bus.send_ping_ok(),
//!         Some(Command::SelectDiscTrack(change)) => {
//!             bus.send_changing_disc(change.disc, change.track, ChangingStatus::Done)?;
//!         }
//!         Some(Command::Play) => bus.send_playing_track(1, 0, PlayState::Playing)?,
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Integration Notes
//!
//! - Both directions busy-wait on the calling thread; nothing else may use the line
//!   pair while a call is running
//! - The receiver only starts when the input reads LOW at call time, so poll it often
//! - Received values are only as wide as what was sent: leading zero nibbles never
//!   travel, so decode them with the decoder of the message you expect
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "global-bus")]
pub use critical_section;

#[macro_use]
mod fmt;

pub mod bit;
pub mod consts;
pub mod driver;
pub mod error;
pub mod frame;
#[cfg(feature = "global-bus")]
pub mod global;
pub mod message;
pub mod platform;
#[cfg(test)]
mod sim;

pub use driver::MBus;
pub use error::{FrameError, MessageError};
