//! Physical bit encoding for the M-Bus line.
//!
//! Each bit occupies a fixed 3 ms slot: a HIGH pulse whose length carries the value,
//! followed by a LOW gap that pads the slot.
//!
//! | Bit | HIGH    | LOW     |
//! |-----|---------|---------|
//! | `0` | 600 µs  | 2400 µs |
//! | `1` | 1800 µs | 1200 µs |
//!
//! On the receiving side the line is seen through the bus transistor, so a pulse
//! shows up as a LOW period. [`Bit::classify`] sorts the time measured from the start
//! of that LOW period until the line reads HIGH again.

use crate::consts::{
    ONE_HIGH_US, ONE_LOW_US, RX_ONE_MIN_US, RX_ZERO_MIN_US, ZERO_HIGH_US, ZERO_LOW_US,
};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

/// A single logical bit on the wire.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Bit {
    /// Short pulse.
    Zero,
    /// Long pulse.
    One,
}

impl Bit {
    /// Returns the `(high_us, low_us)` pulse pair used to transmit this bit.
    pub const fn pulse(self) -> (u32, u32) {
        match self {
            Bit::Zero => (ZERO_HIGH_US, ZERO_LOW_US),
            Bit::One => (ONE_HIGH_US, ONE_LOW_US),
        }
    }

    /// Classifies a pulse measurement in microseconds.
    ///
    /// Both bounds are open: exactly 600 µs and exactly 1400 µs return `None`, as do
    /// shorter measurements, which are treated as noise.
    pub const fn classify(elapsed_us: u32) -> Option<Bit> {
        if elapsed_us > RX_ZERO_MIN_US && elapsed_us < RX_ONE_MIN_US {
            Some(Bit::Zero)
        } else if elapsed_us > RX_ONE_MIN_US {
            Some(Bit::One)
        } else {
            None
        }
    }

    /// Returns bit `index` (0 = LSB) of `nibble`.
    pub const fn of_nibble(nibble: u8, index: u8) -> Bit {
        if (nibble >> index) & 1 == 1 {
            Bit::One
        } else {
            Bit::Zero
        }
    }

    /// The bit as `0` or `1`.
    pub const fn value(self) -> u8 {
        match self {
            Bit::Zero => 0,
            Bit::One => 1,
        }
    }
}

/// Drives one bit onto `tx`, blocking for the full bit period.
///
/// HAL errors from the pin are ignored; GPIO writes on the targets this runs on are
/// infallible.
pub fn write_bit<TX, D>(tx: &mut TX, delay: &mut D, bit: Bit)
where
    TX: OutputPin,
    D: DelayNs,
{
    let (high_us, low_us) = bit.pulse();
    let _ = tx.set_high();
    delay.delay_us(high_us);
    let _ = tx.set_low();
    delay.delay_us(low_us);
}

/// Drives the low four bits of `nibble` onto `tx`, most significant bit first.
pub fn write_nibble<TX, D>(tx: &mut TX, delay: &mut D, nibble: u8)
where
    TX: OutputPin,
    D: DelayNs,
{
    for index in (0..4).rev() {
        write_bit(tx, delay, Bit::of_nibble(nibble, index));
    }
}
