//! Platform timing glue.
//!
//! Pins and delays come straight from `embedded-hal`; the only thing it lacks is a
//! free-running clock, which the receiver needs to measure pulse lengths.

/// A monotonic microsecond clock.
///
/// The counter is allowed to wrap; the driver only ever looks at differences
/// computed with `wrapping_sub`, so a 32-bit counter (about 71 minutes) is enough.
///
/// # Example
/// ```rust
/// use mbus_cdc::platform::MicrosClock;
///
/// struct Timer2 {
///     ticks: u32,
/// }
///
/// impl MicrosClock for Timer2 {
///     fn now_us(&mut self) -> u32 {
///         self.ticks = self.ticks.wrapping_add(4);
///         self.ticks
///     }
/// }
/// ```
pub trait MicrosClock {
    /// Current time in microseconds.
    fn now_us(&mut self) -> u32;
}

impl<C: MicrosClock + ?Sized> MicrosClock for &mut C {
    fn now_us(&mut self) -> u32 {
        (**self).now_us()
    }
}

/// Microseconds elapsed from `since` to `now`, tolerating one counter wrap.
pub const fn elapsed_us(since: u32, now: u32) -> u32 {
    now.wrapping_sub(since)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_handles_wrap() {
        assert_eq!(elapsed_us(100, 350), 250);
        assert_eq!(elapsed_us(u32::MAX - 9, 10), 20);
    }
}
