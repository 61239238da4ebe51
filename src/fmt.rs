//! Logging shims.
//!
//! Routes to `defmt` when `defmt-0-3` is enabled, to `log` when `log` is enabled, and
//! type-checks the arguments without emitting anything otherwise. Format strings must
//! stay within the syntax both backends accept (`{}`, `{:x}`, `{:?}`).

#[cfg(feature = "defmt-0-3")]
macro_rules! trace {
    ($($arg:tt)*) => { ::defmt::trace!($($arg)*) };
}

#[cfg(all(feature = "log", not(feature = "defmt-0-3")))]
macro_rules! trace {
    ($($arg:tt)*) => { ::log::trace!($($arg)*) };
}

#[cfg(not(any(feature = "log", feature = "defmt-0-3")))]
macro_rules! trace {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

#[cfg(feature = "defmt-0-3")]
macro_rules! debug {
    ($($arg:tt)*) => { ::defmt::debug!($($arg)*) };
}

#[cfg(all(feature = "log", not(feature = "defmt-0-3")))]
macro_rules! debug {
    ($($arg:tt)*) => { ::log::debug!($($arg)*) };
}

#[cfg(not(any(feature = "log", feature = "defmt-0-3")))]
macro_rules! debug {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

#[cfg(feature = "defmt-0-3")]
macro_rules! warn {
    ($($arg:tt)*) => { ::defmt::warn!($($arg)*) };
}

#[cfg(all(feature = "log", not(feature = "defmt-0-3")))]
macro_rules! warn {
    ($($arg:tt)*) => { ::log::warn!($($arg)*) };
}

#[cfg(not(any(feature = "log", feature = "defmt-0-3")))]
macro_rules! warn {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}
