//! M-Bus line driver for CD-changer emulation.
//!
//! This module provides the [`MBus`] struct, which bit-bangs the Alpine M-Bus
//! protocol over one output pin and one input pin. It sends messages as timed
//! pulses and samples the input pin to decode messages coming from the head-unit.
//!
//! Both directions block the calling thread. A transmission takes
//! `(nibbles + 1) * 4 * 3 ms`; a reception returns at most 4 ms after the last pulse.
//!
//! ## Features
//!
//! - Bit-level transmit and receive using pulse-width encoding
//! - Leading-zero suppression and parity on every frame
//! - CD-changer message helpers (`send_playing_track`, `send_disc_info`, ...)
//! - Uses `embedded-hal` for pin and delay abstraction, plus a [`MicrosClock`]
//!
//! ## Example
//!
//! ```rust
//! # use embedded_hal_mock::eh1::digital::{Mock as Pin, State as PinState, Transaction as PinTransaction};
//! # use embedded_hal_mock::eh1::delay::NoopDelay;
//! # struct Clock(u32);
//! # impl mbus_cdc::platform::MicrosClock for Clock {
//! #     fn now_us(&mut self) -> u32 { self.0 += 10; self.0 }
//! # }
//! use mbus_cdc::driver::MBus;
//!
//! fn main() {
//!     # let tx_pin = Pin::new(&[PinTransaction::set(PinState::Low)]);
//!     # let rx_pin = Pin::new(&[PinTransaction::get(PinState::High)]);
//!     let mut bus = MBus::new(tx_pin, rx_pin, NoopDelay::new(), Clock(0));
//!
//!     loop {
//!         if let Some(message) = bus.receive() {
//!             // react to the head-unit
//!             # let _ = message;
//!         }
//!         # break; // For testing purposes
//!     }
//!     # bus.tx.done();
//!     # bus.rx.done();
//! }
//! ```
//!
//! ## Design Notes
//!
//! The receive side sees the bus through the line transistor, so the idle bus reads
//! HIGH and a pulse reads LOW. A reception only starts when the input reads LOW at
//! call time; call [`receive()`](MBus::receive) in a tight loop to catch frames.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::bit::{Bit, write_nibble};
use crate::consts::{AVAILABLE_DISCS, INIT_SEQUENCE, PING_OK, RX_WINDOW_US, WAIT};
use crate::error::{FrameError, MessageError};
use crate::frame::{Frame, FrameReceiver};
use crate::message::{
    ChangerErrorCode, ChangingStatus, Command, DiscChange, DiscInfo, PlayState, PlayingTrack,
};
use crate::platform::{MicrosClock, elapsed_us};

/// A bit-banged M-Bus interface.
///
/// `MBus` owns the line pair for its whole lifetime, so no other code can drive or
/// sample the bus while it exists.
///
/// ## Type Parameters
///
/// - `TX`: output pin driving the bus transistor (HIGH pulls the bus)
/// - `RX`: input pin sampling the bus
/// - `D`: blocking delay used to time transmitted pulses
/// - `C`: microsecond clock used to measure received pulses
///
/// ## Notes
///
/// - HAL errors from the pins are ignored on write and read as LOW on read.
/// - There is no retry at this layer; both calls can simply be repeated.
#[derive(Debug)]
pub struct MBus<TX, RX, D, C>
where
    TX: OutputPin,
    RX: InputPin,
    D: DelayNs,
    C: MicrosClock,
{
    /// Output pin
    pub tx: TX,
    /// Input pin
    pub rx: RX,
    /// Pulse delay provider
    pub delay: D,
    /// Receive clock
    pub clock: C,
}

impl<TX, RX, D, C> MBus<TX, RX, D, C>
where
    TX: OutputPin,
    RX: InputPin,
    D: DelayNs,
    C: MicrosClock,
{
    /// Creates a new `MBus` on the given pins.
    ///
    /// The output pin is driven `LOW` (bus released) before returning.
    pub fn new(tx: TX, rx: RX, delay: D, clock: C) -> Self {
        #[allow(unused_mut)]
        let mut tx = tx;
        let _ = tx.set_low();
        Self {
            tx,
            rx,
            delay,
            clock,
        }
    }

    /// Gives the pins, delay and clock back.
    pub fn release(self) -> (TX, RX, D, C) {
        (self.tx, self.rx, self.delay, self.clock)
    }

    fn line_high(&mut self) -> bool {
        self.rx.is_high().unwrap_or(false)
    }

    /// Sends one message, blocking until the last pulse is out.
    ///
    /// Leading zero nibbles are dropped and the parity nibble is appended; see
    /// [`Frame`].
    pub fn transmit(&mut self, message: u64) {
        debug!("sending: {:x}", message);
        let frame = Frame::new(message);
        for &nibble in frame.nibbles() {
            write_nibble(&mut self.tx, &mut self.delay, nibble);
        }
    }

    /// Tries to receive one frame.
    ///
    /// # Returns
    /// - `Ok(message)`: a frame with valid parity, parity nibble removed
    /// - `Err(nb::Error::WouldBlock)`: the input was not LOW at call time, so no frame
    ///   can be starting
    /// - `Err(nb::Error::Other(_))`: the window closed without a valid frame
    ///
    /// # Timing
    /// Each bit opens a window when the line goes LOW. The time until the line reads
    /// HIGH again is classified by [`Bit::classify`]. The call returns once a window
    /// has been open for 4 ms, which happens 4 ms after the last pulse of a frame.
    pub fn poll_receive(&mut self) -> nb::Result<u64, FrameError> {
        if self.line_high() {
            return Err(nb::Error::WouldBlock);
        }

        let mut frame = FrameReceiver::new();
        let mut window_start = self.clock.now_us();
        let mut in_pulse = false;
        let mut saw_high = false;

        loop {
            let elapsed = elapsed_us(window_start, self.clock.now_us());
            if elapsed >= RX_WINDOW_US {
                break;
            }
            if self.line_high() {
                saw_high = true;
                if !in_pulse {
                    if let Some(bit) = Bit::classify(elapsed) {
                        frame.push(bit);
                        in_pulse = true;
                    }
                }
            } else if in_pulse {
                // Falling edge: the next bit window starts here
                in_pulse = false;
                window_start = self.clock.now_us();
            }
        }

        if frame.bit_count() == 0 && !saw_high {
            return Err(nb::Error::Other(FrameError::Timeout));
        }
        frame.finish().map_err(nb::Error::Other)
    }

    /// Receives one message, if one is arriving.
    ///
    /// Returns `None` when the input is not LOW at call time or when the frame is
    /// invalid. The cause of a rejected frame is logged; use
    /// [`poll_receive()`](MBus::poll_receive) to inspect it.
    pub fn receive(&mut self) -> Option<u64> {
        match self.poll_receive() {
            Ok(message) => {
                debug!("received: {:x}", message);
                Some(message)
            }
            Err(nb::Error::WouldBlock) => None,
            Err(nb::Error::Other(FrameError::Timeout)) => {
                trace!("receive window elapsed");
                None
            }
            Err(nb::Error::Other(err)) => {
                warn!("dropped frame: {:?}", err);
                None
            }
        }
    }

    /// Receives one message and decodes it as a head-unit [`Command`].
    ///
    /// Unknown or malformed commands are logged and dropped.
    pub fn receive_command(&mut self) -> Option<Command> {
        let message = self.receive()?;
        match Command::decode(message) {
            Ok(command) => Some(command),
            Err(err) => {
                warn!("ignoring message {:x}: {:?}", message, err);
                None
            }
        }
    }

    /// Reports the current track, elapsed time and play state.
    pub fn send_playing_track(
        &mut self,
        track: u8,
        time_sec: u16,
        state: PlayState,
    ) -> Result<(), MessageError> {
        let message = PlayingTrack {
            track,
            time_sec,
            state,
        }
        .encode()?;
        self.transmit(message);
        Ok(())
    }

    /// Reports the progress of a disc change.
    pub fn send_changing_disc(
        &mut self,
        disc: u8,
        track: u8,
        status: ChangingStatus,
    ) -> Result<(), MessageError> {
        let message = DiscChange {
            disc,
            track,
            status,
        }
        .encode()?;
        self.transmit(message);
        Ok(())
    }

    /// Reports the track count and total time of a disc.
    pub fn send_disc_info(
        &mut self,
        disc: u8,
        total_tracks: u8,
        total_time_sec: u16,
    ) -> Result<(), MessageError> {
        let message = DiscInfo {
            disc,
            total_tracks,
            total_time_sec,
        }
        .encode()?;
        self.transmit(message);
        Ok(())
    }

    /// Reports the changer health.
    pub fn send_changer_error(&mut self, code: ChangerErrorCode) {
        debug!("changer status: {}", code.label());
        self.transmit(code.encode());
    }

    /// Sends the power-up handshake.
    pub fn send_init(&mut self) {
        for message in INIT_SEQUENCE {
            self.transmit(message);
        }
    }

    /// Asks the head-unit to wait.
    pub fn send_wait(&mut self) {
        self.transmit(WAIT);
    }

    /// Announces the discs in the magazine.
    pub fn send_available_discs(&mut self) {
        self.transmit(AVAILABLE_DISCS);
    }

    /// Answers a head-unit ping.
    pub fn send_ping_ok(&mut self) {
        self.transmit(PING_OK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::BIT_PERIOD_US;
    use crate::frame::nibble;
    use crate::sim::{BusInput, StepClock, Trace, TraceDelay, TracePin, Waveform};
    use core::cell::{Cell, RefCell};
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    type SimBus<'a> = MBus<TracePin<'a>, BusInput<'a>, TraceDelay<'a>, StepClock<'a>>;

    /// Records what `send` puts on the output pin.
    fn transmit_trace<F>(send: F) -> Trace
    where
        F: FnOnce(&mut SimBus<'_>),
    {
        let trace = RefCell::new(Trace::new());
        {
            let now = Cell::new(0);
            let idle = Waveform::idle(true);
            let (tx, delay) = Trace::split(&trace);
            let mut bus = MBus::new(tx, BusInput::new(&idle, &now), delay, StepClock::new(&now, 5));
            send(&mut bus);
        }
        trace.into_inner()
    }

    /// Receives from `wave`, starting at its first sample.
    fn receive_wave(wave: &Waveform) -> nb::Result<u64, FrameError> {
        let now = Cell::new(0);
        let scratch = RefCell::new(Trace::new());
        let (tx, delay) = Trace::split(&scratch);
        let mut bus = MBus::new(tx, BusInput::new(wave, &now), delay, StepClock::new(&now, 5));
        bus.poll_receive()
    }

    fn loopback(message: u64) -> nb::Result<u64, FrameError> {
        let trace = transmit_trace(|bus| bus.transmit(message));
        receive_wave(&trace.as_seen_by_receiver())
    }

    #[test]
    fn test_driver_initialization() {
        let tx = PinMock::new(&[PinTransaction::set(PinState::Low)]);
        let rx = PinMock::new(&[]);
        let now = Cell::new(0);

        let bus = MBus::new(tx, rx, NoopDelay::new(), StepClock::new(&now, 5));

        let (mut tx, mut rx, _, _) = bus.release();
        tx.done();
        rx.done();
    }

    #[test]
    fn test_transmit_drives_parity_only_for_zero() {
        let high = PinTransaction::set(PinState::High);
        let low = PinTransaction::set(PinState::Low);
        // Idle, then four pulses for the parity nibble
        let tx = PinMock::new(&[
            low.clone(),
            high.clone(),
            low.clone(),
            high.clone(),
            low.clone(),
            high.clone(),
            low.clone(),
            high,
            low,
        ]);
        let rx = PinMock::new(&[]);
        let now = Cell::new(0);

        let mut bus = MBus::new(tx, rx, NoopDelay::new(), StepClock::new(&now, 5));
        bus.transmit(0);

        bus.tx.done();
        bus.rx.done();
    }

    #[test]
    fn test_receive_returns_none_when_line_high() {
        let tx = PinMock::new(&[PinTransaction::set(PinState::Low)]);
        let rx = PinMock::new(&[PinTransaction::get(PinState::High)]);
        let now = Cell::new(0);

        let mut bus = MBus::new(tx, rx, NoopDelay::new(), StepClock::new(&now, 5));
        assert!(bus.receive().is_none());
        // No time spent waiting for a frame
        assert_eq!(now.get(), 0);
        bus.tx.done();
        bus.rx.done();
    }

    #[test]
    fn test_zero_message_timing() {
        let trace = transmit_trace(|bus| bus.transmit(0));
        // parity 0b0001
        assert_eq!(
            trace.segments(),
            &[
                (true, 600),
                (false, 2_400),
                (true, 600),
                (false, 2_400),
                (true, 600),
                (false, 2_400),
                (true, 1_800),
                (false, 1_200),
            ]
        );
    }

    #[test]
    fn test_single_nibble_at_offset_three() {
        let trace = transmit_trace(|bus| bus.transmit(0x7000));
        // 4 data nibbles + parity
        assert_eq!(trace.segments().len(), 5 * 4 * 2);
        assert_eq!(trace.duration_us(), 5 * 4 * BIT_PERIOD_US);
    }

    #[test]
    fn test_loopback_round_trip() {
        for message in [
            0x1u64,
            0x98,
            0x9F00000,
            0x1134271,
            0x9B931200001,
            0x9C701230502F,
            0xF123_4567_89AB_CDE0,
        ] {
            assert_eq!(loopback(message), Ok(message));
        }
    }

    #[test]
    fn test_loopback_of_zero_is_empty_frame() {
        // Only the parity nibble travels, so the receiver sees an empty message
        assert_eq!(loopback(0), Ok(0));
    }

    #[test]
    fn test_loopback_playing_track() {
        let trace = transmit_trace(|bus| {
            bus.send_playing_track(7, 125, PlayState::Playing).unwrap()
        });
        let message = receive_wave(&trace.as_seen_by_receiver()).unwrap();
        let status = PlayingTrack::decode(message).unwrap();
        assert_eq!(status.track, 7);
        assert_eq!(status.time_sec, 125);
        assert_eq!(status.state, PlayState::Playing);
    }

    #[test]
    fn test_corrupted_nibble_fails_parity() {
        let mut nibbles: heapless::Vec<u8, 17> =
            heapless::Vec::from_slice(Frame::new(0x9B931200001).nibbles()).unwrap();
        nibbles[4] ^= 0x2;
        let trace = RefCell::new(Trace::new());
        {
            let (mut tx, mut delay) = Trace::split(&trace);
            for n in nibbles {
                write_nibble(&mut tx, &mut delay, n);
            }
        }
        let result = receive_wave(&trace.into_inner().as_seen_by_receiver());
        assert!(matches!(
            result,
            Err(nb::Error::Other(FrameError::Parity { .. }))
        ));
    }

    #[test]
    fn test_stuck_high_line_yields_no_message() {
        // One short pulse, then the line never drops again
        let wave = Waveform::from_segments(&[(false, 700)], true);
        assert_eq!(
            receive_wave(&wave),
            Err(nb::Error::Other(FrameError::Framing { bits: 1 }))
        );
    }

    #[test]
    fn test_idle_low_line_times_out() {
        let wave = Waveform::idle(false);
        assert_eq!(
            receive_wave(&wave),
            Err(nb::Error::Other(FrameError::Timeout))
        );
    }

    #[test]
    fn test_noise_spike_is_ignored() {
        let wave = Waveform::from_segments(&[(false, 300), (true, 200)], false);
        assert_eq!(
            receive_wave(&wave),
            Err(nb::Error::Other(FrameError::Framing { bits: 0 }))
        );
    }

    #[test]
    fn test_send_changing_disc_done() {
        let trace = transmit_trace(|bus| {
            bus.send_changing_disc(3, 12, ChangingStatus::Done).unwrap()
        });
        let message = receive_wave(&trace.as_seen_by_receiver()).unwrap();
        assert_eq!(nibble(message, 8), 9);
        assert_eq!(nibble(message, 7), 3);
        assert_eq!(nibble(message, 6), 1);
        assert_eq!(nibble(message, 5), 2);
    }

    #[test]
    fn test_out_of_range_field_sends_nothing() {
        let trace = transmit_trace(|bus| {
            assert!(bus.send_disc_info(1, 120, 0).is_err());
        });
        assert!(trace.segments().is_empty());
    }

    #[test]
    fn test_send_init_sends_three_frames() {
        let trace = transmit_trace(|bus| bus.send_init());
        // 12 + 10 + 9 data nibbles, one parity nibble each
        assert_eq!(trace.duration_us(), (13 + 11 + 10) * 4 * BIT_PERIOD_US);
    }

    #[test]
    fn test_fixed_replies() {
        let wait = transmit_trace(|bus| bus.send_wait());
        let normal = transmit_trace(|bus| bus.send_changer_error(ChangerErrorCode::Normal));
        assert_eq!(wait.segments(), normal.segments());

        let ping = transmit_trace(|bus| bus.send_ping_ok());
        assert_eq!(receive_wave(&ping.as_seen_by_receiver()), Ok(PING_OK));

        let discs = transmit_trace(|bus| bus.send_available_discs());
        assert_eq!(receive_wave(&discs.as_seen_by_receiver()), Ok(AVAILABLE_DISCS));
    }

    #[test]
    fn test_receive_command() {
        let trace = transmit_trace(|bus| bus.transmit(0x11101));
        let wave = trace.as_seen_by_receiver();
        let now = Cell::new(0);
        let scratch = RefCell::new(Trace::new());
        let (tx, delay) = Trace::split(&scratch);
        let mut bus = MBus::new(tx, BusInput::new(&wave, &now), delay, StepClock::new(&now, 5));
        assert_eq!(bus.receive_command(), Some(Command::Play));
    }
}
