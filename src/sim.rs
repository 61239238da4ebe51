//! Test-only line simulator.
//!
//! [`Trace`] records what a transmitter does with its output pin and delay.
//! [`Waveform`] replays a level timeline to an input pin, and [`StepClock`] advances
//! the shared simulated time by a fixed step on every reading, the way a busy-wait
//! loop burns time between samples.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use heapless::Vec;

use crate::platform::MicrosClock;

const MAX_SEGMENTS: usize = 512;

/// `(level, duration_us)` runs of an output pin.
#[derive(Debug, Default)]
pub(crate) struct Trace {
    level: bool,
    segments: Vec<(bool, u32), MAX_SEGMENTS>,
}

impl Trace {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// An output pin and a delay both writing into `trace`.
    pub(crate) fn split(trace: &RefCell<Trace>) -> (TracePin<'_>, TraceDelay<'_>) {
        (TracePin(trace), TraceDelay(trace))
    }

    pub(crate) fn segments(&self) -> &[(bool, u32)] {
        &self.segments
    }

    pub(crate) fn duration_us(&self) -> u32 {
        self.segments.iter().map(|&(_, us)| us).sum()
    }

    /// The same timeline as read back through the bus transistor: levels inverted,
    /// HIGH once the transmitter goes quiet.
    pub(crate) fn as_seen_by_receiver(&self) -> Waveform {
        Waveform {
            segments: self.segments.iter().map(|&(level, us)| (!level, us)).collect(),
            idle: true,
        }
    }

    fn wait(&mut self, us: u32) {
        let level = self.level;
        match self.segments.last_mut() {
            Some(last) if last.0 == level => last.1 += us,
            _ => self.segments.push((level, us)).unwrap(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct TracePin<'a>(&'a RefCell<Trace>);

impl ErrorType for TracePin<'_> {
    type Error = Infallible;
}

impl OutputPin for TracePin<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().level = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().level = true;
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct TraceDelay<'a>(&'a RefCell<Trace>);

impl DelayNs for TraceDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().wait(ns / 1_000);
    }

    fn delay_us(&mut self, us: u32) {
        self.0.borrow_mut().wait(us);
    }
}

/// A level timeline starting at time 0, holding `idle` after the last segment.
#[derive(Debug)]
pub(crate) struct Waveform {
    segments: Vec<(bool, u32), MAX_SEGMENTS>,
    idle: bool,
}

impl Waveform {
    pub(crate) fn idle(level: bool) -> Self {
        Self {
            segments: Vec::new(),
            idle: level,
        }
    }

    pub(crate) fn from_segments(segments: &[(bool, u32)], idle: bool) -> Self {
        Self {
            segments: Vec::from_slice(segments).unwrap(),
            idle,
        }
    }

    fn level_at(&self, t: u32) -> bool {
        let mut end = 0;
        for &(level, us) in &self.segments {
            end += us;
            if t < end {
                return level;
            }
        }
        self.idle
    }
}

/// Input pin reading a [`Waveform`] at the current simulated time.
#[derive(Debug)]
pub(crate) struct BusInput<'a> {
    wave: &'a Waveform,
    now: &'a Cell<u32>,
}

impl<'a> BusInput<'a> {
    pub(crate) fn new(wave: &'a Waveform, now: &'a Cell<u32>) -> Self {
        Self { wave, now }
    }
}

impl ErrorType for BusInput<'_> {
    type Error = Infallible;
}

impl InputPin for BusInput<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.wave.level_at(self.now.get()))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.wave.level_at(self.now.get()))
    }
}

/// Clock that moves simulated time forward by `step` µs on every reading.
#[derive(Debug)]
pub(crate) struct StepClock<'a> {
    now: &'a Cell<u32>,
    step: u32,
}

impl<'a> StepClock<'a> {
    pub(crate) fn new(now: &'a Cell<u32>, step: u32) -> Self {
        Self { now, step }
    }
}

impl MicrosClock for StepClock<'_> {
    fn now_us(&mut self) -> u32 {
        self.now.set(self.now.get() + self.step);
        self.now.get()
    }
}
