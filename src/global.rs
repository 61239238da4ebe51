//! A bus instance shared between the main loop and interrupt handlers.
//!
//! [`MBus`] is not reentrant: only one caller may drive the line pair at a time.
//! When the instance has to live in a `static` (for example so a timer interrupt can
//! answer pings), park it in a [`GlobalBus`] and reach it through
//! [`with_global_bus`], which runs inside `critical_section::with`.
//!
//! Every call keeps interrupts masked for its whole duration. A transmission lasts
//! tens of milliseconds, so keep interrupt-side work to short replies.

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::driver::MBus;
use crate::platform::MicrosClock;

/// Storage for a bus instance shared through a critical section.
pub type GlobalBus<TX, RX, D, C> = Mutex<RefCell<Option<MBus<TX, RX, D, C>>>>;

/// Used to initialize the global static bus.
///
/// # Example
/// ```rust,ignore
/// use mbus_cdc::global::{GlobalBus, global_bus_init};
/// use some_hal::{Delay, Micros, PD2, PD3};
///
/// static BUS: GlobalBus<PD3, PD2, Delay, Micros> = global_bus_init();
/// ```
pub const fn global_bus_init<TX, RX, D, C>() -> GlobalBus<TX, RX, D, C>
where
    TX: OutputPin,
    RX: InputPin,
    D: DelayNs,
    C: MicrosClock,
{
    Mutex::new(RefCell::new(None))
}

/// Moves `bus` into the global slot, dropping any previous instance.
pub fn global_bus_setup<TX, RX, D, C>(
    global: &'static GlobalBus<TX, RX, D, C>,
    bus: MBus<TX, RX, D, C>,
) where
    TX: OutputPin,
    RX: InputPin,
    D: DelayNs,
    C: MicrosClock,
{
    critical_section::with(|cs| {
        let _ = global.borrow(cs).replace(Some(bus));
    });
}

/// Runs `f` on the global bus inside a critical section.
///
/// Returns `None` if no bus has been set up.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn TIM2() {
///     with_global_bus(&BUS, |bus| {
///         if bus.receive() == Some(mbus_cdc::consts::CMD_PING) {
///             bus.send_ping_ok();
///         }
///     });
/// }
/// ```
pub fn with_global_bus<TX, RX, D, C, R>(
    global: &'static GlobalBus<TX, RX, D, C>,
    f: impl FnOnce(&mut MBus<TX, RX, D, C>) -> R,
) -> Option<R>
where
    TX: OutputPin,
    RX: InputPin,
    D: DelayNs,
    C: MicrosClock,
{
    critical_section::with(|cs| global.borrow(cs).borrow_mut().as_mut().map(f))
}

/// Takes the bus back out of the global slot.
pub fn global_bus_take<TX, RX, D, C>(
    global: &'static GlobalBus<TX, RX, D, C>,
) -> Option<MBus<TX, RX, D, C>>
where
    TX: OutputPin,
    RX: InputPin,
    D: DelayNs,
    C: MicrosClock,
{
    critical_section::with(|cs| global.borrow(cs).take())
}
