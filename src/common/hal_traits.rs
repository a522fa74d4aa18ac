// src/common/hal_traits.rs

use core::convert::Infallible;
use embedded_hal::digital::OutputPin;

/// The one-shot countdown that paces every symbol on the bus.
///
/// One tick is [`TICK_US`](super::timing::TICK_US). Implementations fire once
/// per `start` and must forget a pending expiry on `cancel`. The interrupt
/// handler (or a polling loop built on [`wait`](VpwTimer::wait)) forwards the
/// expiry to [`J1850Stack::on_timer_expired`](crate::stack::J1850Stack::on_timer_expired).
pub trait VpwTimer {
    /// Arm the timer for `ticks` ticks, replacing any pending countdown.
    fn start(&mut self, ticks: u32);

    /// Disarm the timer. Must be harmless when nothing is armed.
    fn cancel(&mut self);

    /// Non-blocking check for expiry.
    ///
    /// Returns `Ok(())` exactly once per elapsed countdown and
    /// `Err(nb::Error::WouldBlock)` while the countdown is running or no
    /// countdown is armed.
    fn wait(&mut self) -> nb::Result<(), Infallible>;
}

/// Logical bus level, independent of the pin's electrical polarity.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// Dominant state, driven by a transmitter.
    Active,
    /// Recessive state, the idle bus.
    Passive,
}

/// How the logical bus level maps onto the output pin.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Pin high drives the bus active.
    #[default]
    ActiveHigh,
    /// Pin low drives the bus active (inverting transceiver).
    ActiveLow,
}

impl Polarity {
    /// Drives `pin` so that the bus reads `level`.
    pub fn drive<P: OutputPin>(self, pin: &mut P, level: Level) -> Result<(), P::Error> {
        match (self, level) {
            (Polarity::ActiveHigh, Level::Active) | (Polarity::ActiveLow, Level::Passive) => {
                pin.set_high()
            }
            (Polarity::ActiveHigh, Level::Passive) | (Polarity::ActiveLow, Level::Active) => {
                pin.set_low()
            }
        }
    }

    /// Logical level for a sampled input pin state.
    pub const fn level(self, is_high: bool) -> Level {
        match (self, is_high) {
            (Polarity::ActiveHigh, true) | (Polarity::ActiveLow, false) => Level::Active,
            _ => Level::Passive,
        }
    }
}
