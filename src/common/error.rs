// src/common/error.rs

use crate::common::symbol::Symbol;
use crate::phys::timer::EntityId;

/// Raised when an entity asks for the symbol timer while another entity owns it.
///
/// The layers never do this by construction, so seeing it means a state machine
/// has lost track of who is driving the bus.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("timer contention: held by {held_by:?}, requested by {requested_by:?}")]
pub struct TimerContention {
    pub held_by: EntityId,
    pub requested_by: EntityId,
}

#[derive(Debug, thiserror::Error)]
pub enum J1850Error<E = ()>
where
    E: core::fmt::Debug, // Still need Debug for the generic pin error
{
    /// Underlying error from the output pin implementation.
    #[error("Pin error: {0:?}")]
    Pin(E),

    /// The single hardware timer was requested by a second entity.
    #[error(transparent)]
    TimerContention(#[from] TimerContention),

    /// A symbol was handed to PHYS-TX while another one is still on the wire.
    #[error("Transmitter busy")]
    TransmitterBusy,

    /// The data link is sending, receiving or waiting for a response.
    #[error("Data link busy")]
    LinkBusy,

    /// The application already has a request outstanding.
    #[error("Request already pending")]
    RequestPending,

    /// `Symbol::Invalid` cannot be transmitted.
    #[error("Cannot transmit symbol {0:?}")]
    InvalidSymbol(Symbol),

    /// Message or frame length outside of what J1850 allows.
    #[error("Invalid length: {len} bytes (allowed {min}..={max})")]
    InvalidLength { len: usize, min: usize, max: usize },

    /// Received CRC does not match calculated CRC.
    #[error("CRC mismatch: expected {expected:#04x}, calculated {calculated:#04x}")]
    CrcMismatch { expected: u8, calculated: u8 },
}
