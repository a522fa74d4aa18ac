// src/phys/tx.rs

use super::timer::{EntityId, SymbolTimer};
use crate::common::{
    error::J1850Error,
    hal_traits::{Level, Polarity, VpwTimer},
    symbol::{Symbol, SymbolTiming},
};
use embedded_hal::digital::OutputPin;

/// Reported by PHYS-TX once both phases of a symbol are on the wire.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxEvent {
    SymbolSent(Symbol),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxState {
    Idle,
    Active(Symbol),
    Passive(Symbol),
}

/// Physical transmitter: turns one symbol at a time into an active pulse
/// followed by a passive gap.
#[derive(Debug)]
pub struct PhysTx<P: OutputPin> {
    pin: P,
    polarity: Polarity,
    state: TxState,
}

impl<P: OutputPin> PhysTx<P> {
    pub fn new(pin: P, polarity: Polarity) -> Self {
        PhysTx { pin, polarity, state: TxState::Idle }
    }

    #[inline]
    pub fn state(&self) -> TxState {
        self.state
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.state == TxState::Idle
    }

    /// Puts the bus in the passive state without touching the timer.
    pub fn release(&mut self) -> Result<(), J1850Error<P::Error>> {
        self.drive(Level::Passive)
    }

    /// Starts putting `symbol` on the bus.
    pub fn send_symbol<T: VpwTimer>(
        &mut self,
        timer: &mut SymbolTimer<T>,
        symbol: Symbol,
    ) -> Result<(), J1850Error<P::Error>> {
        if !self.is_idle() {
            return Err(J1850Error::TransmitterBusy);
        }
        let Some(SymbolTiming { active_us, .. }) = symbol.timing() else {
            return Err(J1850Error::InvalidSymbol(symbol));
        };

        // Claim the timer before the pin so a refusal leaves the bus untouched
        timer.request(EntityId::PhysTx, active_us)?;
        if let Err(e) = self.drive(Level::Active) {
            timer.cancel(EntityId::PhysTx);
            return Err(e);
        }
        self.state = TxState::Active(symbol);
        Ok(())
    }

    /// Advances the current symbol after its timer expired.
    pub fn on_timer_expired<T: VpwTimer>(
        &mut self,
        timer: &mut SymbolTimer<T>,
    ) -> Result<Option<TxEvent>, J1850Error<P::Error>> {
        match self.state {
            TxState::Active(symbol) => {
                let passive_us = symbol.timing().map_or(0, |t| t.passive_us);
                self.drive(Level::Passive)?;
                timer.request(EntityId::PhysTx, passive_us)?;
                self.state = TxState::Passive(symbol);
                Ok(None)
            }
            TxState::Passive(symbol) => {
                self.state = TxState::Idle;
                Ok(Some(TxEvent::SymbolSent(symbol)))
            }
            TxState::Idle => Ok(None),
        }
    }

    /// Abandons the current symbol. Idempotent; from Idle nothing happens on the pin.
    pub fn cancel_symbol<T: VpwTimer>(
        &mut self,
        timer: &mut SymbolTimer<T>,
    ) -> Result<(), J1850Error<P::Error>> {
        let was_active = matches!(self.state, TxState::Active(_));
        if self.is_idle() {
            return Ok(());
        }

        timer.cancel(EntityId::PhysTx);
        self.state = TxState::Idle;
        if was_active {
            self.drive(Level::Passive)?;
        }
        Ok(())
    }

    /// Forces Idle and a passive bus regardless of the current state.
    pub(crate) fn reset(&mut self) -> Result<(), J1850Error<P::Error>> {
        self.state = TxState::Idle;
        self.drive(Level::Passive)
    }

    fn drive(&mut self, level: Level) -> Result<(), J1850Error<P::Error>> {
        self.polarity.drive(&mut self.pin, level).map_err(J1850Error::Pin)
    }
}
