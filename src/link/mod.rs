// src/link/mod.rs

//! Data link layer: frames in and out of symbol streams.

mod receive;
mod transmit;

pub use receive::FrameAssembler;
pub use transmit::{frame_symbol, FrameSymbols};

use crate::common::{
    error::J1850Error,
    frame::Frame,
    hal_traits::{Level, VpwTimer},
};
use crate::phys::{EntityId, Physical, RxEvent, TxEvent};
use embedded_hal::digital::OutputPin;

/// Why a frame could not be received.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReceiveFailure {
    /// No frame arrived within the response timeout.
    Timeout,
    /// The frame's CRC byte did not match its contents.
    Crc,
    /// Fewer than 4 or more than 12 bytes.
    Length,
    /// A BRK interrupted the frame.
    Break,
    /// A pulse pair that matched no symbol.
    InvalidSymbol,
    /// Symbols in an impossible order, or EOD/EOF off a byte boundary.
    Malformed,
    /// SOF without the bus having been idle first.
    MissingIfs,
}

/// Why a frame could not be sent.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendFailure {
    Cancelled,
}

/// Events reported by the data link to the application.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DlEvent {
    MessageReceived(Frame),
    MessageReceiveFailed(ReceiveFailure),
    MessageSent,
    MessageSendFailed(SendFailure),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Idle,
    /// Holding the bus passive for one IFS before the SOF.
    AwaitingIfs,
    Sending,
    Receiving,
}

/// The data link state machine, owning the physical layer below it.
///
/// Transmit and receive share the timer by phase: while sending, RX is stopped
/// and the timer belongs to DL (IFS wait) or PHYS-TX; while listening it belongs
/// to PHYS-RX, which also carries the response timeout as its idle timeout.
#[derive(Debug)]
pub struct DataLink<P: OutputPin, T: VpwTimer> {
    phys: Physical<P, T>,
    state: LinkState,
    response_timeout_us: Option<u32>,
    awaiting_response: bool,
    bus_idle: bool,
    tx_frame: Option<Frame>,
    tx_index: usize,
    assembler: FrameAssembler,
}

impl<P: OutputPin, T: VpwTimer> DataLink<P, T> {
    pub fn new(phys: Physical<P, T>, response_timeout_us: Option<u32>) -> Self {
        DataLink {
            phys,
            state: LinkState::Idle,
            response_timeout_us,
            awaiting_response: false,
            bus_idle: false,
            tx_frame: None,
            tx_index: 0,
            assembler: FrameAssembler::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// True from `send_message` until the frame's final IFS has gone out.
    #[inline]
    pub fn is_transmitting(&self) -> bool {
        matches!(self.state, LinkState::AwaitingIfs | LinkState::Sending)
    }

    #[inline]
    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    pub fn physical(&self) -> &Physical<P, T> {
        &self.phys
    }

    /// Releases the bus and starts listening.
    pub fn start(&mut self) -> Result<(), J1850Error<P::Error>> {
        self.phys.tx.release()?;
        self.phys.rx.start_listen(&mut self.phys.timer, None)?;
        self.state = LinkState::Idle;
        self.bus_idle = true;
        Ok(())
    }

    /// Handles a bus edge reported by the input capture.
    pub fn on_edge(
        &mut self,
        level: Level,
        elapsed_us: u32,
    ) -> Result<Option<DlEvent>, J1850Error<P::Error>> {
        if self.state == LinkState::AwaitingIfs {
            // RX is off and our pin is still passive, so this edge is foreign
            self.restart_ifs_wait()?;
            return Ok(None);
        }
        let event = self.phys.rx.on_edge(&mut self.phys.timer, level, elapsed_us)?;
        Ok(event.and_then(|event| self.on_rx_event(event)))
    }

    /// Routes a timer expiry to its owner.
    pub fn on_timer_expired(&mut self) -> Result<Option<DlEvent>, J1850Error<P::Error>> {
        match self.phys.timer.expire() {
            Some(EntityId::PhysTx) => match self.phys.tx.on_timer_expired(&mut self.phys.timer)? {
                Some(TxEvent::SymbolSent(_)) => self.on_symbol_sent(),
                None => Ok(None),
            },
            Some(EntityId::PhysRx) => {
                let event = self.phys.rx.on_timer_expired(&mut self.phys.timer)?;
                Ok(event.and_then(|event| self.on_rx_event(event)))
            }
            Some(EntityId::DataLink) => self.on_ifs_elapsed(),
            Some(EntityId::App) | None => Ok(None),
        }
    }

    /// Polls the hardware timer; see [`VpwTimer::wait`].
    pub fn poll_timer(&mut self) -> nb::Result<Option<DlEvent>, J1850Error<P::Error>> {
        match self.phys.timer.wait() {
            Ok(()) => self.on_timer_expired().map_err(nb::Error::Other),
            Err(nb::Error::WouldBlock) => Err(nb::Error::WouldBlock),
            Err(nb::Error::Other(never)) => match never {},
        }
    }

    /// Drops everything in flight and returns to listening on a passive bus.
    ///
    /// Used after an error left the layers out of step; no events are reported.
    pub fn reset(&mut self) -> Result<(), J1850Error<P::Error>> {
        #[cfg(feature = "defmt")]
        defmt::warn!("data link reset from {}", self.state);

        self.phys.timer.cancel_all();
        self.phys.rx.reset();
        self.state = LinkState::Idle;
        self.awaiting_response = false;
        self.tx_frame = None;
        self.tx_index = 0;
        self.assembler.reset();

        // RX is back before the pin is touched, so a failing pin still leaves us listening
        self.phys.rx.start_listen(&mut self.phys.timer, None)?;
        self.bus_idle = true;
        self.phys.tx.reset()
    }

    fn on_rx_event(&mut self, event: RxEvent) -> Option<DlEvent> {
        match event {
            RxEvent::Symbol(symbol) => self.on_symbol(symbol),
            RxEvent::IdleTimeout if self.awaiting_response => {
                #[cfg(feature = "defmt")]
                defmt::debug!("response timeout");
                self.awaiting_response = false;
                Some(DlEvent::MessageReceiveFailed(ReceiveFailure::Timeout))
            }
            RxEvent::IdleTimeout => None,
        }
    }

    /// Ends the wait for a response, if one is running.
    fn end_transaction(&mut self) {
        if self.awaiting_response {
            self.awaiting_response = false;
            self.phys.rx.clear_idle_timeout(&mut self.phys.timer);
        }
    }
}
