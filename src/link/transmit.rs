// src/link/transmit.rs

use super::{DataLink, DlEvent, LinkState, SendFailure};
use crate::common::{
    error::J1850Error,
    frame::Frame,
    hal_traits::VpwTimer,
    symbol::Symbol,
    timing::IFS_US,
};
use crate::phys::{EntityId, RxState};
use embedded_hal::digital::OutputPin;

/// The `index`-th symbol a frame is sent as: SOF, every bit MSB first, EOD, EOF, IFS.
pub fn frame_symbol(frame: &Frame, index: usize) -> Option<Symbol> {
    let bits = frame.len() * 8;
    match index {
        0 => Some(Symbol::Sof),
        i if i <= bits => {
            let bit = i - 1;
            let byte = frame.as_bytes()[bit / 8];
            Some(Symbol::from_bit(byte & (0x80 >> (bit % 8)) != 0))
        }
        i if i == bits + 1 => Some(Symbol::Eod),
        i if i == bits + 2 => Some(Symbol::Eof),
        i if i == bits + 3 => Some(Symbol::Ifs),
        _ => None,
    }
}

/// Iterator over the symbols of a frame, in wire order.
#[derive(Debug, Clone)]
pub struct FrameSymbols<'a> {
    frame: &'a Frame,
    index: usize,
}

impl<'a> FrameSymbols<'a> {
    pub fn new(frame: &'a Frame) -> Self {
        FrameSymbols { frame, index: 0 }
    }
}

impl Iterator for FrameSymbols<'_> {
    type Item = Symbol;

    fn next(&mut self) -> Option<Symbol> {
        let symbol = frame_symbol(self.frame, self.index)?;
        self.index += 1;
        Some(symbol)
    }
}

impl<P: OutputPin, T: VpwTimer> DataLink<P, T> {
    /// Queues `message` (header + data, 3..=11 bytes) for transmission.
    ///
    /// The CRC is appended here. Transmission starts once the bus has been
    /// passive for one IFS; completion is reported as [`DlEvent::MessageSent`].
    /// Refused with [`J1850Error::LinkBusy`] while a symbol is on the bus.
    pub fn send_message(&mut self, message: &[u8]) -> Result<(), J1850Error<P::Error>> {
        if self.state != LinkState::Idle || self.awaiting_response {
            return Err(J1850Error::LinkBusy);
        }
        if matches!(self.phys.rx.state(), RxState::Active | RxState::Passive { .. }) {
            return Err(J1850Error::LinkBusy);
        }
        let frame = Frame::new(message)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("sending {}", frame);

        self.phys.rx.stop_listen(&mut self.phys.timer);
        self.phys.timer.request(EntityId::DataLink, IFS_US)?;
        self.tx_frame = Some(frame);
        self.tx_index = 0;
        self.state = LinkState::AwaitingIfs;
        Ok(())
    }

    /// Abandons a queued or partially sent frame.
    ///
    /// Reports [`SendFailure::Cancelled`] if a frame was in flight. A pending
    /// response wait is dropped silently; from Idle this does nothing.
    pub fn cancel_message(&mut self) -> Result<Option<DlEvent>, J1850Error<P::Error>> {
        match self.state {
            LinkState::AwaitingIfs | LinkState::Sending => {
                #[cfg(feature = "defmt")]
                defmt::debug!("send cancelled at symbol {}", self.tx_index);

                self.phys.timer.cancel(EntityId::DataLink);
                self.phys.tx.cancel_symbol(&mut self.phys.timer)?;
                self.tx_frame = None;
                self.tx_index = 0;
                self.state = LinkState::Idle;
                self.phys.rx.start_listen(&mut self.phys.timer, None)?;
                self.bus_idle = true;
                Ok(Some(DlEvent::MessageSendFailed(SendFailure::Cancelled)))
            }
            LinkState::Idle if self.awaiting_response => {
                self.end_transaction();
                Ok(None)
            }
            LinkState::Idle | LinkState::Receiving => Ok(None),
        }
    }

    /// Another node drove the bus while we waited for the IFS; the wait starts over.
    pub(super) fn restart_ifs_wait(&mut self) -> Result<(), J1850Error<P::Error>> {
        self.phys.timer.request(EntityId::DataLink, IFS_US)?;
        Ok(())
    }

    pub(super) fn on_ifs_elapsed(&mut self) -> Result<Option<DlEvent>, J1850Error<P::Error>> {
        if self.state != LinkState::AwaitingIfs {
            return Ok(None);
        }
        self.state = LinkState::Sending;
        self.send_next()
    }

    pub(super) fn on_symbol_sent(&mut self) -> Result<Option<DlEvent>, J1850Error<P::Error>> {
        if self.state != LinkState::Sending {
            return Ok(None);
        }
        self.tx_index += 1;
        self.send_next()
    }

    fn send_next(&mut self) -> Result<Option<DlEvent>, J1850Error<P::Error>> {
        let next = self.tx_frame.as_ref().and_then(|frame| frame_symbol(frame, self.tx_index));
        match next {
            Some(symbol) => {
                self.phys.tx.send_symbol(&mut self.phys.timer, symbol)?;
                Ok(None)
            }
            None => self.finish_send(),
        }
    }

    fn finish_send(&mut self) -> Result<Option<DlEvent>, J1850Error<P::Error>> {
        self.tx_frame = None;
        self.tx_index = 0;
        self.state = LinkState::Idle;
        // The frame ended with our own IFS
        self.bus_idle = true;
        self.awaiting_response = self.response_timeout_us.is_some();
        self.phys.rx.start_listen(&mut self.phys.timer, self.response_timeout_us)?;
        Ok(Some(DlEvent::MessageSent))
    }
}
