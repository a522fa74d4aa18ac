// src/link/receive.rs

use super::{DataLink, DlEvent, LinkState, ReceiveFailure};
use crate::common::{
    error::J1850Error,
    frame::Frame,
    hal_traits::VpwTimer,
    symbol::Symbol,
    timing::MAX_FRAME_LEN,
};
use arrayvec::ArrayVec;
use embedded_hal::digital::OutputPin;

/// Collects received data bits (MSB first) into frame bytes.
#[derive(Debug, Clone, Default)]
pub struct FrameAssembler {
    bytes: ArrayVec<u8, MAX_FRAME_LEN>,
    current: u8,
    bit_count: u8,
    eod_seen: bool,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.bytes.clear();
        self.current = 0;
        self.bit_count = 0;
        self.eod_seen = false;
    }

    /// Completed bytes so far.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn is_aligned(&self) -> bool {
        self.bit_count == 0
    }

    pub fn push_bit(&mut self, bit: bool) -> Result<(), ReceiveFailure> {
        if self.bytes.is_full() {
            return Err(ReceiveFailure::Length);
        }

        self.current = (self.current << 1) | u8::from(bit);
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.bytes.push(self.current);
            self.current = 0;
            self.bit_count = 0;
        }
        Ok(())
    }

    /// Records the end of data. Must fall on a byte boundary.
    pub fn mark_eod(&mut self) -> Result<(), ReceiveFailure> {
        if !self.is_aligned() || self.bytes.is_empty() {
            return Err(ReceiveFailure::Malformed);
        }
        self.eod_seen = true;
        Ok(())
    }

    /// Validates what was collected as a complete frame.
    pub fn finish(&self) -> Result<Frame, ReceiveFailure> {
        if !self.eod_seen || !self.is_aligned() {
            return Err(ReceiveFailure::Malformed);
        }
        Frame::from_wire::<()>(&self.bytes).map_err(|e| match e {
            J1850Error::InvalidLength { .. } => ReceiveFailure::Length,
            J1850Error::CrcMismatch { .. } => ReceiveFailure::Crc,
            _ => ReceiveFailure::Malformed,
        })
    }
}

impl<P: OutputPin, T: VpwTimer> DataLink<P, T> {
    pub(super) fn on_symbol(&mut self, symbol: Symbol) -> Option<DlEvent> {
        match self.state {
            LinkState::Idle => self.on_idle_symbol(symbol),
            LinkState::Receiving => self.on_frame_symbol(symbol),
            // RX is stopped while transmitting
            LinkState::AwaitingIfs | LinkState::Sending => None,
        }
    }

    fn on_idle_symbol(&mut self, symbol: Symbol) -> Option<DlEvent> {
        match symbol {
            Symbol::Sof if self.bus_idle => {
                self.assembler.reset();
                self.bus_idle = false;
                self.state = LinkState::Receiving;
                None
            }
            Symbol::Sof => self.fail(ReceiveFailure::MissingIfs),
            Symbol::Ifs => {
                self.bus_idle = true;
                None
            }
            _ => {
                self.bus_idle = false;
                None
            }
        }
    }

    fn on_frame_symbol(&mut self, symbol: Symbol) -> Option<DlEvent> {
        let step = match symbol {
            Symbol::BitZero | Symbol::BitOne => self.assembler.push_bit(symbol == Symbol::BitOne),
            Symbol::Eod => self.assembler.mark_eod(),
            Symbol::Eof => return self.complete(),
            Symbol::Brk => Err(ReceiveFailure::Break),
            Symbol::Sof | Symbol::Ifs => Err(ReceiveFailure::Malformed),
            Symbol::Invalid => Err(ReceiveFailure::InvalidSymbol),
        };

        match step {
            Ok(()) => None,
            Err(reason) => self.fail(reason),
        }
    }

    fn complete(&mut self) -> Option<DlEvent> {
        match self.assembler.finish() {
            Ok(frame) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("received {}", frame);
                self.state = LinkState::Idle;
                self.assembler.reset();
                self.end_transaction();
                Some(DlEvent::MessageReceived(frame))
            }
            Err(reason) => self.fail(reason),
        }
    }

    fn fail(&mut self, reason: ReceiveFailure) -> Option<DlEvent> {
        #[cfg(feature = "defmt")]
        defmt::warn!("receive failed: {}", reason);
        self.state = LinkState::Idle;
        self.bus_idle = false;
        self.assembler.reset();
        self.end_transaction();
        Some(DlEvent::MessageReceiveFailed(reason))
    }
}
