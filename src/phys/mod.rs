// src/phys/mod.rs

//! Physical layer: symbol timer arbitration, pulse generation and pulse measurement.

pub mod rx;
pub mod timer;
pub mod tx;

pub use rx::{PhysRx, RxEvent, RxState};
pub use timer::{EntityId, SymbolTimer};
pub use tx::{PhysTx, TxEvent, TxState};

use crate::common::hal_traits::{Polarity, VpwTimer};
use embedded_hal::digital::OutputPin;

/// The physical layer resources of one bus node: the shared timer and both
/// directions of the pin codec.
///
/// The fields are public so the data link can lend the timer to either side.
#[derive(Debug)]
pub struct Physical<P: OutputPin, T: VpwTimer> {
    pub timer: SymbolTimer<T>,
    pub tx: PhysTx<P>,
    pub rx: PhysRx,
}

impl<P: OutputPin, T: VpwTimer> Physical<P, T> {
    pub fn new(pin: P, timer: T, polarity: Polarity) -> Self {
        Physical {
            timer: SymbolTimer::new(timer),
            tx: PhysTx::new(pin, polarity),
            rx: PhysRx::new(),
        }
    }
}
