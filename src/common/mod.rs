// src/common/mod.rs

// --- Declare all public modules within common ---
pub mod config;
pub mod crc;
pub mod error;
pub mod frame;
pub mod hal_traits;
pub mod header;
pub mod symbol;
pub mod timing;

// --- Re-export key types/traits/functions for easier access ---

pub use config::Config;
pub use crc::{calculate_crc8, verify_frame_crc};
pub use error::{J1850Error, TimerContention};
pub use frame::Frame;
pub use hal_traits::{Level, Polarity, VpwTimer};
pub use header::Header;
pub use symbol::{Symbol, SymbolTiming};

// Timing constants stay under common::timing::*
