// src/common/timing.rs

// Nominal VPW values at 10.4 kbit/s. Transmit durations are quantized to the
// symbol timer tick; receive classification works on the raw measurement and
// factors in the tolerance below.

// === Symbol Timer ===

/// Prescaler applied to the CPU clock to drive the symbol timer.
pub const TIMER_PRESCALER: u32 = 64;
/// Length of one symbol timer tick (compare-match period).
pub const TICK_US: u32 = 64;

// === Symbol Table (active / passive phase lengths) ===

pub const BIT_ZERO_ACTIVE_US: u32 = 64;
pub const BIT_ZERO_PASSIVE_US: u32 = 128;
pub const BIT_ONE_ACTIVE_US: u32 = 128;
pub const BIT_ONE_PASSIVE_US: u32 = 64;
/// Start of frame, active.
pub const SOF_US: u32 = 200;
/// End of data, passive.
pub const EOD_US: u32 = 200;
/// End of frame, passive.
pub const EOF_US: u32 = 280;
/// Inter-frame separation, passive. Also the minimum idle gap before a SOF.
pub const IFS_US: u32 = 300;
/// Break, active.
pub const BRK_US: u32 = 300;
/// Fixed companion phase for control symbols (one tick): the passive tail of
/// SOF/BRK and the delimiter pulse in front of EOD/EOF/IFS.
pub const SEPARATOR_US: u32 = TICK_US;

/// Maximum distance between a measured phase and its nominal length.
/// One tick, so a transmitter quantized to the timer is always accepted.
pub const SYMBOL_TOLERANCE_US: u32 = TICK_US;

// === Receive Watchdogs ===

/// Longest active phase PHYS-RX waits for before declaring the line stuck.
pub const RX_ACTIVE_LIMIT_US: u32 = BRK_US + SYMBOL_TOLERANCE_US;
/// Passive time after which the bus is considered idle (end of an IFS).
pub const RX_PASSIVE_LIMIT_US: u32 = IFS_US;

// === Transactions ===

/// Default time DL waits for a response after a request went out (J1979 P2, 100 ms).
pub const DEFAULT_RESPONSE_TIMEOUT_US: u32 = 100_000;

// === Frame Limits ===

/// Maximum wire frame length, CRC included.
pub const MAX_FRAME_LEN: usize = 12;
/// Minimum wire frame length: three header bytes and the CRC.
pub const MIN_FRAME_LEN: usize = 4;
/// Header plus data, before the CRC is appended.
pub const MAX_MESSAGE_LEN: usize = MAX_FRAME_LEN - 1;
pub const MIN_MESSAGE_LEN: usize = MIN_FRAME_LEN - 1;
/// Data bytes between the three header bytes and the CRC.
pub const MAX_DATA_LEN: usize = MAX_MESSAGE_LEN - 3;
/// SOF + 12 bytes of bits + EOD + EOF + IFS.
pub const MAX_FRAME_SYMBOLS: usize = 1 + MAX_FRAME_LEN * 8 + 3;

/// Converts a duration to whole timer ticks, rounding to nearest (at least one tick).
#[inline]
pub const fn to_ticks(us: u32) -> u32 {
    let ticks = us.saturating_add(TICK_US / 2) / TICK_US;
    if ticks == 0 {
        1
    } else {
        ticks
    }
}

/// The duration the timer will actually produce for a requested `us`.
#[inline]
pub const fn quantize_us(us: u32) -> u32 {
    to_ticks(us) * TICK_US
}
