// src/common/symbol.rs

use super::timing::{
    BIT_ONE_ACTIVE_US, BIT_ONE_PASSIVE_US, BIT_ZERO_ACTIVE_US, BIT_ZERO_PASSIVE_US, BRK_US,
    EOD_US, EOF_US, IFS_US, SEPARATOR_US, SOF_US, SYMBOL_TOLERANCE_US,
};

/// A J1850 VPW symbol.
///
/// Every valid symbol is a pulse pair: the bus is held active for
/// [`SymbolTiming::active_us`] and then passive for [`SymbolTiming::passive_us`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Symbol {
    BitZero = 0,
    BitOne = 1,
    /// Start of frame
    Sof = 2,
    /// End of data
    Eod = 3,
    /// End of frame
    Eof = 4,
    /// Inter-frame separation
    Ifs = 5,
    /// Break
    Brk = 6,
    /// A pulse pair that matched no symbol.
    Invalid = 7,
}

/// Nominal phase lengths of one symbol, in microseconds.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SymbolTiming {
    pub active_us: u32,
    pub passive_us: u32,
}

impl SymbolTiming {
    pub const fn new(active_us: u32, passive_us: u32) -> Self {
        Self { active_us, passive_us }
    }
}

// Distinct nominal lengths per phase. The last passive entry (IFS) is open-ended.
const ACTIVE_NOMINALS: [u32; 4] = [BIT_ZERO_ACTIVE_US, BIT_ONE_ACTIVE_US, SOF_US, BRK_US];
const PASSIVE_NOMINALS: [u32; 5] = [BIT_ONE_PASSIVE_US, BIT_ZERO_PASSIVE_US, EOD_US, EOF_US, IFS_US];

impl Symbol {
    /// All symbols that can appear on the wire.
    pub const VALID: [Symbol; 7] = [
        Symbol::BitZero,
        Symbol::BitOne,
        Symbol::Sof,
        Symbol::Eod,
        Symbol::Eof,
        Symbol::Ifs,
        Symbol::Brk,
    ];

    /// Tries to convert a u8 into a Symbol.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Symbol::BitZero),
            1 => Some(Symbol::BitOne),
            2 => Some(Symbol::Sof),
            3 => Some(Symbol::Eod),
            4 => Some(Symbol::Eof),
            5 => Some(Symbol::Ifs),
            6 => Some(Symbol::Brk),
            7 => Some(Symbol::Invalid),
            _ => None,
        }
    }

    /// The data bit symbol for `bit`.
    #[inline]
    pub const fn from_bit(bit: bool) -> Self {
        if bit {
            Symbol::BitOne
        } else {
            Symbol::BitZero
        }
    }

    /// Returns the bit value for data symbols.
    #[inline]
    pub const fn bit(&self) -> Option<bool> {
        match self {
            Symbol::BitZero => Some(false),
            Symbol::BitOne => Some(true),
            _ => None,
        }
    }

    /// Nominal timing, `None` for `Invalid`.
    pub const fn timing(&self) -> Option<SymbolTiming> {
        match self {
            Symbol::BitZero => Some(SymbolTiming::new(BIT_ZERO_ACTIVE_US, BIT_ZERO_PASSIVE_US)),
            Symbol::BitOne => Some(SymbolTiming::new(BIT_ONE_ACTIVE_US, BIT_ONE_PASSIVE_US)),
            Symbol::Sof => Some(SymbolTiming::new(SOF_US, SEPARATOR_US)),
            Symbol::Eod => Some(SymbolTiming::new(SEPARATOR_US, EOD_US)),
            Symbol::Eof => Some(SymbolTiming::new(SEPARATOR_US, EOF_US)),
            Symbol::Ifs => Some(SymbolTiming::new(SEPARATOR_US, IFS_US)),
            Symbol::Brk => Some(SymbolTiming::new(BRK_US, SEPARATOR_US)),
            Symbol::Invalid => None,
        }
    }

    /// Classifies a measured pulse pair.
    ///
    /// Each phase snaps to the nearest nominal length for that phase; a measurement
    /// sitting exactly between two nominals, or further than
    /// [`SYMBOL_TOLERANCE_US`] from the nearest one, is rejected. A passive phase
    /// longer than the IFS is still an IFS (the bus went idle).
    pub fn classify(active_us: u32, passive_us: u32) -> Symbol {
        let (Some(active), Some(passive)) = (
            nearest_nominal(active_us, &ACTIVE_NOMINALS, false),
            nearest_nominal(passive_us, &PASSIVE_NOMINALS, true),
        ) else {
            return Symbol::Invalid;
        };

        Symbol::VALID
            .iter()
            .copied()
            .find(|symbol| symbol.timing() == Some(SymbolTiming::new(active, passive)))
            .unwrap_or(Symbol::Invalid)
    }
}

fn nearest_nominal(measured: u32, nominals: &[u32], open_ended: bool) -> Option<u32> {
    let mut best: Option<(u32, u32)> = None; // (nominal, distance)
    let mut tie = false;

    for &nominal in nominals {
        let distance = measured.abs_diff(nominal);
        match best {
            Some((_, best_distance)) if distance == best_distance => tie = true,
            Some((_, best_distance)) if distance > best_distance => {}
            _ => {
                best = Some((nominal, distance));
                tie = false;
            }
        }
    }

    let (nominal, distance) = best?;
    if tie {
        return None;
    }

    let longest = nominals.last().copied().unwrap_or(nominal);
    if distance <= SYMBOL_TOLERANCE_US || (open_ended && nominal == longest && measured > nominal) {
        Some(nominal)
    } else {
        None
    }
}
