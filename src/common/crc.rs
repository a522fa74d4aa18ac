// src/common/crc.rs

use super::error::J1850Error;
use crc::{Algorithm, Crc};

/// CRC algorithm used by SAE J1850 (CRC-8/SAE-J1850).
/// Polynomial: 0x1D (x^8 + x^4 + x^3 + x^2 + 1)
/// Initial Value: 0xFF
/// Input Reflected: false
/// Output Reflected: false
/// Final XOR: 0xFF (the transmitted byte is the one's complement of the register)
/// Check Value: 0x4B (for "123456789")
/// Residue: 0xC4
pub const J1850_CRC: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x1D,
    init: 0xFF,
    refin: false,
    refout: false,
    xorout: 0xFF,
    check: 0x4B,
    residue: 0xC4,
};

// Create a Crc instance for the J1850 algorithm for reuse.
const CRC_COMPUTER: Crc<u8> = Crc::<u8>::new(&J1850_CRC);

/// Calculates the J1850 CRC byte over `data`.
///
/// `data` is every byte of the frame that precedes the CRC: the three header
/// bytes followed by the data bytes.
#[inline]
pub fn calculate_crc8(data: &[u8]) -> u8 {
    CRC_COMPUTER.checksum(data)
}

/// Verifies a complete wire frame whose last byte is the CRC.
///
/// # Returns
///
/// * `Ok(())` if the CRC is valid.
/// * `Err(J1850Error::InvalidLength)` if there is no byte to check.
/// * `Err(J1850Error::CrcMismatch)` if the CRCs don't match.
pub fn verify_frame_crc<E>(frame_with_crc: &[u8]) -> Result<(), J1850Error<E>>
where
    E: core::fmt::Debug,
{
    let Some((&received, data_part)) = frame_with_crc.split_last() else {
        return Err(J1850Error::InvalidLength { len: 0, min: 1, max: usize::MAX });
    };

    let calculated = calculate_crc8(data_part);
    if calculated == received {
        Ok(())
    } else {
        Err(J1850Error::CrcMismatch { expected: received, calculated })
    }
}
