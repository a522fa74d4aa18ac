// src/common/frame.rs

use super::crc::{calculate_crc8, verify_frame_crc};
use super::error::J1850Error;
use super::header::Header;
use super::timing::{MAX_FRAME_LEN, MAX_MESSAGE_LEN, MIN_FRAME_LEN, MIN_MESSAGE_LEN};
use arrayvec::ArrayVec;
use core::fmt;

/// A complete J1850 frame as it appears on the wire: header, data and the trailing CRC.
///
/// A `Frame` is always 4..=12 bytes long and always carries a CRC that matches
/// its contents; both constructors enforce that.
#[derive(Clone, Eq, PartialEq)]
pub struct Frame {
    bytes: ArrayVec<u8, MAX_FRAME_LEN>,
}

impl Frame {
    /// Builds a frame from a message (header + data) by appending its CRC.
    pub fn new<E: fmt::Debug>(message: &[u8]) -> Result<Self, J1850Error<E>> {
        if !(MIN_MESSAGE_LEN..=MAX_MESSAGE_LEN).contains(&message.len()) {
            return Err(J1850Error::InvalidLength {
                len: message.len(),
                min: MIN_MESSAGE_LEN,
                max: MAX_MESSAGE_LEN,
            });
        }

        let mut bytes = ArrayVec::new();
        // Length checked above, these cannot overflow
        bytes.extend(message.iter().copied());
        bytes.push(calculate_crc8(message));
        Ok(Frame { bytes })
    }

    /// Builds a frame from a header and data bytes.
    pub fn with_header<E: fmt::Debug>(header: Header, data: &[u8]) -> Result<Self, J1850Error<E>> {
        let mut message: ArrayVec<u8, MAX_MESSAGE_LEN> = ArrayVec::new();
        message.extend(header.as_bytes());
        message.try_extend_from_slice(data).map_err(|_| J1850Error::InvalidLength {
            len: 3 + data.len(),
            min: MIN_MESSAGE_LEN,
            max: MAX_MESSAGE_LEN,
        })?;
        Self::new(&message)
    }

    /// Validates received wire bytes (CRC included).
    pub fn from_wire<E: fmt::Debug>(wire: &[u8]) -> Result<Self, J1850Error<E>> {
        if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&wire.len()) {
            return Err(J1850Error::InvalidLength {
                len: wire.len(),
                min: MIN_FRAME_LEN,
                max: MAX_FRAME_LEN,
            });
        }
        verify_frame_crc(wire)?;

        let mut bytes = ArrayVec::new();
        bytes.extend(wire.iter().copied());
        Ok(Frame { bytes })
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Never true, a frame holds at least a header and CRC.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn header(&self) -> Header {
        Header::new(self.bytes[0], self.bytes[1], self.bytes[2])
    }

    /// Header and data, without the CRC.
    pub fn message(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - 1]
    }

    /// Data bytes between the header and the CRC.
    pub fn data(&self) -> &[u8] {
        &self.bytes[3..self.bytes.len() - 1]
    }

    pub fn crc(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame(")?;
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        write!(f, ")")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Frame {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Frame({=[u8]:02X})", self.as_bytes())
    }
}
