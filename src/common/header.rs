// src/common/header.rs

use super::error::J1850Error;
use core::convert::TryFrom;
use core::fmt;

/// The three-byte J1850 header: priority/type, target address, source address.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header {
    pub priority: u8,
    pub target: u8,
    pub source: u8,
}

impl Header {
    /// Functional OBD request from the off-board tester: `68 6A F1`.
    pub const OBD_REQUEST: Header = Header::new(0x68, 0x6A, 0xF1);
    /// Priority/type byte of a functional OBD response.
    pub const OBD_RESPONSE_PRIORITY: u8 = 0x48;
    /// Functional target address of OBD responses.
    pub const OBD_RESPONSE_TARGET: u8 = 0x6B;
    /// Physical address of the scan tool.
    pub const TESTER_ADDRESS: u8 = 0xF1;

    pub const fn new(priority: u8, target: u8, source: u8) -> Self {
        Header { priority, target, source }
    }

    /// Header of a functional OBD response sent by `ecu`: `48 6B <ecu>`.
    pub const fn obd_response(ecu: u8) -> Self {
        Header::new(Self::OBD_RESPONSE_PRIORITY, Self::OBD_RESPONSE_TARGET, ecu)
    }

    #[inline]
    pub const fn as_bytes(&self) -> [u8; 3] {
        [self.priority, self.target, self.source]
    }

    #[inline]
    pub const fn is_obd_response(&self) -> bool {
        self.priority == Self::OBD_RESPONSE_PRIORITY && self.target == Self::OBD_RESPONSE_TARGET
    }

    /// Reads the header from the start of a message or frame.
    pub fn from_slice<E: fmt::Debug>(bytes: &[u8]) -> Result<Self, J1850Error<E>> {
        match bytes {
            [priority, target, source, ..] => Ok(Header::new(*priority, *target, *source)),
            _ => Err(J1850Error::InvalidLength { len: bytes.len(), min: 3, max: usize::MAX }),
        }
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::OBD_REQUEST
    }
}

impl TryFrom<&[u8]> for Header {
    type Error = J1850Error<()>;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::from_slice(value)
    }
}

impl From<Header> for [u8; 3] {
    fn from(value: Header) -> Self {
        value.as_bytes()
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X} {:02X}", self.priority, self.target, self.source)
    }
}
