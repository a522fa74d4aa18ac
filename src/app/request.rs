// src/app/request.rs

use crate::common::{
    error::J1850Error,
    frame::Frame,
    header::Header,
    timing::MAX_MESSAGE_LEN,
};
use arrayvec::ArrayVec;
use core::fmt::Debug;

/// SAE J1979 service identifiers.
pub mod service {
    /// Request current powertrain diagnostic data.
    pub const CURRENT_DATA: u8 = 0x01;
    /// Request emission-related diagnostic trouble codes.
    pub const READ_DTCS: u8 = 0x03;
    /// Clear/reset emission-related diagnostic information.
    pub const CLEAR_DTCS: u8 = 0x04;
    /// First byte of a negative response.
    pub const NEGATIVE_RESPONSE: u8 = 0x7F;
    /// Added to the request SID to form the positive response SID.
    pub const RESPONSE_OFFSET: u8 = 0x40;
}

/// Parameter ids for service 01 that the reader queries. Payloads are not interpreted here.
pub mod pid {
    /// Number of emission-related DTCs and MIL status.
    pub const MONITOR_STATUS: u8 = 0x01;
    pub const COOLANT_TEMPERATURE: u8 = 0x05;
    pub const ENGINE_RPM: u8 = 0x0C;
    pub const THROTTLE_POSITION: u8 = 0x11;
    /// Wide range lambda, bank 1 sensor 1.
    pub const O2S1_WR_LAMBDA_BANK1: u8 = 0x24;
    /// Wide range lambda, bank 2 sensor 1.
    pub const O2S1_WR_LAMBDA_BANK2: u8 = 0x28;
}

/// A diagnostic request the application can issue.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// Service 01 PID 01: number of DTCs and MIL status.
    MonitorStatus,
    /// Service 03.
    ReadDtcs,
    /// Service 04.
    ClearDtcs,
    /// Service 01 with an arbitrary PID.
    CurrentData(u8),
}

impl Request {
    pub const fn service(&self) -> u8 {
        match self {
            Request::MonitorStatus | Request::CurrentData(_) => service::CURRENT_DATA,
            Request::ReadDtcs => service::READ_DTCS,
            Request::ClearDtcs => service::CLEAR_DTCS,
        }
    }

    pub const fn pid(&self) -> Option<u8> {
        match self {
            Request::MonitorStatus => Some(pid::MONITOR_STATUS),
            Request::CurrentData(pid) => Some(*pid),
            Request::ReadDtcs | Request::ClearDtcs => None,
        }
    }

    /// SID a positive response to this request carries.
    pub const fn response_service(&self) -> u8 {
        self.service() + service::RESPONSE_OFFSET
    }

    /// The request message (header + data, no CRC).
    pub fn message(&self, header: Header) -> ArrayVec<u8, MAX_MESSAGE_LEN> {
        let mut message = ArrayVec::new();
        message.extend(header.as_bytes());
        message.push(self.service());
        if let Some(pid) = self.pid() {
            message.push(pid);
        }
        message
    }

    pub fn to_frame<E: Debug>(&self, header: Header) -> Result<Frame, J1850Error<E>> {
        Frame::new(&self.message(header))
    }
}
