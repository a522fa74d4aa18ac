// src/app/response.rs

use super::request::{service, Request};
use crate::common::{frame::Frame, timing::MAX_DATA_LEN};
use arrayvec::ArrayVec;

/// Why a received frame was not accepted as the answer to a request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResponseError {
    /// Header is not a functional OBD response (`48 6B xx`).
    #[error("not an OBD response")]
    NotAResponse,
    #[error("response too short")]
    TooShort,
    #[error("unexpected service {got:#04x}, expected {expected:#04x}")]
    UnexpectedService { expected: u8, got: u8 },
    #[error("unexpected PID {got:#04x}, expected {expected:#04x}")]
    UnexpectedPid { expected: u8, got: u8 },
    /// The ECU refused the request with a negative response code.
    #[error("negative response to service {service:#04x}: code {code:#04x}")]
    Negative { service: u8, code: u8 },
}

/// A positive J1979 response. The payload is kept raw.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Response {
    ecu: u8,
    service: u8,
    pid: Option<u8>,
    payload: ArrayVec<u8, MAX_DATA_LEN>,
}

impl Response {
    /// Checks `frame` against `request` and extracts the payload.
    pub fn decode(frame: &Frame, request: Request) -> Result<Self, ResponseError> {
        let header = frame.header();
        if !header.is_obd_response() {
            return Err(ResponseError::NotAResponse);
        }

        let (&sid, rest) = frame.data().split_first().ok_or(ResponseError::TooShort)?;

        if sid == service::NEGATIVE_RESPONSE {
            return match rest {
                [rejected, .., code] if *rejected == request.service() => {
                    Err(ResponseError::Negative { service: *rejected, code: *code })
                }
                [rejected, ..] if rest.len() >= 2 => Err(ResponseError::UnexpectedService {
                    expected: request.service(),
                    got: *rejected,
                }),
                _ => Err(ResponseError::TooShort),
            };
        }

        if sid != request.response_service() {
            return Err(ResponseError::UnexpectedService {
                expected: request.response_service(),
                got: sid,
            });
        }

        let (pid, payload) = match request.pid() {
            Some(expected) => {
                let (&got, payload) = rest.split_first().ok_or(ResponseError::TooShort)?;
                if got != expected {
                    return Err(ResponseError::UnexpectedPid { expected, got });
                }
                (Some(got), payload)
            }
            None => (None, rest),
        };

        let mut response = Response { ecu: header.source, service: sid, pid, payload: ArrayVec::new() };
        // Frame data never exceeds MAX_DATA_LEN, so the payload always fits
        let _ = response.payload.try_extend_from_slice(payload);
        Ok(response)
    }

    /// Source address of the answering ECU.
    #[inline]
    pub fn ecu(&self) -> u8 {
        self.ecu
    }

    /// Response SID (request SID + 0x40).
    #[inline]
    pub fn service(&self) -> u8 {
        self.service
    }

    #[inline]
    pub fn pid(&self) -> Option<u8> {
        self.pid
    }

    /// Bytes after the SID and PID echo.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Response {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Response {{ ecu: {=u8:#x}, service: {=u8:#x}, pid: {}, payload: {=[u8]:02X} }}",
            self.ecu,
            self.service,
            self.pid,
            self.payload()
        )
    }
}
