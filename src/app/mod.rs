// src/app/mod.rs

//! SAE J1979 diagnostic shim on top of the data link.

pub mod request;
pub mod response;

pub use request::{pid, service, Request};
pub use response::{Response, ResponseError};

use crate::common::{error::J1850Error, frame::Frame, hal_traits::VpwTimer, header::Header};
use crate::link::{DataLink, DlEvent, ReceiveFailure, SendFailure};
use embedded_hal::digital::OutputPin;

/// Why a request did not produce a response.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransactionFailure {
    Send(SendFailure),
    Receive(ReceiveFailure),
    /// A frame arrived but did not answer the request.
    Rejected(ResponseError),
}

/// What the application reports to its user.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AppEvent {
    Response(Response),
    RequestFailed(TransactionFailure),
    /// A message given to [`DiagnosticApp::send_raw`] is on the wire.
    Sent,
    /// A frame arrived while no request was outstanding.
    Unsolicited(Frame),
    /// A reception failed while no request was outstanding.
    BusError(ReceiveFailure),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AppState {
    Idle,
    /// Waiting for the data link to finish sending; `None` for a raw message.
    AwaitingSent(Option<Request>),
    AwaitingResponse(Request),
}

/// One-request-at-a-time diagnostic client.
#[derive(Debug)]
pub struct DiagnosticApp {
    header: Header,
    state: AppState,
}

impl DiagnosticApp {
    pub fn new(header: Header) -> Self {
        DiagnosticApp { header, state: AppState::Idle }
    }

    #[inline]
    pub fn state(&self) -> AppState {
        self.state
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.state == AppState::Idle
    }

    pub fn request<P: OutputPin, T: VpwTimer>(
        &mut self,
        link: &mut DataLink<P, T>,
        request: Request,
    ) -> Result<(), J1850Error<P::Error>> {
        if !self.is_idle() {
            return Err(J1850Error::RequestPending);
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("request {}", request);

        link.send_message(&request.message(self.header))?;
        self.state = AppState::AwaitingSent(Some(request));
        Ok(())
    }

    /// Sends a pre-built message (header + data) without expecting an answer.
    pub fn send_raw<P: OutputPin, T: VpwTimer>(
        &mut self,
        link: &mut DataLink<P, T>,
        message: &[u8],
    ) -> Result<(), J1850Error<P::Error>> {
        if !self.is_idle() {
            return Err(J1850Error::RequestPending);
        }
        link.send_message(message)?;
        self.state = AppState::AwaitingSent(None);
        Ok(())
    }

    /// Cancels whatever is outstanding. From Idle this does nothing.
    pub fn cancel<P: OutputPin, T: VpwTimer>(
        &mut self,
        link: &mut DataLink<P, T>,
    ) -> Result<Option<AppEvent>, J1850Error<P::Error>> {
        if self.is_idle() {
            return Ok(None);
        }
        let event = link.cancel_message()?;
        let reported = event.and_then(|event| self.handle(event));
        self.state = AppState::Idle;
        Ok(reported)
    }

    /// Turns a data link event into at most one application event.
    pub fn handle(&mut self, event: DlEvent) -> Option<AppEvent> {
        match (self.state, event) {
            (AppState::AwaitingSent(Some(request)), DlEvent::MessageSent) => {
                self.state = AppState::AwaitingResponse(request);
                None
            }
            (AppState::AwaitingSent(None), DlEvent::MessageSent) => {
                self.state = AppState::Idle;
                Some(AppEvent::Sent)
            }
            (AppState::AwaitingSent(_), DlEvent::MessageSendFailed(reason)) => {
                self.state = AppState::Idle;
                Some(AppEvent::RequestFailed(TransactionFailure::Send(reason)))
            }
            (AppState::AwaitingResponse(request), DlEvent::MessageReceived(frame)) => {
                self.state = AppState::Idle;
                Some(match Response::decode(&frame, request) {
                    Ok(response) => AppEvent::Response(response),
                    Err(reason) => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("{} rejected: {}", frame, reason);
                        AppEvent::RequestFailed(TransactionFailure::Rejected(reason))
                    }
                })
            }
            (AppState::AwaitingResponse(_), DlEvent::MessageReceiveFailed(reason)) => {
                self.state = AppState::Idle;
                Some(AppEvent::RequestFailed(TransactionFailure::Receive(reason)))
            }
            (_, DlEvent::MessageReceived(frame)) => Some(AppEvent::Unsolicited(frame)),
            (_, DlEvent::MessageReceiveFailed(reason)) => Some(AppEvent::BusError(reason)),
            // Send results with nothing outstanding
            (_, DlEvent::MessageSent) | (_, DlEvent::MessageSendFailed(_)) => None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.state = AppState::Idle;
    }
}
