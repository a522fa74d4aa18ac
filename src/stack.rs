// src/stack.rs

use crate::app::{AppEvent, DiagnosticApp, Request};
use crate::common::{
    config::Config,
    error::J1850Error,
    hal_traits::{Level, VpwTimer},
};
use crate::link::{DataLink, DlEvent};
use crate::phys::Physical;
use embedded_hal::digital::OutputPin;

/// A complete J1850 VPW node: physical layer, data link and diagnostic shim.
///
/// Every entry point runs one event to completion and returns at most one
/// [`AppEvent`]. If any layer reports an error, every state machine is reset
/// to Idle with the bus released before the error is returned.
#[derive(Debug)]
pub struct J1850Stack<P: OutputPin, T: VpwTimer> {
    link: DataLink<P, T>,
    app: DiagnosticApp,
    config: Config,
}

impl<P: OutputPin, T: VpwTimer> J1850Stack<P, T> {
    pub fn new(pin: P, timer: T, config: Config) -> Self {
        let phys = Physical::new(pin, timer, config.polarity);
        J1850Stack {
            link: DataLink::new(phys, config.response_timeout_us),
            app: DiagnosticApp::new(config.request_header),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn link(&self) -> &DataLink<P, T> {
        &self.link
    }

    pub fn app(&self) -> &DiagnosticApp {
        &self.app
    }

    /// Releases the bus and starts listening. Call once before anything else.
    pub fn start(&mut self) -> Result<(), J1850Error<P::Error>> {
        #[cfg(feature = "defmt")]
        defmt::info!("J1850 VPW stack starting");
        let result = self.link.start();
        self.guard(result)
    }

    /// Sends a diagnostic request; the outcome arrives as an [`AppEvent`].
    pub fn request(&mut self, request: Request) -> Result<(), J1850Error<P::Error>> {
        let result = self.app.request(&mut self.link, request);
        self.guard_request(result)
    }

    /// Sends a raw message (header + data); completion is [`AppEvent::Sent`].
    pub fn send_raw(&mut self, message: &[u8]) -> Result<(), J1850Error<P::Error>> {
        let result = self.app.send_raw(&mut self.link, message);
        self.guard_request(result)
    }

    /// Cancels the outstanding request or send. Idempotent.
    pub fn cancel(&mut self) -> Result<Option<AppEvent>, J1850Error<P::Error>> {
        let result = self.app.cancel(&mut self.link);
        self.guard(result)
    }

    /// Feeds a bus edge from the input capture.
    pub fn on_edge(
        &mut self,
        level: Level,
        elapsed_us: u32,
    ) -> Result<Option<AppEvent>, J1850Error<P::Error>> {
        let result = self.link.on_edge(level, elapsed_us);
        self.dispatch(result)
    }

    /// Call from the timer interrupt.
    pub fn on_timer_expired(&mut self) -> Result<Option<AppEvent>, J1850Error<P::Error>> {
        let result = self.link.on_timer_expired();
        self.dispatch(result)
    }

    /// Polled alternative to [`on_timer_expired`](Self::on_timer_expired).
    pub fn poll_timer(&mut self) -> nb::Result<Option<AppEvent>, J1850Error<P::Error>> {
        match self.link.poll_timer() {
            Ok(event) => Ok(event.and_then(|event| self.app.handle(event))),
            Err(nb::Error::WouldBlock) => Err(nb::Error::WouldBlock),
            Err(nb::Error::Other(e)) => {
                self.fail_safe();
                Err(nb::Error::Other(e))
            }
        }
    }

    fn dispatch(
        &mut self,
        result: Result<Option<DlEvent>, J1850Error<P::Error>>,
    ) -> Result<Option<AppEvent>, J1850Error<P::Error>> {
        let event = self.guard(result)?;
        Ok(event.and_then(|event| self.app.handle(event)))
    }

    // API misuse is refused before any state changed, so only real faults reset.
    fn guard_request(&mut self, result: Result<(), J1850Error<P::Error>>) -> Result<(), J1850Error<P::Error>> {
        match result {
            Err(e @ (J1850Error::RequestPending | J1850Error::LinkBusy | J1850Error::InvalidLength { .. })) => {
                Err(e)
            }
            other => self.guard(other),
        }
    }

    fn guard<R>(&mut self, result: Result<R, J1850Error<P::Error>>) -> Result<R, J1850Error<P::Error>> {
        if result.is_err() {
            self.fail_safe();
        }
        result
    }

    fn fail_safe(&mut self) {
        #[cfg(feature = "defmt")]
        defmt::warn!("fail-safe reset");
        self.app.reset();
        // The caller gets the original error; a failed release is only logged
        if self.link.reset().is_err() {
            #[cfg(feature = "defmt")]
            defmt::error!("fail-safe reset could not release the bus");
        }
    }
}
