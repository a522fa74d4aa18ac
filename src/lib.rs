// src/lib.rs

#![cfg_attr(not(test), no_std)] // no_std everywhere but the unit tests

pub mod app;
pub mod common;
pub mod link;
pub mod phys;
pub mod stack;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types for convenience
pub use app::{AppEvent, DiagnosticApp, Request, Response};
pub use common::{Config, Frame, Header, J1850Error, Level, Polarity, Symbol, VpwTimer};
pub use link::{DataLink, DlEvent, ReceiveFailure, SendFailure};
pub use stack::J1850Stack;
