// src/common/config.rs

use super::hal_traits::Polarity;
use super::header::Header;
use super::timing::DEFAULT_RESPONSE_TIMEOUT_US;

/// Runtime configuration for a [`J1850Stack`](crate::stack::J1850Stack).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Electrical polarity of the output pin.
    pub polarity: Polarity,
    /// How long the data link waits for a response after sending a message.
    /// `None` disables the wait, which suits a node that only answers.
    pub response_timeout_us: Option<u32>,
    /// Header placed in front of every diagnostic request.
    pub request_header: Header,
}

impl Config {
    pub const fn new() -> Self {
        Config {
            polarity: Polarity::ActiveHigh,
            response_timeout_us: Some(DEFAULT_RESPONSE_TIMEOUT_US),
            request_header: Header::OBD_REQUEST,
        }
    }

    pub const fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub const fn with_response_timeout(mut self, timeout_us: Option<u32>) -> Self {
        self.response_timeout_us = timeout_us;
        self
    }

    pub const fn with_request_header(mut self, header: Header) -> Self {
        self.request_header = header;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
