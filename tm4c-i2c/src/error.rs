//! Errors and transaction outcomes

use core::fmt;

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

/// I2C error
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No device acknowledged the address
    AddressNack,
    /// A data byte was not acknowledged; `sent` bytes got through before it
    DataNack {
        /// Bytes acknowledged before the NACK
        sent: usize,
    },
    /// Another master won the bus
    ArbitrationLost,
    /// The clock-low timeout expired while waiting on the controller
    ClockTimeout,
    /// The first receive after a read address asked for zero bytes
    EmptyFirstReceive,
    /// A receive was attempted without a bus held by a read address
    NotHeld,
    /// The bus stopped before the buffer was filled
    ShortRead {
        /// Bytes received before the STOP
        received: usize,
    },
    /// A transaction is already in flight on this controller
    Busy,
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match *self {
            Error::AddressNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Error::DataNack { .. } => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Error::ArbitrationLost => ErrorKind::ArbitrationLoss,
            _ => ErrorKind::Other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AddressNack => f.write_str("address not acknowledged"),
            Error::DataNack { sent } => write!(f, "data not acknowledged after {} bytes", sent),
            Error::ArbitrationLost => f.write_str("arbitration lost"),
            Error::ClockTimeout => f.write_str("clock-low timeout"),
            Error::EmptyFirstReceive => f.write_str("first receive must read at least one byte"),
            Error::NotHeld => f.write_str("bus not held for a receive"),
            Error::ShortRead { received } => write!(f, "bus stopped after {} bytes", received),
            Error::Busy => f.write_str("transaction already in flight"),
        }
    }
}

/// How an interrupt-driven transaction ended
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Every byte went through (for a held bus: the phase completed)
    Acknowledged,
    /// The address or a data byte was not acknowledged
    NotAcknowledged,
    /// Another master won the bus
    ArbitrationLost,
    /// The clock-low timeout expired
    ClockTimeout,
    /// The bus stopped after `n` of the requested bytes were read
    ShortRead(usize),
}

impl Outcome {
    /// `true` only for [`Outcome::Acknowledged`]
    pub fn is_ack(&self) -> bool {
        matches!(self, Outcome::Acknowledged)
    }
}

/// Invalid bus configuration
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The bus frequency is zero or too fast for the system clock
    BusTooFast,
    /// The bus frequency is too slow to fit the 7-bit timer period
    BusTooSlow,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BusTooFast => f.write_str("bus frequency too high for system clock"),
            ConfigError::BusTooSlow => f.write_str("bus frequency too low for timer period"),
        }
    }
}
