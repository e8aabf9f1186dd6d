//! I2C transaction engine for the TM4C I2C controller
//!
//! The controller has no FIFO and no DMA assist: every byte is one command
//! written to MCS followed by one status event. This crate drives that
//! per-byte state machine in two ways:
//!
//! * [`Blocking`] busy-waits on the raw status after each command.
//! * [`BusContext`] arms a continuation, returns, and is resumed by
//!   [`BusContext::on_interrupt`] from the controller's interrupt handler.
//!
//! [`SlaveSession`] handles the same controller acting as a slave.
//!
//! Everything is written against the [`Registers`] trait; the chip crates bind
//! their PAC peripherals to it with [`i2c_registers!`].

#![cfg_attr(not(test), no_std)]

mod log;

pub mod blocking;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod i2c;
pub mod master;
pub mod registers;
pub mod slave;

#[cfg(test)]
mod sim;

pub use crate::blocking::Blocking;
pub use crate::config::Config;
pub use crate::dispatch::{EventFlags, Shared};
pub use crate::error::{ConfigError, Error, Outcome};
pub use crate::master::{BusContext, Completion, Notify, State};
pub use crate::registers::Registers;
pub use crate::slave::{SlaveEvents, SlaveSession};

/// Direction bit of a target address: set for a read
pub const READ: u8 = 0x01;

/// Target address byte (7-bit address in bits 7:1) for a write
pub const fn write_address(address: u8) -> u8 {
    address << 1
}

/// Target address byte (7-bit address in bits 7:1) for a read
pub const fn read_address(address: u8) -> u8 {
    (address << 1) | READ
}
