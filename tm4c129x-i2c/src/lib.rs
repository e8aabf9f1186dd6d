//! TM4C129x bindings for the `tm4c-i2c` transaction engine
//!
//! ```ignore
//! let i2c = I2c::new(p.I2C0, &Config::FAST, 120_000_000)?;
//! let mut bus = Blocking::new(i2c);
//! bus.send(write_address(0x3c), &[0x00, 0xaf])?;
//! ```

#![no_std]

pub mod i2c;

pub use tm4c129x;
pub use tm4c_i2c::{
    read_address, write_address, Blocking, BusContext, Config, ConfigError, Error, EventFlags,
    Outcome, Registers, Shared, SlaveEvents, SlaveSession, State,
};

pub use crate::i2c::I2c;
