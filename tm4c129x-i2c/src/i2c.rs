//! Inter-Integrated Circuit (I2C) controllers

use cortex_m::peripheral::NVIC;
use tm4c129x::{Interrupt, I2C0, I2C1, I2C2, I2C3, I2C4, I2C5, I2C6, I2C7, I2C8, I2C9};

use tm4c_i2c::i2c_registers;

/// I2C controller bound to the transaction engines.
///
/// Pin muxing, peripheral power and reset are left to the caller.
pub struct I2c<I2Cx> {
    /// Underlying I2C peripheral
    i2c: I2Cx,
}

i2c_registers!(
    I2C0: I2C0,
    I2C1: I2C1,
    I2C2: I2C2,
    I2C3: I2C3,
    I2C4: I2C4,
    I2C5: I2C5,
    I2C6: I2C6,
    I2C7: I2C7,
    I2C8: I2C8,
    I2C9: I2C9,
);
