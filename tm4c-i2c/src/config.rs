//! Bus configuration

use crate::error::ConfigError;

/// I2C master configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// SCL frequency in Hz
    pub bus_hz: u32,
    /// Clock-low timeout in SCL periods; 0 disables it
    pub clock_timeout: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl Config {
    /// Standard mode (100 kHz)
    pub const STANDARD: Self = Self {
        bus_hz: 100_000,
        clock_timeout: 1_000,
    };

    /// Fast mode (400 kHz)
    pub const FAST: Self = Self {
        bus_hz: 400_000,
        clock_timeout: 1_000,
    };

    /// Fast mode plus (1 MHz)
    pub const FAST_PLUS: Self = Self {
        bus_hz: 1_000_000,
        clock_timeout: 1_000,
    };

    /// MTPR value for the given system clock.
    ///
    /// SCL_LP + SCL_HP is fixed at 10 by the hardware, so
    /// `TPR = sysclk / (2 * 10 * bus_hz) - 1`, which must fit in 7 bits.
    pub fn timer_period(&self, sysclk_hz: u32) -> Result<u8, ConfigError> {
        let divisor = 20u32
            .checked_mul(self.bus_hz)
            .filter(|d| *d != 0)
            .ok_or(ConfigError::BusTooFast)?;
        let tpr = (sysclk_hz / divisor)
            .checked_sub(1)
            .ok_or(ConfigError::BusTooFast)?;
        let tpr = cast::u8(tpr).map_err(|_| ConfigError::BusTooSlow)?;
        if tpr > 0x7f {
            return Err(ConfigError::BusTooSlow);
        }
        Ok(tpr)
    }

    /// MCLKOCNT value: the counter is loaded with `CNTL << 4`
    pub fn clock_timeout_count(&self) -> u8 {
        cast::u8(self.clock_timeout >> 4).unwrap_or(u8::MAX)
    }
}
