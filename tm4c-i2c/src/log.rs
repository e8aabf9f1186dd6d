//! Logging shims
//!
//! Forward to `defmt` when the `defmt` feature is enabled. Otherwise only the
//! arguments are evaluated, so the engines can log from interrupt context
//! without pulling a logger into builds that do not want one.

#[cfg(feature = "defmt")]
macro_rules! i2c_warn {
    ($($arg:tt)*) => { defmt::warn!($($arg)*) };
}

#[cfg(not(feature = "defmt"))]
macro_rules! i2c_warn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        $(let _ = &$arg;)*
    }};
}

#[cfg(feature = "defmt")]
macro_rules! i2c_debug {
    ($($arg:tt)*) => { defmt::debug!($($arg)*) };
}

#[cfg(not(feature = "defmt"))]
macro_rules! i2c_debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        $(let _ = &$arg;)*
    }};
}

pub(crate) use i2c_debug;
pub(crate) use i2c_warn;
