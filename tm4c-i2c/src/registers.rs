//! Register interface of one TM4C I2C controller
//!
//! The engines never touch memory-mapped I/O directly. Everything they need
//! from the controller goes through [`Registers`], which the chip crates
//! implement for their PAC peripherals (see [`i2c_registers!`](crate::i2c_registers)) and which the
//! tests implement with a simulated bus.
//!
//! Bit values follow the TM4C129 register map.

use bitflags::bitflags;

bitflags! {
    /// Master raw/masked interrupt status (MRIS / MMIS), also used for the
    /// interrupt mask (MIMR) and the interrupt clear register (MICR).
    #[repr(transparent)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct MasterStatus: u32 {
        /// The current byte cycle finished (RIS)
        const DATA = 0x0000_0001;
        /// Clock-low timeout
        const CLOCK_TIMEOUT = 0x0000_0002;
        /// Address or data byte not acknowledged
        const NACK = 0x0000_0010;
        /// START condition seen on the bus
        const START = 0x0000_0020;
        /// STOP condition seen on the bus
        const STOP = 0x0000_0040;
        /// Arbitration lost
        const ARB_LOST = 0x0000_0080;
    }
}

bitflags! {
    /// Master control/status register (MCS) as read back.
    #[repr(transparent)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct ControlStatus: u32 {
        /// The controller is clocking a byte
        const BUSY = 0x0000_0001;
        /// The last operation failed: see ADRACK, DATACK and ARBLST
        const ERROR = 0x0000_0002;
        /// The address was not acknowledged
        const ADRACK = 0x0000_0004;
        /// The data byte was not acknowledged
        const DATACK = 0x0000_0008;
        /// Arbitration lost
        const ARBLST = 0x0000_0010;
        /// The controller is idle
        const IDLE = 0x0000_0020;
        /// Some master owns the bus
        const BUSBSY = 0x0000_0040;
        /// SCL was held low past the clock-low timeout
        const CLKTO = 0x0000_0080;
    }
}

bitflags! {
    /// Slave raw/masked interrupt status (SRIS / SMIS), the slave interrupt
    /// mask (SIMR) and the slave interrupt clear register (SICR).
    #[repr(transparent)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct SlaveInterrupt: u32 {
        /// A byte was received or one is requested
        const DATA = 0x0000_0001;
        /// START addressed to our own address
        const START = 0x0000_0002;
        /// STOP after we were addressed
        const STOP = 0x0000_0004;
    }
}

bitflags! {
    /// Slave control/status register (SCSR) as read back.
    #[repr(transparent)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct SlaveRequest: u32 {
        /// The master wrote a byte that is waiting in SDR
        const RREQ = 0x0000_0001;
        /// The master wants a byte: SDR must be written
        const TREQ = 0x0000_0002;
        /// The pending byte is the first one after the address
        const FBR = 0x0000_0004;
        /// Own address 2 matched instead of own address 1
        const OAR2SEL = 0x0000_0008;
        /// A quick command was received
        const QCMDST = 0x0000_0010;
        /// Direction bit of the quick command (set for read)
        const QCMDRW = 0x0000_0020;
    }
}

const RUN: u32 = 0x01;
const START: u32 = 0x02;
const STOP: u32 = 0x04;
const ACK: u32 = 0x08;
const QCMD: u32 = 0x20;

/// Master command opcodes written to MCS
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// START, address, STOP
    QuickCommand,
    /// START, address, the only staged byte, STOP
    SingleSend,
    /// START, address, first staged byte
    BurstSendStart,
    /// Next staged byte, no STOP
    BurstSendContinue,
    /// Last staged byte, then STOP
    BurstSendFinish,
    /// STOP after a failed send
    BurstSendErrorStop,
    /// (Repeated) START, address, first byte received with ACK
    BurstReceiveStart,
    /// Next byte received with ACK
    BurstReceiveContinue,
    /// One more byte received with NACK, then STOP
    BurstReceiveFinish,
    /// One more byte received with NACK, bus kept for a repeated start
    BurstReceiveNack,
    /// STOP without receiving anything else
    BurstReceiveErrorStop,
}

impl Command {
    /// Value to write to MCS
    pub const fn bits(self) -> u32 {
        match self {
            Command::QuickCommand => QCMD | STOP | START | RUN,
            Command::SingleSend => STOP | START | RUN,
            Command::BurstSendStart => START | RUN,
            Command::BurstSendContinue => RUN,
            Command::BurstSendFinish => STOP | RUN,
            Command::BurstSendErrorStop => STOP,
            Command::BurstReceiveStart => ACK | START | RUN,
            Command::BurstReceiveContinue => ACK | RUN,
            Command::BurstReceiveFinish => STOP | RUN,
            Command::BurstReceiveNack => RUN,
            Command::BurstReceiveErrorStop => STOP,
        }
    }

    /// The controller emits a STOP once the command completes
    pub const fn ends_with_stop(self) -> bool {
        self.bits() & STOP != 0
    }
}

/// Slave ACK override (SACKCTL)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AckOverride {
    /// Hardware decides (override disabled)
    Hardware,
    /// Force an ACK for the current byte
    Ack,
    /// Force a NACK for the current byte
    Nack,
}

impl AckOverride {
    const ACKOEN: u32 = 0x1;
    const ACKOVAL: u32 = 0x2;

    /// Value to write to SACKCTL
    pub const fn bits(self) -> u32 {
        match self {
            AckOverride::Hardware => 0,
            AckOverride::Ack => Self::ACKOEN,
            AckOverride::Nack => Self::ACKOEN | Self::ACKOVAL,
        }
    }
}

/// Register access for one controller instance.
///
/// Methods take `&self` because the hardware registers are volatile cells;
/// exclusive use of a controller is enforced by whoever owns the value.
pub trait Registers {
    /// MSA: 7-bit address in bits 7:1, direction in bit 0
    fn set_target(&self, address: u8);
    /// MDR write: stage one byte to send
    fn write_data(&self, byte: u8);
    /// MDR read: drain one received byte
    fn read_data(&self) -> u8;
    /// MCS write
    fn command(&self, command: Command);
    /// MCS read
    fn control_status(&self) -> ControlStatus;
    /// MRIS
    fn raw_status(&self) -> MasterStatus;
    /// MMIS
    fn masked_status(&self) -> MasterStatus;
    /// MICR: acknowledge the given bits
    fn clear_status(&self, status: MasterStatus);
    /// MIMR
    fn set_interrupt_mask(&self, mask: MasterStatus);

    /// SRIS
    fn slave_raw_status(&self) -> SlaveInterrupt;
    /// SICR
    fn clear_slave_status(&self, status: SlaveInterrupt);
    /// SIMR
    fn set_slave_interrupt_mask(&self, mask: SlaveInterrupt);
    /// SCSR read
    fn slave_request(&self) -> SlaveRequest;
    /// SDR read
    fn read_slave_data(&self) -> u8;
    /// SDR write
    fn write_slave_data(&self, byte: u8);
    /// SACKCTL
    fn set_slave_ack(&self, ack: AckOverride);
}

impl<T: Registers + ?Sized> Registers for &T {
    fn set_target(&self, address: u8) {
        (**self).set_target(address)
    }
    fn write_data(&self, byte: u8) {
        (**self).write_data(byte)
    }
    fn read_data(&self) -> u8 {
        (**self).read_data()
    }
    fn command(&self, command: Command) {
        (**self).command(command)
    }
    fn control_status(&self) -> ControlStatus {
        (**self).control_status()
    }
    fn raw_status(&self) -> MasterStatus {
        (**self).raw_status()
    }
    fn masked_status(&self) -> MasterStatus {
        (**self).masked_status()
    }
    fn clear_status(&self, status: MasterStatus) {
        (**self).clear_status(status)
    }
    fn set_interrupt_mask(&self, mask: MasterStatus) {
        (**self).set_interrupt_mask(mask)
    }
    fn slave_raw_status(&self) -> SlaveInterrupt {
        (**self).slave_raw_status()
    }
    fn clear_slave_status(&self, status: SlaveInterrupt) {
        (**self).clear_slave_status(status)
    }
    fn set_slave_interrupt_mask(&self, mask: SlaveInterrupt) {
        (**self).set_slave_interrupt_mask(mask)
    }
    fn slave_request(&self) -> SlaveRequest {
        (**self).slave_request()
    }
    fn read_slave_data(&self) -> u8 {
        (**self).read_slave_data()
    }
    fn write_slave_data(&self, byte: u8) {
        (**self).write_slave_data(byte)
    }
    fn set_slave_ack(&self, ack: AckOverride) {
        (**self).set_slave_ack(ack)
    }
}

#[cfg(feature = "defmt")]
mod fmt {
    use super::*;

    impl defmt::Format for MasterStatus {
        fn format(&self, f: defmt::Formatter) {
            defmt::write!(f, "MasterStatus({=u32:#x})", self.bits())
        }
    }

    impl defmt::Format for ControlStatus {
        fn format(&self, f: defmt::Formatter) {
            defmt::write!(f, "ControlStatus({=u32:#x})", self.bits())
        }
    }

    impl defmt::Format for SlaveInterrupt {
        fn format(&self, f: defmt::Formatter) {
            defmt::write!(f, "SlaveInterrupt({=u32:#x})", self.bits())
        }
    }

    impl defmt::Format for SlaveRequest {
        fn format(&self, f: defmt::Formatter) {
            defmt::write!(f, "SlaveRequest({=u32:#x})", self.bits())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_encodings() {
        assert_eq!(Command::QuickCommand.bits(), 0x27);
        assert_eq!(Command::SingleSend.bits(), 0x07);
        assert_eq!(Command::BurstSendStart.bits(), 0x03);
        assert_eq!(Command::BurstSendContinue.bits(), 0x01);
        assert_eq!(Command::BurstSendFinish.bits(), 0x05);
        assert_eq!(Command::BurstReceiveStart.bits(), 0x0b);
        assert_eq!(Command::BurstReceiveContinue.bits(), 0x09);
        assert_eq!(Command::BurstReceiveFinish.bits(), 0x05);
        assert_eq!(Command::BurstReceiveErrorStop.bits(), 0x04);
        assert!(Command::SingleSend.ends_with_stop());
        assert!(!Command::BurstSendStart.ends_with_stop());
    }

    #[test]
    fn ack_override_encodings() {
        assert_eq!(AckOverride::Hardware.bits(), 0);
        assert_eq!(AckOverride::Ack.bits(), 1);
        assert_eq!(AckOverride::Nack.bits(), 3);
    }
}
