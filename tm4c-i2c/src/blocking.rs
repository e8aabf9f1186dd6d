//! Polled transactions
//!
//! Every command is followed by a spin on the raw interrupt status. The
//! spins end on the expected condition or on an error condition; a bus whose
//! clock is held low ends them through the controller's clock-low timeout.

use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};

use crate::error::Error;
use crate::log::{i2c_debug, i2c_warn};
use crate::registers::{Command, ControlStatus, MasterStatus, Registers};
use crate::{read_address, write_address, READ};

/// What the bus is waiting for between calls
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Hold {
    /// No transaction open
    Released,
    /// A read address was acknowledged; its first byte is latched in MDR
    RestartPending,
    /// A partial receive returned without STOP
    Receiving,
}

/// Polled I2C master
pub struct Blocking<R> {
    regs: R,
    hold: Hold,
    sent: usize,
}

impl<R: Registers> Blocking<R> {
    /// Wraps a controller that has its master function enabled and masks
    /// its master interrupts
    pub fn new(regs: R) -> Self {
        regs.set_interrupt_mask(MasterStatus::empty());
        Blocking {
            regs,
            hold: Hold::Released,
            sent: 0,
        }
    }

    /// The underlying controller
    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// Releases the controller
    pub fn free(self) -> R {
        self.regs
    }

    /// `true` while a read address holds the bus for a following receive
    pub fn is_held(&self) -> bool {
        self.hold != Hold::Released
    }

    /// Sends `bytes` to `address` (7-bit address in bits 7:1, bit 0 set for
    /// read).
    ///
    /// * write, no bytes: quick command.
    /// * write: START, address, bytes, STOP.
    /// * read: START, write address, bytes (if any), repeated START, read
    ///   address. The bus stays held for [`receive`](Self::receive) or
    ///   [`receive_partial`](Self::receive_partial), which emit the STOP.
    pub fn send(&mut self, address: u8, bytes: &[u8]) -> Result<(), Error> {
        self.hold = Hold::Released;
        let read = address & READ != 0;

        if bytes.is_empty() && !read {
            return self.quick(address);
        }
        if !bytes.is_empty() {
            self.write_bytes(address & !READ, bytes, true, !read)?;
        }
        if read {
            self.start_read(address)?;
        }
        Ok(())
    }

    /// Receives exactly `buffer.len()` bytes on a held bus and ends the
    /// transaction with STOP.
    pub fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        let latched = match self.hold {
            Hold::Released => return Err(Error::NotHeld),
            Hold::RestartPending => true,
            Hold::Receiving => false,
        };
        self.hold = Hold::Released;

        if latched && buffer.is_empty() {
            return Err(self.reject_empty_receive());
        }
        self.fill(buffer, latched)?;
        self.end_read(true)
    }

    /// Receives `buffer.len()` bytes and keeps the bus. An empty buffer ends
    /// the transaction with STOP; it is rejected as the first receive after
    /// the address.
    pub fn receive_partial(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        match self.hold {
            Hold::Released => Err(Error::NotHeld),
            Hold::RestartPending if buffer.is_empty() => {
                self.hold = Hold::Released;
                Err(self.reject_empty_receive())
            }
            Hold::Receiving if buffer.is_empty() => {
                self.hold = Hold::Released;
                self.end_read(true)
            }
            hold => {
                self.hold = Hold::Released;
                self.fill(buffer, hold == Hold::RestartPending)?;
                self.hold = Hold::Receiving;
                Ok(())
            }
        }
    }

    fn reject_empty_receive(&mut self) -> Error {
        i2c_warn!("first receive after a read address must not be empty");
        self.regs.command(Command::BurstReceiveErrorStop);
        Error::EmptyFirstReceive
    }

    fn quick(&mut self, address: u8) -> Result<(), Error> {
        self.sent = 0;
        self.regs.clear_status(MasterStatus::all());
        self.regs.set_target(address);
        self.regs.command(Command::QuickCommand);
        let seen = self.wait(MasterStatus::DATA)?;
        self.check(seen)?;
        self.wait_stop(seen)
    }

    /// Sends `bytes` starting with START (or continuing an open write) and
    /// ending with STOP when `stop` is set.
    fn write_bytes(
        &mut self,
        address: u8,
        bytes: &[u8],
        start: bool,
        stop: bool,
    ) -> Result<(), Error> {
        let mut seen = MasterStatus::empty();
        for (i, &byte) in bytes.iter().enumerate() {
            let last = stop && i + 1 == bytes.len();
            seen = if start && i == 0 {
                self.start_write(address, byte, last)?
            } else {
                self.write_next(byte, last)?
            };
        }
        if stop {
            self.wait_stop(seen)?;
        }
        Ok(())
    }

    fn start_write(&mut self, address: u8, byte: u8, stop: bool) -> Result<MasterStatus, Error> {
        self.sent = 0;
        self.regs.clear_status(MasterStatus::all());
        self.regs.set_target(address);
        // the controller wants the first data byte before the START
        self.regs.write_data(byte);
        self.regs.command(if stop {
            Command::SingleSend
        } else {
            Command::BurstSendStart
        });
        self.acked()
    }

    fn write_next(&mut self, byte: u8, stop: bool) -> Result<MasterStatus, Error> {
        self.regs.write_data(byte);
        self.regs.command(if stop {
            Command::BurstSendFinish
        } else {
            Command::BurstSendContinue
        });
        self.acked()
    }

    fn acked(&mut self) -> Result<MasterStatus, Error> {
        let seen = self.wait(MasterStatus::DATA)?;
        self.check(seen)?;
        self.sent += 1;
        Ok(seen)
    }

    /// (Repeated) START to a read address; the first byte is latched
    fn start_read(&mut self, address: u8) -> Result<(), Error> {
        self.regs.clear_status(MasterStatus::all());
        self.regs.set_target(address | READ);
        self.regs.command(Command::BurstReceiveStart);
        let seen = self.wait(MasterStatus::DATA)?;
        self.check(seen)?;
        self.hold = Hold::RestartPending;
        Ok(())
    }

    fn read_next(&mut self, received: usize) -> Result<u8, Error> {
        self.regs.command(Command::BurstReceiveContinue);
        let seen = self.wait(MasterStatus::DATA | MasterStatus::STOP)?;
        self.check(seen)?;
        if !seen.contains(MasterStatus::DATA) {
            i2c_debug!("bus stopped during receive");
            return Err(Error::ShortRead { received });
        }
        Ok(self.regs.read_data())
    }

    fn fill(&mut self, buffer: &mut [u8], latched: bool) -> Result<(), Error> {
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = if latched && i == 0 {
                self.regs.read_data()
            } else {
                self.read_next(i)?
            };
        }
        Ok(())
    }

    /// Clocks one discarded byte with NACK, then STOP or nothing
    fn end_read(&mut self, stop: bool) -> Result<(), Error> {
        self.regs.command(if stop {
            Command::BurstReceiveFinish
        } else {
            Command::BurstReceiveNack
        });
        let seen = self.wait(MasterStatus::DATA | MasterStatus::STOP)?;
        self.check(seen)?;
        if stop {
            self.wait_stop(seen)?;
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), Error> {
        loop {
            let mcs = self.regs.control_status();
            if mcs.contains(ControlStatus::CLKTO) {
                return Err(Error::ClockTimeout);
            }
            if !mcs.contains(ControlStatus::BUSY) {
                return Ok(());
            }
        }
    }

    /// Spins until any of `until` or an error condition is raised, then
    /// acknowledges everything that was seen.
    fn wait(&self, until: MasterStatus) -> Result<MasterStatus, Error> {
        self.wait_idle()?;
        let stop_on = until | MasterStatus::NACK | MasterStatus::ARB_LOST | MasterStatus::CLOCK_TIMEOUT;
        loop {
            let raw = self.regs.raw_status();
            if raw.intersects(stop_on) {
                self.regs.clear_status(raw);
                return Ok(raw);
            }
        }
    }

    fn wait_stop(&self, seen: MasterStatus) -> Result<(), Error> {
        if seen.contains(MasterStatus::STOP) {
            return Ok(());
        }
        let seen = self.wait(MasterStatus::STOP)?;
        self.check(seen)
    }

    /// NACK first, then arbitration, then the clock
    fn check(&self, seen: MasterStatus) -> Result<(), Error> {
        if seen.contains(MasterStatus::NACK) {
            let mcs = self.regs.control_status();
            return Err(if mcs.contains(ControlStatus::ADRACK) {
                Error::AddressNack
            } else {
                Error::DataNack { sent: self.sent }
            });
        }
        if seen.contains(MasterStatus::ARB_LOST)
            || self.regs.control_status().contains(ControlStatus::ARBLST)
        {
            i2c_debug!("arbitration lost");
            return Err(Error::ArbitrationLost);
        }
        if seen.contains(MasterStatus::CLOCK_TIMEOUT) {
            return Err(Error::ClockTimeout);
        }
        Ok(())
    }

    fn run(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Error> {
        // Empty operations carry no bytes and do not split a phase
        let mut ops = operations
            .iter_mut()
            .filter(|op| match op {
                Operation::Read(buffer) => !buffer.is_empty(),
                Operation::Write(bytes) => !bytes.is_empty(),
            })
            .peekable();

        if ops.peek().is_none() {
            return self.quick(write_address(address));
        }

        // First operation always needs a start
        let mut send_start = true;
        while let Some(op) = ops.next() {
            let (op_change, last) = match ops.peek() {
                Some(next) => (
                    !matches!(
                        (&op, next),
                        (Operation::Read(_), Operation::Read(_))
                            | (Operation::Write(_), Operation::Write(_))
                    ),
                    false,
                ),
                None => (true, true),
            };

            match op {
                Operation::Write(bytes) => {
                    self.write_bytes(write_address(address), bytes, send_start, last)?;
                }
                Operation::Read(buffer) => {
                    if send_start {
                        self.start_read(read_address(address))?;
                    }
                    self.fill(buffer, send_start)?;
                    if op_change {
                        self.hold = Hold::Released;
                        self.end_read(last)?;
                    }
                }
            }

            send_start = op_change;
        }
        Ok(())
    }
}

impl<R: Registers> ErrorType for Blocking<R> {
    type Error = Error;
}

impl<R: Registers> I2c<SevenBitAddress> for Blocking<R> {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.hold = Hold::Released;
        let result = self.run(address, operations);
        self.hold = Hold::Released;
        result
    }
}

impl<R: Registers> eh0::blocking::i2c::Write for Blocking<R> {
    type Error = Error;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Error> {
        self.send(write_address(address), bytes)
    }
}

impl<R: Registers> eh0::blocking::i2c::Read for Blocking<R> {
    type Error = Error;

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Error> {
        self.send(read_address(address), &[])?;
        self.receive(buffer)
    }
}

impl<R: Registers> eh0::blocking::i2c::WriteRead for Blocking<R> {
    type Error = Error;

    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Error> {
        self.send(read_address(address), bytes)?;
        self.receive(buffer)
    }
}
