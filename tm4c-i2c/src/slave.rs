//! Slave event engine
//!
//! Reacts to what a remote master asks of this controller. One session spans
//! one START..STOP on the bus; nothing carries over to the next one except a
//! response the caller arms again.

use bitflags::bitflags;
use heapless::Vec;

use crate::log::i2c_debug;
use crate::registers::{AckOverride, Registers, SlaveInterrupt, SlaveRequest};

/// Byte sent to a reading master once the response is exhausted
pub const IDLE_BYTE: u8 = 0xff;

bitflags! {
    /// What one slave interrupt carried
    #[repr(transparent)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct SlaveEvents: u32 {
        /// START addressed to us
        const START = 0x01;
        /// STOP, the session ended
        const STOP = 0x02;
        /// Quick command, answered with NACK
        const QUICK_COMMAND = 0x04;
        /// A byte from the master was stored and acknowledged
        const RECEIVED = 0x08;
        /// A byte from the master did not fit and was refused
        const OVERFLOW = 0x10;
        /// A byte was sent to the master
        const TRANSMITTED = 0x20;
        /// Data interrupt without a request
        const UNEXPECTED = 0x1000_0000;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SlaveEvents {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "SlaveEvents({=u32:#x})", self.bits())
    }
}

/// Slave-side session buffers
pub struct SlaveSession<'a, const N: usize> {
    received: Vec<u8, N>,
    read_cursor: usize,
    response: Option<&'a [u8]>,
}

impl<'a, const N: usize> SlaveSession<'a, N> {
    /// An empty session
    pub const fn new() -> Self {
        SlaveSession {
            received: Vec::new(),
            read_cursor: 0,
            response: None,
        }
    }

    /// Bytes a reading master gets in the current session. Without one the
    /// master reads back what it wrote in this session.
    pub fn respond_with(&mut self, bytes: &'a [u8]) {
        self.response = Some(bytes);
        self.read_cursor = 0;
    }

    /// Bytes written by the master in the current session
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// Handles one slave interrupt
    pub fn on_interrupt<R: Registers>(&mut self, regs: &R) -> SlaveEvents {
        let status = regs.slave_raw_status();
        if status.is_empty() {
            return SlaveEvents::empty();
        }
        regs.clear_slave_status(status);

        let mut events = SlaveEvents::empty();
        if status.contains(SlaveInterrupt::START) {
            events |= SlaveEvents::START;
            self.read_cursor = 0;
        }
        if status.contains(SlaveInterrupt::DATA) {
            events |= self.on_request(regs);
        }
        if status.contains(SlaveInterrupt::STOP) {
            events |= SlaveEvents::STOP;
            self.end();
        }
        events
    }

    fn end(&mut self) {
        self.received.clear();
        self.read_cursor = 0;
        self.response = None;
    }

    fn on_request<R: Registers>(&mut self, regs: &R) -> SlaveEvents {
        let request = regs.slave_request();

        if request.contains(SlaveRequest::QCMDST) {
            self.received.clear();
            self.read_cursor = 0;
            regs.set_slave_ack(AckOverride::Nack);
            regs.set_slave_ack(AckOverride::Hardware);
            return SlaveEvents::QUICK_COMMAND;
        }

        if request.contains(SlaveRequest::RREQ) {
            if request.contains(SlaveRequest::FBR) {
                self.received.clear();
                self.read_cursor = 0;
            }
            let byte = regs.read_slave_data();
            if self.received.push(byte).is_err() {
                // stays latched until the next override
                regs.set_slave_ack(AckOverride::Nack);
                return SlaveEvents::OVERFLOW;
            }
            regs.set_slave_ack(AckOverride::Ack);
            regs.set_slave_ack(AckOverride::Hardware);
            return SlaveEvents::RECEIVED;
        }

        if request.contains(SlaveRequest::TREQ) {
            let source = match self.response {
                Some(bytes) => bytes,
                None => &self.received[..],
            };
            let byte = source.get(self.read_cursor).copied().unwrap_or(IDLE_BYTE);
            self.read_cursor = self.read_cursor.saturating_add(1);
            regs.write_slave_data(byte);
            return SlaveEvents::TRANSMITTED;
        }

        i2c_debug!("slave data interrupt without a request: {}", request);
        SlaveEvents::UNEXPECTED
    }
}

impl<'a, const N: usize> Default for SlaveSession<'a, N> {
    fn default() -> Self {
        Self::new()
    }
}
