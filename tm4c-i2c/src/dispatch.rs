//! Interrupt entry point
//!
//! [`BusContext::on_interrupt`] is the whole master interrupt handler: it
//! acknowledges the masked status, classifies it and resumes at most one
//! continuation. [`BusContext::service`] also runs the slave engine, for
//! controllers that share one interrupt line between both functions.

use core::cell::RefCell;

use bitflags::bitflags;
use critical_section::Mutex;

use crate::error::Outcome;
use crate::log::{i2c_debug, i2c_warn};
use crate::master::{BusContext, State};
use crate::registers::{ControlStatus, MasterStatus, Registers};
use crate::slave::{SlaveEvents, SlaveSession};

bitflags! {
    /// What one master interrupt carried
    #[repr(transparent)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct EventFlags: u32 {
        /// Byte cycle finished
        const DATA = MasterStatus::DATA.bits();
        /// Clock-low timeout
        const CLOCK_TIMEOUT = MasterStatus::CLOCK_TIMEOUT.bits();
        /// Not acknowledged
        const NACK = MasterStatus::NACK.bits();
        /// START seen
        const START = MasterStatus::START.bits();
        /// STOP seen
        const STOP = MasterStatus::STOP.bits();
        /// Arbitration lost, from the interrupt status or from MCS
        const ARB_LOST = MasterStatus::ARB_LOST.bits();
        /// Nothing was armed to handle the interrupt
        const UNEXPECTED = 0x1000_0000;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for EventFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "EventFlags({=u32:#x})", self.bits())
    }
}

impl<'a, R: Registers> BusContext<'a, R> {
    /// Handles one master interrupt.
    ///
    /// NACK is checked first, then arbitration loss (raw bit or the MCS
    /// flag), then the clock-low timeout; each ends an armed transaction.
    /// Arbitration loss is reported even when a NACK ends the transaction.
    /// Anything else resumes the armed continuation. An interrupt whose
    /// status was already acknowledged does nothing, and neither does the
    /// STOP trailing a NACK.
    pub fn on_interrupt(&mut self) -> EventFlags {
        let status = self.regs.masked_status();
        if status.is_empty() {
            return EventFlags::empty();
        }
        self.regs.clear_status(status);

        let mut events = EventFlags::from_bits_truncate(status.bits());

        if self.state == State::Draining && status.contains(MasterStatus::STOP) {
            self.state = State::Idle;
            if status == MasterStatus::STOP {
                return events;
            }
        }

        let armed = self.is_armed();
        let arb_lost = status.contains(MasterStatus::ARB_LOST)
            || self.regs.control_status().contains(ControlStatus::ARBLST);
        if arb_lost {
            events |= EventFlags::ARB_LOST;
        }

        if status.contains(MasterStatus::NACK) {
            if armed {
                let next = self.after_nack(status);
                self.finish(Outcome::NotAcknowledged, next);
            } else {
                self.flag_unexpected(&mut events, status);
            }
            return events;
        }

        if arb_lost {
            i2c_warn!("arbitration lost after {=usize} bytes", self.transferred());
            if armed {
                self.finish(Outcome::ArbitrationLost, State::Idle);
            }
            return events;
        }

        if status.contains(MasterStatus::CLOCK_TIMEOUT) {
            i2c_warn!("clock-low timeout");
            if armed {
                self.finish(Outcome::ClockTimeout, State::Idle);
            }
            return events;
        }

        if armed {
            self.resume(status);
        } else {
            self.flag_unexpected(&mut events, status);
        }
        events
    }

    /// Handles one interrupt for both the master and the slave function
    pub fn service<const N: usize>(
        &mut self,
        session: &mut SlaveSession<'_, N>,
    ) -> (EventFlags, SlaveEvents) {
        let master = self.on_interrupt();
        let slave = session.on_interrupt(&self.regs);
        (master, slave)
    }

    fn flag_unexpected(&mut self, events: &mut EventFlags, status: MasterStatus) {
        self.unexpected = self.unexpected.wrapping_add(1);
        *events |= EventFlags::UNEXPECTED;
        i2c_debug!("unexpected master interrupt {}", status);
    }
}

/// Value shared between foreground code and an interrupt handler.
///
/// Every access runs inside a critical section, so a `begin_*` call can never
/// be interrupted by the handler of the context it is arming.
pub struct Shared<T> {
    inner: Mutex<RefCell<Option<T>>>,
}

impl<T> Shared<T> {
    /// An empty slot, usable in a `static`
    pub const fn new() -> Self {
        Shared {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Stores `value`, returning the previous one
    pub fn install(&self, value: T) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow(cs).replace(Some(value)))
    }

    /// Removes the value
    pub fn take(&self) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow(cs).take())
    }

    /// Runs `f` on the value, if one is installed
    pub fn with<U>(&self, f: impl FnOnce(&mut T) -> U) -> Option<U> {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().as_mut().map(f))
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::new()
    }
}
