//! Interrupt-driven master transactions
//!
//! A `begin_*` call issues exactly one hardware command and returns. Each
//! following controller interrupt is handed to [`BusContext::on_interrupt`],
//! which runs the continuation for the current [`State`]. The continuation
//! issues the next command, or reaches a terminal condition and invokes the
//! caller's [`Notify`] exactly once.

use void::Void;

use crate::error::{Error, Outcome};
use crate::log::i2c_warn;
use crate::registers::{Command, MasterStatus, Registers};
use crate::READ;

/// Interrupts the master engine needs unmasked
pub const MASTER_EVENTS: MasterStatus = MasterStatus::DATA
    .union(MasterStatus::CLOCK_TIMEOUT)
    .union(MasterStatus::NACK)
    .union(MasterStatus::STOP)
    .union(MasterStatus::ARB_LOST);

/// Phase of the transaction on a [`BusContext`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Nothing in flight, bus released
    Idle,
    /// START and address issued (with the first data byte for a send)
    AddressPhase,
    /// Quick command issued
    QuickCommand,
    /// Waiting for a data byte to be acknowledged
    DataSend,
    /// The read address was acknowledged; its first byte is latched and the
    /// bus is held for a receive
    RepeatedStartPending,
    /// Waiting for a received byte
    DataReceive,
    /// A partial receive completed; the bus is held with no STOP
    Held,
    /// All bytes moved, waiting for the STOP
    StopPending,
    /// A NACK ended the transaction before the STOP it commanded; that STOP
    /// is absorbed without notifying anyone
    Draining,
}

/// Status completion callback
pub type StatusFn<'a, R> = fn(&mut BusContext<'a, R>, Outcome);

/// Receive completion callback; the count is the number of bytes stored
pub type ReadFn<'a, R> = fn(&mut BusContext<'a, R>, Outcome, usize);

/// Completion callback of a transaction
pub enum Notify<'a, R> {
    /// Sends and address phases
    Status(StatusFn<'a, R>),
    /// Receives
    Read(ReadFn<'a, R>),
}

impl<'a, R> Clone for Notify<'a, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, R> Copy for Notify<'a, R> {}

/// Result of the last terminated transaction
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Completion {
    /// How it ended
    pub outcome: Outcome,
    /// Bytes acknowledged (sends) or stored (receives)
    pub transferred: usize,
}

/// Transaction state of one controller
pub struct BusContext<'a, R> {
    pub(crate) regs: R,
    pub(crate) state: State,
    restart_pending: bool,
    partial: bool,
    stopping: bool,
    target: u8,
    tx: &'a [u8],
    rx: Option<&'a mut [u8]>,
    requested: usize,
    transferred: usize,
    notify: Option<Notify<'a, R>>,
    last: Option<Completion>,
    pub(crate) unexpected: u32,
}

impl<'a, R: Registers> BusContext<'a, R> {
    /// Takes the controller and unmasks the master interrupts
    pub fn new(regs: R) -> Self {
        regs.clear_status(MasterStatus::all());
        regs.set_interrupt_mask(MASTER_EVENTS);
        BusContext {
            regs,
            state: State::Idle,
            restart_pending: false,
            partial: false,
            stopping: false,
            target: 0,
            tx: &[],
            rx: None,
            requested: 0,
            transferred: 0,
            notify: None,
            last: None,
            unexpected: 0,
        }
    }

    /// The underlying controller
    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// Masks the master interrupts and releases the controller
    pub fn free(self) -> R {
        self.regs.set_interrupt_mask(MasterStatus::empty());
        self.regs
    }

    /// Current phase
    pub fn state(&self) -> State {
        self.state
    }

    /// A read address left the bus held for a receive
    pub fn restart_pending(&self) -> bool {
        self.restart_pending
    }

    /// Target of the current (or last) transaction, direction in bit 0
    pub fn target(&self) -> u8 {
        self.target
    }

    /// Bytes requested by the current (or last) transaction
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Bytes moved so far by the current (or last) transaction
    pub fn transferred(&self) -> usize {
        self.transferred
    }

    /// Interrupts that arrived with nothing armed to handle them
    pub fn unexpected_events(&self) -> u32 {
        self.unexpected
    }

    /// `true` while a continuation waits for the next interrupt
    pub fn is_armed(&self) -> bool {
        !matches!(
            self.state,
            State::Idle | State::RepeatedStartPending | State::Held
        )
    }

    /// `WouldBlock` while a transaction is in flight, otherwise the
    /// completion of the last one
    pub fn poll(&self) -> nb::Result<Completion, Void> {
        if self.is_armed() {
            return Err(nb::Error::WouldBlock);
        }
        self.last.ok_or(nb::Error::WouldBlock)
    }

    /// Gives back the receive buffer of the last receive
    pub fn take_buffer(&mut self) -> Option<&'a mut [u8]> {
        if self.is_armed() {
            return None;
        }
        self.rx.take()
    }

    /// Starts a send to `address` (7-bit address in bits 7:1, bit 0 set for
    /// read).
    ///
    /// * write, no bytes: quick command, done on STOP.
    /// * read, no bytes: address phase only, done with the bus held in
    ///   [`State::RepeatedStartPending`].
    /// * bytes: sent one per interrupt. A write ends with STOP; a read issues
    ///   a repeated START to the read address and ends held.
    pub fn begin_send(
        &mut self,
        address: u8,
        bytes: &'a [u8],
        on_done: StatusFn<'a, R>,
    ) -> Result<(), Error> {
        if self.state != State::Idle {
            return Err(Error::Busy);
        }
        let read = address & READ != 0;
        self.target = address;
        self.tx = bytes;
        self.requested = bytes.len();
        self.transferred = 0;
        self.restart_pending = false;
        self.notify = Some(Notify::Status(on_done));

        match bytes.first() {
            None if !read => {
                self.state = State::QuickCommand;
                self.regs.set_target(address);
                self.issue(Command::QuickCommand);
            }
            None => self.restart(),
            Some(&first) => {
                self.state = State::AddressPhase;
                self.regs.set_target(address & !READ);
                // the controller wants the first data byte before the START
                self.regs.write_data(first);
                self.issue(if bytes.len() == 1 && !read {
                    Command::SingleSend
                } else {
                    Command::BurstSendStart
                });
            }
        }
        Ok(())
    }

    /// Receives `buffer.len()` bytes on the held bus, then STOP.
    ///
    /// Completes with `(Acknowledged, n)` after the STOP, or
    /// `(ShortRead(n), n)` if the bus stopped early.
    pub fn begin_receive(
        &mut self,
        buffer: &'a mut [u8],
        on_done: ReadFn<'a, R>,
    ) -> Result<(), Error> {
        self.begin_read(buffer, on_done, false)
    }

    /// Receives `buffer.len()` bytes and keeps the bus ([`State::Held`]).
    /// From [`State::Held`] an empty buffer issues the final STOP.
    ///
    /// Straight after the address phase the first byte is already latched,
    /// so a one-byte buffer completes without any bus activity: `on_done`
    /// runs before this returns, not from the interrupt handler.
    /// Requesting another byte here would clock one that no buffer holds.
    pub fn begin_receive_partial(
        &mut self,
        buffer: &'a mut [u8],
        on_done: ReadFn<'a, R>,
    ) -> Result<(), Error> {
        self.begin_read(buffer, on_done, true)
    }

    fn begin_read(
        &mut self,
        buffer: &'a mut [u8],
        on_done: ReadFn<'a, R>,
        partial: bool,
    ) -> Result<(), Error> {
        let latched = match self.state {
            State::RepeatedStartPending => true,
            State::Held => false,
            State::Idle => return Err(Error::NotHeld),
            _ => return Err(Error::Busy),
        };

        if latched && buffer.is_empty() {
            i2c_warn!("first receive after a read address must not be empty");
            self.issue(Command::BurstReceiveErrorStop);
            self.state = State::Idle;
            self.restart_pending = false;
            return Err(Error::EmptyFirstReceive);
        }

        self.restart_pending = false;
        self.partial = partial;
        self.requested = buffer.len();
        self.transferred = 0;
        self.rx = Some(buffer);
        self.notify = Some(Notify::Read(on_done));

        if self.requested == 0 {
            self.issue(Command::BurstReceiveFinish);
            self.state = State::StopPending;
        } else if latched {
            self.state = State::DataReceive;
            self.receive_next(MasterStatus::DATA);
        } else {
            self.state = State::DataReceive;
            self.issue(Command::BurstReceiveContinue);
        }
        Ok(())
    }

    fn issue(&mut self, command: Command) {
        self.stopping = command.ends_with_stop();
        self.regs.command(command);
    }

    /// Where a NACK leaves the context: the STOP of the failed command may
    /// still be on its way
    pub(crate) fn after_nack(&self, status: MasterStatus) -> State {
        if self.stopping && !status.contains(MasterStatus::STOP) {
            State::Draining
        } else {
            State::Idle
        }
    }

    /// (Repeated) START to the read address
    fn restart(&mut self) {
        self.restart_pending = true;
        self.state = State::AddressPhase;
        self.regs.set_target(self.target | READ);
        self.issue(Command::BurstReceiveStart);
    }

    /// Runs the continuation armed for the current state
    pub(crate) fn resume(&mut self, status: MasterStatus) {
        match self.state {
            State::QuickCommand | State::StopPending if status.contains(MasterStatus::STOP) => {
                self.finish(Outcome::Acknowledged, State::Idle)
            }
            State::QuickCommand if status.contains(MasterStatus::DATA) => {
                self.state = State::StopPending
            }
            State::AddressPhase if self.restart_pending => {
                if status.contains(MasterStatus::DATA) {
                    self.finish(Outcome::Acknowledged, State::RepeatedStartPending)
                }
            }
            State::AddressPhase | State::DataSend => {
                if status.contains(MasterStatus::DATA) {
                    self.send_next(status)
                }
            }
            State::DataReceive => self.receive_next(status),
            _ => {}
        }
    }

    fn send_next(&mut self, status: MasterStatus) {
        self.transferred += 1;
        self.state = State::DataSend;
        let read = self.target & READ != 0;

        if let Some(&byte) = self.tx.get(self.transferred) {
            let last = self.transferred + 1 == self.tx.len();
            self.regs.write_data(byte);
            self.issue(if last && !read {
                Command::BurstSendFinish
            } else {
                Command::BurstSendContinue
            });
        } else if read {
            self.restart();
        } else if status.contains(MasterStatus::STOP) {
            self.finish(Outcome::Acknowledged, State::Idle);
        } else {
            self.state = State::StopPending;
        }
    }

    fn receive_next(&mut self, status: MasterStatus) {
        if !status.contains(MasterStatus::DATA) {
            if status.contains(MasterStatus::STOP) {
                self.finish(Outcome::ShortRead(self.transferred), State::Idle);
            }
            return;
        }

        let byte = self.regs.read_data();
        let index = self.transferred;
        if let Some(slot) = self.rx.as_deref_mut().and_then(|b| b.get_mut(index)) {
            *slot = byte;
        }
        self.transferred += 1;

        if self.transferred < self.requested {
            self.issue(Command::BurstReceiveContinue);
        } else if self.partial {
            self.finish(Outcome::Acknowledged, State::Held);
        } else {
            // one more byte with NACK, then STOP
            self.issue(Command::BurstReceiveFinish);
            self.state = State::StopPending;
        }
    }

    /// Terminal condition: disarm, record and notify
    pub(crate) fn finish(&mut self, outcome: Outcome, state: State) {
        self.state = state;
        if state != State::RepeatedStartPending {
            self.restart_pending = false;
        }
        self.tx = &[];
        let completion = Completion {
            outcome,
            transferred: self.transferred,
        };
        self.last = Some(completion);

        match self.notify.take() {
            Some(Notify::Status(f)) => f(self, outcome),
            Some(Notify::Read(f)) => f(self, outcome, completion.transferred),
            None => {}
        }
    }
}
