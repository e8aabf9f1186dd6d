//! Simulated controller and bus used by the unit tests.
//!
//! Every command completes instantly: the raw status bits the hardware would
//! raise at the end of the byte cycle are latched before `command` returns,
//! so blocking waits succeed on their first poll and interrupt-driven tests
//! call the dispatcher while [`Sim::pending`] reports masked status.

use core::cell::RefCell;
use std::vec::Vec;

use crate::registers::{
    AckOverride, Command, ControlStatus, MasterStatus, Registers, SlaveInterrupt, SlaveRequest,
};

/// A device answering on the simulated bus
#[derive(Debug, Default, Clone)]
pub struct Device {
    pub address: u8,
    /// NACK the data byte with this index of every write
    pub nack_at: Option<usize>,
    /// Bytes offered to a reading master; `None` echoes the last write
    pub response: Option<Vec<u8>>,
    /// Bytes written by the master in its most recent write
    pub written: Vec<u8>,
    read_pos: usize,
}

impl Device {
    pub fn new(address: u8) -> Self {
        Device {
            address,
            ..Device::default()
        }
    }

    pub fn nack_at(mut self, index: usize) -> Self {
        self.nack_at = Some(index);
        self
    }

    pub fn responding(mut self, bytes: &[u8]) -> Self {
        self.response = Some(bytes.to_vec());
        self
    }

    fn next_byte(&mut self) -> u8 {
        let source = self.response.as_ref().unwrap_or(&self.written);
        let byte = source.get(self.read_pos).copied().unwrap_or(0xff);
        self.read_pos += 1;
        byte
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    Sending,
    Receiving,
}

#[derive(Debug)]
struct State {
    target: u8,
    staged: u8,
    received: u8,
    raw: MasterStatus,
    mask: MasterStatus,
    control: ControlStatus,
    busy_polls: u32,
    busy_reload: u32,
    phase: Phase,
    device: Option<usize>,
    sent: usize,
    received_count: usize,
    devices: Vec<Device>,
    commands: Vec<Command>,
    stops: usize,
    arb_lost_at: Option<usize>,
    stop_at_read: Option<usize>,
    clock_stuck: bool,
    late_stop: bool,
    stop_due: bool,

    slave_raw: SlaveInterrupt,
    slave_mask: SlaveInterrupt,
    slave_request: SlaveRequest,
    slave_in: u8,
    slave_out: Vec<u8>,
    slave_acks: Vec<AckOverride>,
}

/// Simulated controller
#[derive(Debug)]
pub struct Sim {
    state: RefCell<State>,
}

impl Sim {
    pub fn new() -> Self {
        Sim {
            state: RefCell::new(State {
                target: 0,
                staged: 0,
                received: 0,
                raw: MasterStatus::empty(),
                mask: MasterStatus::all(),
                control: ControlStatus::IDLE,
                busy_polls: 0,
                busy_reload: 0,
                phase: Phase::Idle,
                device: None,
                sent: 0,
                received_count: 0,
                devices: Vec::new(),
                commands: Vec::new(),
                stops: 0,
                arb_lost_at: None,
                stop_at_read: None,
                clock_stuck: false,
                late_stop: false,
                stop_due: false,
                slave_raw: SlaveInterrupt::empty(),
                slave_mask: SlaveInterrupt::all(),
                slave_request: SlaveRequest::empty(),
                slave_in: 0,
                slave_out: Vec::new(),
                slave_acks: Vec::new(),
            }),
        }
    }

    pub fn with_device(self, device: Device) -> Self {
        self.state.borrow_mut().devices.push(device);
        self
    }

    /// Keep BUSY set for this many control-status reads after each command
    pub fn busy_for(self, polls: u32) -> Self {
        self.state.borrow_mut().busy_reload = polls;
        self
    }

    /// Deliver the STOP following a NACK in its own interrupt, once the NACK
    /// has been acknowledged
    pub fn late_stop(self) -> Self {
        self.state.borrow_mut().late_stop = true;
        self
    }

    /// Lose arbitration while clocking the data byte with this index
    pub fn lose_arbitration_at(&self, index: usize) {
        self.state.borrow_mut().arb_lost_at = Some(index);
    }

    /// Let the bus STOP instead of delivering the received byte with this index
    pub fn stop_at_read(&self, index: usize) {
        self.state.borrow_mut().stop_at_read = Some(index);
    }

    /// Hold SCL low on the next command
    pub fn stick_clock(&self) {
        self.state.borrow_mut().clock_stuck = true;
    }

    pub fn commands(&self) -> Vec<Command> {
        self.state.borrow().commands.clone()
    }

    pub fn stops(&self) -> usize {
        self.state.borrow().stops
    }

    pub fn written_to(&self, address: u8) -> Vec<u8> {
        let state = self.state.borrow();
        state
            .devices
            .iter()
            .find(|d| d.address == address)
            .map(|d| d.written.clone())
            .unwrap_or_default()
    }

    /// Interrupt line level: any unmasked raw status
    pub fn pending(&self) -> bool {
        let state = self.state.borrow();
        !(state.raw & state.mask).is_empty()
    }

    /// Raise raw status bits as if the hardware had just latched them
    pub fn raise(&self, status: MasterStatus) {
        self.state.borrow_mut().raw |= status;
    }

    /// Set the control-status register directly
    pub fn set_control(&self, control: ControlStatus) {
        self.state.borrow_mut().control = control;
    }

    pub fn slave_start(&self) {
        let mut state = self.state.borrow_mut();
        state.slave_raw |= SlaveInterrupt::START;
        state.slave_request = SlaveRequest::empty();
    }

    pub fn slave_stop(&self) {
        let mut state = self.state.borrow_mut();
        state.slave_raw |= SlaveInterrupt::STOP;
        state.slave_request = SlaveRequest::empty();
    }

    /// The remote master wrote `byte` to us
    pub fn slave_write(&self, byte: u8, first: bool) {
        let mut state = self.state.borrow_mut();
        state.slave_raw |= SlaveInterrupt::DATA;
        state.slave_request = if first {
            SlaveRequest::RREQ | SlaveRequest::FBR
        } else {
            SlaveRequest::RREQ
        };
        state.slave_in = byte;
    }

    /// The remote master wants a byte from us
    pub fn slave_read(&self) {
        let mut state = self.state.borrow_mut();
        state.slave_raw |= SlaveInterrupt::DATA;
        state.slave_request = SlaveRequest::TREQ;
    }

    pub fn slave_quick(&self, read: bool) {
        let mut state = self.state.borrow_mut();
        state.slave_raw |= SlaveInterrupt::DATA;
        state.slave_request = if read {
            SlaveRequest::QCMDST | SlaveRequest::QCMDRW
        } else {
            SlaveRequest::QCMDST
        };
    }

    pub fn slave_sent(&self) -> Vec<u8> {
        self.state.borrow().slave_out.clone()
    }

    pub fn slave_acks(&self) -> Vec<AckOverride> {
        self.state.borrow().slave_acks.clone()
    }
}

impl State {
    fn find(&self, address: u8) -> Option<usize> {
        self.devices.iter().position(|d| d.address == address >> 1)
    }

    fn stop(&mut self, status: MasterStatus) {
        self.raw |= status | MasterStatus::STOP;
        self.control.remove(ControlStatus::BUSBSY);
        self.control.insert(ControlStatus::IDLE);
        self.phase = Phase::Idle;
        self.device = None;
        self.stops += 1;
    }

    fn nack(&mut self, source: ControlStatus) {
        self.control.insert(ControlStatus::ERROR | source);
        self.stop(MasterStatus::DATA | MasterStatus::NACK);
        if self.late_stop {
            self.raw.remove(MasterStatus::STOP);
            self.stop_due = true;
        }
    }

    fn start(&mut self) -> Option<usize> {
        self.control = ControlStatus::BUSBSY;
        match self.find(self.target) {
            Some(index) => {
                self.device = Some(index);
                Some(index)
            }
            None => {
                self.nack(ControlStatus::ADRACK);
                None
            }
        }
    }

    /// Clock the staged byte to the selected device; `false` ends the transfer
    fn clock_out(&mut self) -> bool {
        if self.arb_lost_at == Some(self.sent) {
            self.arb_lost_at = None;
            self.control = ControlStatus::ARBLST | ControlStatus::ERROR | ControlStatus::BUSBSY;
            self.raw |= MasterStatus::DATA | MasterStatus::ARB_LOST;
            self.phase = Phase::Idle;
            self.device = None;
            return false;
        }
        let index = match self.device {
            Some(index) => index,
            None => return false,
        };
        let device = &mut self.devices[index];
        if device.nack_at == Some(self.sent) {
            self.nack(ControlStatus::DATACK);
            return false;
        }
        device.written.push(self.staged);
        self.sent += 1;
        true
    }

    fn clock_in(&mut self) -> bool {
        if self.stop_at_read == Some(self.received_count) {
            self.stop_at_read = None;
            self.stop(MasterStatus::empty());
            return false;
        }
        let index = match self.device {
            Some(index) => index,
            None => return false,
        };
        self.received = self.devices[index].next_byte();
        self.received_count += 1;
        true
    }

    fn execute(&mut self, command: Command) {
        self.commands.push(command);
        if self.clock_stuck {
            self.clock_stuck = false;
            self.control.insert(ControlStatus::CLKTO);
            self.raw |= MasterStatus::CLOCK_TIMEOUT;
            return;
        }
        match command {
            Command::QuickCommand => {
                if self.start().is_some() {
                    self.stop(MasterStatus::DATA);
                }
            }
            Command::SingleSend | Command::BurstSendStart => {
                if let Some(index) = self.start() {
                    self.devices[index].written.clear();
                    self.sent = 0;
                    self.phase = Phase::Sending;
                    if self.clock_out() {
                        if command == Command::SingleSend {
                            self.stop(MasterStatus::DATA);
                        } else {
                            self.raw |= MasterStatus::DATA;
                        }
                    }
                }
            }
            Command::BurstSendContinue | Command::BurstSendFinish
                if self.phase == Phase::Sending =>
            {
                if self.clock_out() {
                    if command == Command::BurstSendFinish {
                        self.stop(MasterStatus::DATA);
                    } else {
                        self.raw |= MasterStatus::DATA;
                    }
                }
            }
            Command::BurstReceiveStart => {
                if let Some(index) = self.start() {
                    self.devices[index].read_pos = 0;
                    self.received_count = 0;
                    self.phase = Phase::Receiving;
                    if self.clock_in() {
                        self.raw |= MasterStatus::DATA;
                    }
                }
            }
            Command::BurstReceiveContinue
            | Command::BurstReceiveNack
            | Command::BurstReceiveFinish
                if self.phase == Phase::Receiving =>
            {
                if self.clock_in() {
                    if command == Command::BurstReceiveFinish {
                        self.stop(MasterStatus::DATA);
                    } else {
                        self.raw |= MasterStatus::DATA;
                    }
                }
            }
            Command::BurstSendErrorStop | Command::BurstReceiveErrorStop => {
                if self.phase != Phase::Idle {
                    self.stop(MasterStatus::empty());
                }
            }
            _ => {}
        }
    }
}

impl Registers for Sim {
    fn set_target(&self, address: u8) {
        self.state.borrow_mut().target = address;
    }

    fn write_data(&self, byte: u8) {
        self.state.borrow_mut().staged = byte;
    }

    fn read_data(&self) -> u8 {
        self.state.borrow().received
    }

    fn command(&self, command: Command) {
        let mut state = self.state.borrow_mut();
        state.execute(command);
        if state.busy_reload > 0 {
            state.busy_polls = state.busy_reload;
            state.control.insert(ControlStatus::BUSY);
        }
    }

    fn control_status(&self) -> ControlStatus {
        let mut state = self.state.borrow_mut();
        let control = state.control;
        if control.contains(ControlStatus::BUSY) {
            state.busy_polls = state.busy_polls.saturating_sub(1);
            if state.busy_polls == 0 {
                state.control.remove(ControlStatus::BUSY);
            }
        }
        control
    }

    fn raw_status(&self) -> MasterStatus {
        self.state.borrow().raw
    }

    fn masked_status(&self) -> MasterStatus {
        let state = self.state.borrow();
        state.raw & state.mask
    }

    fn clear_status(&self, status: MasterStatus) {
        let mut state = self.state.borrow_mut();
        state.raw.remove(status);
        if state.stop_due && state.raw.is_empty() {
            state.stop_due = false;
            state.raw |= MasterStatus::STOP;
        }
    }

    fn set_interrupt_mask(&self, mask: MasterStatus) {
        self.state.borrow_mut().mask = mask;
    }

    fn slave_raw_status(&self) -> SlaveInterrupt {
        self.state.borrow().slave_raw
    }

    fn clear_slave_status(&self, status: SlaveInterrupt) {
        self.state.borrow_mut().slave_raw.remove(status);
    }

    fn set_slave_interrupt_mask(&self, mask: SlaveInterrupt) {
        self.state.borrow_mut().slave_mask = mask;
    }

    fn slave_request(&self) -> SlaveRequest {
        self.state.borrow().slave_request
    }

    fn read_slave_data(&self) -> u8 {
        let mut state = self.state.borrow_mut();
        state.slave_request.remove(SlaveRequest::RREQ | SlaveRequest::FBR);
        state.slave_in
    }

    fn write_slave_data(&self, byte: u8) {
        let mut state = self.state.borrow_mut();
        state.slave_request.remove(SlaveRequest::TREQ);
        state.slave_out.push(byte);
    }

    fn set_slave_ack(&self, ack: AckOverride) {
        self.state.borrow_mut().slave_acks.push(ack);
    }
}
