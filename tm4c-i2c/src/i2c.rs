//! Binding of PAC I2C peripherals to [`Registers`](crate::Registers)

/// MCR: master function enable
pub const MCR_MFE: u32 = 0x10;
/// MCR: slave function enable
pub const MCR_SFE: u32 = 0x20;
/// MCR: loopback
pub const MCR_LPBK: u32 = 0x01;
/// SCSR write: device active
pub const SCSR_DA: u32 = 0x01;

#[macro_export]
/// Implements [`Registers`](crate::Registers) and controller bring-up for
/// TM4C I2C peripherals.
///
/// Expects a local `I2c<I2Cx>` wrapper with an `i2c` field, `cortex_m` and the
/// PAC's `Interrupt` enum and the `NVIC` in scope at the invocation site.
macro_rules! i2c_registers {
    ($($I2Cx:ident: $irq:ident,)+) => {
        $(
            impl I2c<$I2Cx> {
                /// Enables the master function and programs the bus timing
                /// and clock-low timeout. All interrupts stay masked.
                pub fn new(
                    i2c: $I2Cx,
                    config: &$crate::Config,
                    sysclk_hz: u32,
                ) -> Result<Self, $crate::ConfigError> {
                    let tpr = config.timer_period(sysclk_hz)?;

                    // set Master Function Enable, and clear other bits.
                    i2c.mcr.write(|w| unsafe { w.bits($crate::i2c::MCR_MFE) });
                    i2c.mtpr.write(|w| unsafe { w.bits(u32::from(tpr)) });
                    i2c.mclkocnt
                        .write(|w| unsafe { w.bits(u32::from(config.clock_timeout_count())) });
                    i2c.mimr.write(|w| unsafe { w.bits(0) });
                    i2c.micr.write(|w| unsafe { w.bits(!0) });

                    Ok(I2c { i2c })
                }

                /// Releases the I2C peripheral
                pub fn free(self) -> $I2Cx {
                    self.i2c
                }

                /// Answers on `address` (7-bit) as a slave and unmasks the
                /// slave interrupts.
                pub fn enable_slave(&mut self, address: u8) {
                    self.i2c
                        .soar
                        .write(|w| unsafe { w.bits(u32::from(address & 0x7f)) });
                    self.i2c
                        .mcr
                        .modify(|r, w| unsafe { w.bits(r.bits() | $crate::i2c::MCR_SFE) });
                    self.i2c
                        .scsr
                        .write(|w| unsafe { w.bits($crate::i2c::SCSR_DA) });
                    $crate::Registers::set_slave_interrupt_mask(
                        self,
                        $crate::registers::SlaveInterrupt::all(),
                    );
                }

                /// Routes master output back to the slave side of the same
                /// controller.
                pub fn loopback(&mut self, enable: bool) {
                    self.i2c.mcr.modify(|r, w| unsafe {
                        w.bits(if enable {
                            r.bits() | $crate::i2c::MCR_LPBK
                        } else {
                            r.bits() & !$crate::i2c::MCR_LPBK
                        })
                    });
                }

                /// Unmasks the controller's interrupt line in the NVIC.
                ///
                /// # Safety
                ///
                /// The handler must own the context it services, e.g. through
                /// a `tm4c_i2c::Shared`.
                pub unsafe fn unmask_interrupt(&self) {
                    NVIC::unmask(Interrupt::$irq);
                }
            }

            impl $crate::Registers for I2c<$I2Cx> {
                fn set_target(&self, address: u8) {
                    self.i2c.msa.write(|w| unsafe { w.bits(u32::from(address)) });
                }

                fn write_data(&self, byte: u8) {
                    self.i2c.mdr.write(|w| unsafe { w.data().bits(byte) });
                }

                fn read_data(&self) -> u8 {
                    self.i2c.mdr.read().data().bits()
                }

                fn command(&self, command: $crate::registers::Command) {
                    self.i2c.mcs.write(|w| unsafe { w.bits(command.bits()) });
                    // `busy` is not reliably set until up to 8 cycles after
                    // `run`, so give the controller time before anyone polls.
                    cortex_m::asm::delay(8);
                }

                fn control_status(&self) -> $crate::registers::ControlStatus {
                    $crate::registers::ControlStatus::from_bits_truncate(self.i2c.mcs.read().bits())
                }

                fn raw_status(&self) -> $crate::registers::MasterStatus {
                    $crate::registers::MasterStatus::from_bits_truncate(self.i2c.mris.read().bits())
                }

                fn masked_status(&self) -> $crate::registers::MasterStatus {
                    $crate::registers::MasterStatus::from_bits_truncate(self.i2c.mmis.read().bits())
                }

                fn clear_status(&self, status: $crate::registers::MasterStatus) {
                    self.i2c.micr.write(|w| unsafe { w.bits(status.bits()) });
                    if status == $crate::registers::MasterStatus::DATA {
                        // Rev B Tiva parts only clear a lone MIS when it is also
                        // written to MMIS; later silicon ignores the write.
                        let mmis = &self.i2c.mmis as *const _ as *mut u32;
                        unsafe { core::ptr::write_volatile(mmis, status.bits()) };
                    }
                }

                fn set_interrupt_mask(&self, mask: $crate::registers::MasterStatus) {
                    self.i2c.mimr.write(|w| unsafe { w.bits(mask.bits()) });
                }

                fn slave_raw_status(&self) -> $crate::registers::SlaveInterrupt {
                    $crate::registers::SlaveInterrupt::from_bits_truncate(self.i2c.sris.read().bits())
                }

                fn clear_slave_status(&self, status: $crate::registers::SlaveInterrupt) {
                    self.i2c.sicr.write(|w| unsafe { w.bits(status.bits()) });
                }

                fn set_slave_interrupt_mask(&self, mask: $crate::registers::SlaveInterrupt) {
                    self.i2c.simr.write(|w| unsafe { w.bits(mask.bits()) });
                }

                fn slave_request(&self) -> $crate::registers::SlaveRequest {
                    $crate::registers::SlaveRequest::from_bits_truncate(self.i2c.scsr.read().bits())
                }

                fn read_slave_data(&self) -> u8 {
                    self.i2c.sdr.read().data().bits()
                }

                fn write_slave_data(&self, byte: u8) {
                    self.i2c.sdr.write(|w| unsafe { w.data().bits(byte) });
                }

                fn set_slave_ack(&self, ack: $crate::registers::AckOverride) {
                    self.i2c.sackctl.write(|w| unsafe { w.bits(ack.bits()) });
                }
            }
        )+
    };
}
