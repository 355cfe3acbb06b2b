//! Peripheral clock gating (CM_PER)

use bitfield::bitfield;
use fugit::MillisDurationU32;

use crate::mmio::{self, wait_for_bits, Mmio};
use crate::peripherals::Instance;
use crate::time::Monotonic;

const IDLEST_MASK: u32 = 0b11 << 16;

/// IDLEST settles within a few functional clock cycles once MODULEMODE is set
const CLOCK_TIMEOUT: MillisDurationU32 = MillisDurationU32::from_ticks(10);

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct ClkCtrl(u32);
    impl Debug;
    u32;
    pub u8, modulemode, set_modulemode: 1, 0;
    pub u8, idlest, _: 17, 16;
}

impl From<u32> for ClkCtrl {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<ClkCtrl> for u32 {
    fn from(reg: ClkCtrl) -> u32 {
        reg.0
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModuleMode {
    Disabled = 0,
    Enabled = 2,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdleState {
    Functional = 0,
    Transition = 1,
    Idle = 2,
    Disabled = 3,
}

impl From<u8> for IdleState {
    fn from(raw: u8) -> Self {
        match raw & 0b11 {
            0 => IdleState::Functional,
            1 => IdleState::Transition,
            2 => IdleState::Idle,
            _ => IdleState::Disabled,
        }
    }
}

/// CM_PER window. Other drivers share it, so every update runs in a
/// critical section.
pub struct ClockControl<M, C> {
    regs: M,
    clock: C,
}

impl<M: Mmio, C: Monotonic> ClockControl<M, C> {
    pub fn new(regs: M, clock: C) -> Self {
        Self { regs, clock }
    }

    pub fn release(self) -> (M, C) {
        (self.regs, self.clock)
    }

    fn set_mode(&mut self, instance: Instance, mode: ModuleMode) -> Result<(), mmio::Error> {
        let regs = &mut self.regs;
        critical_section::with(|_| {
            regs.modify(instance.clkctrl(), |w: &mut ClkCtrl| w.set_modulemode(mode as u8))
        })
    }

    /// Enable the functional clock and wait until the module reports it is
    /// accessible.
    pub fn enable(&mut self, instance: Instance) -> Result<(), mmio::Error> {
        self.set_mode(instance, ModuleMode::Enabled)?;
        wait_for_bits(
            &mut self.regs,
            &mut self.clock,
            instance.clkctrl(),
            IDLEST_MASK,
            false,
            CLOCK_TIMEOUT,
        )
        .inspect_err(|_| warn!("{:?} clock did not become functional", instance))?;
        debug!("{:?} clock on", instance);
        Ok(())
    }

    pub fn disable(&mut self, instance: Instance) -> Result<(), mmio::Error> {
        self.set_mode(instance, ModuleMode::Disabled)?;
        debug!("{:?} clock off", instance);
        Ok(())
    }

    pub fn idle_state(&mut self, instance: Instance) -> Result<IdleState, mmio::Error> {
        let reg: ClkCtrl = self.regs.read_as(instance.clkctrl())?;
        Ok(IdleState::from(reg.idlest()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::MappedRegion;
    use crate::time::Instant;

    struct Steps(u64);

    impl Monotonic for Steps {
        fn now(&mut self) -> Instant {
            Instant::from_ticks(self.0)
        }

        fn relax(&mut self) {
            self.0 += 1000;
        }
    }

    #[test]
    fn enable_sets_module_mode() {
        let mut words = [0u32; 0x100];
        let mut cm = ClockControl::new(MappedRegion::from_slice(&mut words), Steps(0));

        cm.enable(Instance::McSpi1).unwrap();
        assert_eq!(cm.idle_state(Instance::McSpi1), Ok(IdleState::Functional));
        cm.disable(Instance::McSpi0).unwrap();

        let (mut regs, _) = cm.release();
        assert_eq!(regs.read(0x50), Ok(2));
        assert_eq!(regs.read(0x4C), Ok(0));
    }

    #[test]
    fn module_stuck_in_idle_times_out() {
        let mut words = [0u32; 0x100];
        words[0x4C / 4] = 3 << 16;
        let mut cm = ClockControl::new(MappedRegion::from_slice(&mut words), Steps(0));

        assert_eq!(cm.enable(Instance::McSpi0), Err(mmio::Error::Timeout));
        assert_eq!(cm.idle_state(Instance::McSpi0), Ok(IdleState::Disabled));

        let (mut regs, _) = cm.release();
        // mode is left enabled, only the wait failed
        assert_eq!(regs.read(0x4C), Ok((3 << 16) | 2));
    }
}
