//! Pad multiplexing (control module)
//!
//! Only the mux mode is touched. Pull, receiver and slew settings keep
//! whatever the boot loader programmed.

use bitfield::bitfield;

use crate::mmio::{self, Mmio};
use crate::peripherals::Instance;

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Pad(u32);
    impl Debug;
    u32;
    pub u8, mmode, set_mmode: 2, 0;
    /// Pull disabled when set
    pub puden, set_puden: 3;
    /// Pull-up when set
    pub putypesel, set_putypesel: 4;
    pub rxactive, set_rxactive: 5;
    /// Slow slew when set
    pub slewctrl, set_slewctrl: 6;
}

impl From<u32> for Pad {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<Pad> for u32 {
    fn from(pad: Pad) -> u32 {
        pad.0
    }
}

/// Control module window
pub struct PinMux<M> {
    regs: M,
}

impl<M: Mmio> PinMux<M> {
    pub fn new(regs: M) -> Self {
        Self { regs }
    }

    pub fn release(self) -> M {
        self.regs
    }

    pub fn pad(&mut self, offset: usize) -> Result<Pad, mmio::Error> {
        self.regs.read_as(offset)
    }

    pub fn set_mode(&mut self, offset: usize, mode: u8) -> Result<(), mmio::Error> {
        let regs = &mut self.regs;
        critical_section::with(|_| regs.modify(offset, |w: &mut Pad| w.set_mmode(mode & 0b111)))
    }

    /// Route every pad of `instance` to the McSPI module.
    pub fn route(&mut self, instance: Instance) -> Result<(), mmio::Error> {
        for pad in instance.pads() {
            self.set_mode(*pad, instance.mux_mode())?;
        }
        debug!("{:?} pads routed, mode {}", instance, instance.mux_mode());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::MappedRegion;

    #[test]
    fn route_only_changes_mux_mode() {
        let mut words = [0u32; 0x800];
        for w in &mut words[0x950 / 4..=0x99C / 4] {
            *w = 0x37; // rxactive | putypesel | mode 7
        }
        let mut mux = PinMux::new(MappedRegion::from_slice(&mut words));

        mux.route(Instance::McSpi0).unwrap();
        mux.route(Instance::McSpi1).unwrap();

        let sclk = mux.pad(0x950).unwrap();
        assert_eq!(sclk.mmode(), 0);
        assert!(sclk.rxactive());
        assert_eq!(mux.pad(0x960).unwrap().mmode(), 0);
        assert_eq!(mux.pad(0x998).unwrap().mmode(), 3);
        // not an SPI pad
        assert_eq!(mux.pad(0x964).unwrap().mmode(), 7);
    }
}
