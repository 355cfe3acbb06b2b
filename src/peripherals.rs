//! AM335x memory map for the McSPI modules and the blocks that feed them

use crate::mmio::{self, Mmio};
use crate::pinmux::PinMux;
use crate::rcc::ClockControl;
use crate::spi::BringUp;
use crate::time::Monotonic;

/// Clock module, peripheral domain
pub const CM_PER_BASE: usize = 0x44E0_0000;
pub const CM_PER_SIZE: usize = 0x400;

/// Control module, pad configuration
pub const CONTROL_MODULE_BASE: usize = 0x44E1_0000;
pub const CONTROL_MODULE_SIZE: usize = 0x2000;

macro_rules! instances {
    ($($name:ident <= $base:literal, clkctrl: $clkctrl:literal, mode: $mode:literal, pads: [$($pad:literal),* $(,)?];)*) => {
        #[derive(Debug, PartialEq, Eq, Clone, Copy)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum Instance {
            $($name,)*
        }

        impl Instance {
            /// Physical base of the register window
            pub const fn base(self) -> usize {
                match self {
                    $(Instance::$name => $base,)*
                }
            }

            /// `SPIx_CLKCTRL` offset within CM_PER
            pub const fn clkctrl(self) -> usize {
                match self {
                    $(Instance::$name => $clkctrl,)*
                }
            }

            /// Pad mux mode routing the module to its pins
            pub const fn mux_mode(self) -> u8 {
                match self {
                    $(Instance::$name => $mode,)*
                }
            }

            /// Pad configuration offsets within the control module
            pub const fn pads(self) -> &'static [usize] {
                match self {
                    $(Instance::$name => &[$($pad),*],)*
                }
            }
        }
    };
}

instances! {
    // sclk, d0, d1, cs0, cs1
    McSpi0 <= 0x4803_0000, clkctrl: 0x4C, mode: 0, pads: [0x950, 0x954, 0x958, 0x95C, 0x960];
    // mcasp0_aclkx, fsx, axr0, ahclkr
    McSpi1 <= 0x481A_0000, clkctrl: 0x50, mode: 3, pads: [0x990, 0x994, 0x998, 0x99C];
}

impl Instance {
    /// Every McSPI window spans 4 KiB
    pub const SIZE: usize = 0x1000;
}

/// [`BringUp`] for one McSPI instance on the AM335x: CM_PER clock gating and
/// control module pad muxing.
pub struct SocBringUp<K, P, C> {
    instance: Instance,
    clocks: ClockControl<K, C>,
    pins: PinMux<P>,
}

impl<K: Mmio, P: Mmio, C: Monotonic> SocBringUp<K, P, C> {
    pub fn new(instance: Instance, clocks: ClockControl<K, C>, pins: PinMux<P>) -> Self {
        Self {
            instance,
            clocks,
            pins,
        }
    }

    pub fn instance(&self) -> Instance {
        self.instance
    }

    pub fn release(self) -> (ClockControl<K, C>, PinMux<P>) {
        (self.clocks, self.pins)
    }
}

impl<K: Mmio, P: Mmio, C: Monotonic> BringUp for SocBringUp<K, P, C> {
    fn enable_clock(&mut self) -> Result<(), mmio::Error> {
        self.clocks.enable(self.instance)
    }

    fn disable_clock(&mut self) -> Result<(), mmio::Error> {
        self.clocks.disable(self.instance)
    }

    fn configure_pins(&mut self) -> Result<(), mmio::Error> {
        self.pins.route(self.instance)
    }
}
