//! McSPI register layout

use bitfield::bitfield;

pub const REVISION: usize = 0x000;
pub const SYSCONFIG: usize = 0x110;
pub const SYSSTATUS: usize = 0x114;
pub const IRQSTATUS: usize = 0x118;
pub const IRQENABLE: usize = 0x11C;
pub const SYST: usize = 0x124;
pub const MODULCTRL: usize = 0x128;
pub const XFERLEVEL: usize = 0x17C;

const CH0CONF: usize = 0x12C;
const CHSTAT: usize = 0x04;
const CHCTRL: usize = 0x08;
const CHTX: usize = 0x0C;
const CHRX: usize = 0x10;
const CHANNEL_STRIDE: usize = 0x14;

/// One of the four channel register blocks.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Ch0 = 0,
    Ch1 = 1,
    Ch2 = 2,
    Ch3 = 3,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Ch0, Channel::Ch1, Channel::Ch2, Channel::Ch3];

    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Channel::Ch0),
            1 => Some(Channel::Ch1),
            2 => Some(Channel::Ch2),
            3 => Some(Channel::Ch3),
            _ => None,
        }
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    const fn block(self) -> usize {
        CH0CONF + self as usize * CHANNEL_STRIDE
    }

    pub const fn conf(self) -> usize {
        self.block()
    }

    pub const fn stat(self) -> usize {
        self.block() + CHSTAT
    }

    pub const fn ctrl(self) -> usize {
        self.block() + CHCTRL
    }

    pub const fn tx(self) -> usize {
        self.block() + CHTX
    }

    pub const fn rx(self) -> usize {
        self.block() + CHRX
    }
}

macro_rules! impl_register {
    ($($name:ident),* $(,)?) => {
        $(
            impl From<u32> for $name {
                #[inline]
                fn from(bits: u32) -> Self {
                    Self(bits)
                }
            }

            impl From<$name> for u32 {
                #[inline]
                fn from(reg: $name) -> u32 {
                    reg.0
                }
            }

            impl $name {
                #[inline]
                pub const fn bits(&self) -> u32 {
                    self.0
                }
            }
        )*
    };
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct SysConfig(u32);
    impl Debug;
    u32;
    pub autoidle, set_autoidle: 0;
    pub softreset, set_softreset: 1;
    pub u8, sidlemode, set_sidlemode: 4, 3;
    pub u8, clockactivity, set_clockactivity: 9, 8;
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct SysStatus(u32);
    impl Debug;
    u32;
    pub resetdone, _: 0;
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct ModulCtrl(u32);
    impl Debug;
    u32;
    pub single, set_single: 0;
    /// Chip select unused when set
    pub pin34, set_pin34: 1;
    /// Slave when set
    pub ms, set_ms: 2;
    pub system_test, set_system_test: 3;
    pub u8, initdly, set_initdly: 6, 4;
    pub moa, set_moa: 7;
    pub fdaa, set_fdaa: 8;
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct ChConf(u32);
    impl Debug;
    u32;
    pub pha, set_pha: 0;
    pub pol, set_pol: 1;
    pub u8, clkd, set_clkd: 5, 2;
    /// Chip select held low during the active state
    pub epol, set_epol: 6;
    /// Word length minus one
    pub u8, wl, set_wl: 11, 7;
    pub u8, trm, set_trm: 13, 12;
    pub dmaw, set_dmaw: 14;
    pub dmar, set_dmar: 15;
    /// No transmission on data line 0 when set
    pub dpe0, set_dpe0: 16;
    pub dpe1, set_dpe1: 17;
    /// Data line 1 selected for reception when set
    pub is, set_is: 18;
    pub turbo, set_turbo: 19;
    pub force, set_force: 20;
    pub u8, spienslv, set_spienslv: 22, 21;
    pub sbe, set_sbe: 23;
    pub sbpol, set_sbpol: 24;
    pub u8, tcs, set_tcs: 26, 25;
    pub ffew, set_ffew: 27;
    pub ffer, set_ffer: 28;
    pub clkg, set_clkg: 29;
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct ChStat(u32);
    impl Debug;
    u32;
    pub rxs, _: 0;
    pub txs, _: 1;
    pub eot, _: 2;
    pub txffe, _: 3;
    pub txfff, _: 4;
    pub rxffe, _: 5;
    pub rxfff, _: 6;
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct ChCtrl(u32);
    impl Debug;
    u32;
    pub en, set_en: 0;
    pub u8, extclk, set_extclk: 15, 8;
}

impl_register!(SysConfig, SysStatus, ModulCtrl, ChConf, ChStat, ChCtrl);

pub mod mask {
    //! Single-bit masks for the polling loops

    pub const SYSSTATUS_RESETDONE: u32 = 1 << 0;
    pub const CHSTAT_RXS: u32 = 1 << 0;
    pub const CHSTAT_TXS: u32 = 1 << 1;
    pub const CHSTAT_EOT: u32 = 1 << 2;
    pub const CHCTRL_EN: u32 = 1 << 0;
}
