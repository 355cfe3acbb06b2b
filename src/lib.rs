#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod mmio;
pub mod time;

pub mod rcc;
pub mod pinmux;
pub mod peripherals;

pub mod spi;
pub mod control;
pub mod shared;

pub use mmio::{MappedRegion, Mmio};
pub use peripherals::Instance;
pub use time::Monotonic;
