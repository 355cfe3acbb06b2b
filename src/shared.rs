//! Driver shared between execution contexts
//!
//! Each call holds the lock for a whole configuration or transfer, so no
//! other context can interleave with its read-modify-write sequences.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::mmio::Mmio;
use crate::spi::{ApplyReport, ConfigError, Error, RawChannelConfig, Spi};
use crate::time::Monotonic;

pub struct SharedSpi<R: RawMutex, M, C> {
    inner: Mutex<R, RefCell<Spi<M, C>>>,
}

impl<R: RawMutex, M: Mmio, C: Monotonic> SharedSpi<R, M, C> {
    pub const fn new(spi: Spi<M, C>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(spi)),
        }
    }

    /// Run `f` with exclusive access to the driver.
    ///
    /// Panics if called again from inside `f`.
    pub fn lock<U>(&self, f: impl FnOnce(&mut Spi<M, C>) -> U) -> U {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn apply_configuration(&self, raw: &RawChannelConfig) -> Result<ApplyReport, ConfigError> {
        self.lock(|spi| spi.apply_configuration(raw))
    }

    pub fn transfer(&self, buf: &mut [u8]) -> Result<usize, Error> {
        self.lock(|spi| spi.transfer(buf))
    }

    pub fn write(&self, data: &[u8]) -> Result<usize, Error> {
        self.lock(|spi| spi.write(data))
    }

    pub fn into_inner(self) -> Spi<M, C> {
        self.inner.into_inner().into_inner()
    }
}
