//! Memory-mapped register access
//!
//! Every access goes through an offset relative to the start of a mapped
//! region, checked against the region bounds before the pointer is formed.

use core::marker::PhantomData;
use core::ptr::NonNull;
use core::sync::atomic::{fence, Ordering};

use fugit::MillisDurationU32;

use crate::time::Monotonic;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Null base, or an offset outside the mapped window / not word aligned
    Unmapped,
    /// A bounded wait expired
    Timeout,
}

/// 32-bit register window.
///
/// Read-modify-write helpers are not atomic; callers that share a window
/// between contexts must serialize whole operations.
pub trait Mmio {
    fn read(&mut self, offset: usize) -> Result<u32, Error>;

    /// Write `value`. Implementations order the write before any later access.
    fn write(&mut self, offset: usize, value: u32) -> Result<(), Error>;

    fn set_bits(&mut self, offset: usize, mask: u32) -> Result<(), Error> {
        let value = self.read(offset)?;
        self.write(offset, value | mask)
    }

    fn clear_bits(&mut self, offset: usize, mask: u32) -> Result<(), Error> {
        let value = self.read(offset)?;
        self.write(offset, value & !mask)
    }

    /// Read a register as its typed view.
    fn read_as<R: From<u32>>(&mut self, offset: usize) -> Result<R, Error>
    where
        Self: Sized,
    {
        self.read(offset).map(R::from)
    }

    /// Typed read-modify-write, `regs.modify(CH0CONF, |w: &mut ChConf| w.set_pha(true))`.
    fn modify<R, F>(&mut self, offset: usize, f: F) -> Result<(), Error>
    where
        Self: Sized,
        R: From<u32> + Into<u32>,
        F: FnOnce(&mut R),
    {
        let mut value = R::from(self.read(offset)?);
        f(&mut value);
        self.write(offset, value.into())
    }
}

impl<M: Mmio + ?Sized> Mmio for &mut M {
    #[inline]
    fn read(&mut self, offset: usize) -> Result<u32, Error> {
        (**self).read(offset)
    }

    #[inline]
    fn write(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        (**self).write(offset, value)
    }
}

/// A mapped peripheral window borrowed for `'a`.
pub struct MappedRegion<'a> {
    base: NonNull<u32>,
    len: usize,
    _region: PhantomData<&'a mut [u32]>,
}

// The region is only reachable through `&mut self`.
unsafe impl Send for MappedRegion<'_> {}

impl<'a> MappedRegion<'a> {
    /// Wrap `len` bytes of device memory starting at `base`.
    ///
    /// # Safety
    ///
    /// `base..base + len` must be a valid, word-aligned device mapping that
    /// stays mapped and is not accessed through any other handle for `'a`.
    pub unsafe fn new(base: *mut u32, len: usize) -> Result<Self, Error> {
        let base = NonNull::new(base).ok_or(Error::Unmapped)?;
        if base.as_ptr() as usize % 4 != 0 {
            return Err(Error::Unmapped);
        }
        Ok(Self {
            base,
            len,
            _region: PhantomData,
        })
    }

    /// Use ordinary memory as a register window.
    pub fn from_slice(words: &'a mut [u32]) -> Self {
        let len = words.len() * 4;
        Self {
            // SAFETY: slices are never null
            base: unsafe { NonNull::new_unchecked(words.as_mut_ptr()) },
            len,
            _region: PhantomData,
        }
    }

    /// Window size in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn register(&self, offset: usize) -> Result<*mut u32, Error> {
        if offset % 4 != 0 || offset.checked_add(4).map_or(true, |end| end > self.len) {
            return Err(Error::Unmapped);
        }
        // SAFETY: bounds checked above
        Ok(unsafe { self.base.as_ptr().add(offset / 4) })
    }
}

impl Mmio for MappedRegion<'_> {
    #[inline]
    fn read(&mut self, offset: usize) -> Result<u32, Error> {
        let reg = self.register(offset)?;
        Ok(unsafe { reg.read_volatile() })
    }

    #[inline]
    fn write(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        let reg = self.register(offset)?;
        unsafe { reg.write_volatile(value) };
        fence(Ordering::SeqCst);
        Ok(())
    }
}

/// Poll `offset` until `(value & mask) != 0` equals `want_set`.
///
/// The deadline is measured from the first clock sample; `clock.relax()` runs
/// between polls. A bit already in the wanted state returns without relaxing.
pub fn wait_for_bits<M, C>(
    regs: &mut M,
    clock: &mut C,
    offset: usize,
    mask: u32,
    want_set: bool,
    timeout: MillisDurationU32,
) -> Result<(), Error>
where
    M: Mmio + ?Sized,
    C: Monotonic + ?Sized,
{
    let start = clock.now().ticks();
    let budget_us = u64::from(timeout.ticks()) * 1000;

    loop {
        if (regs.read(offset)? & mask != 0) == want_set {
            return Ok(());
        }
        if clock.now().ticks().wrapping_sub(start) >= budget_us {
            return Err(Error::Timeout);
        }
        clock.relax();
    }
}
