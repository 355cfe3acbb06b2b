//! Monotonic time sources for bounded polling

use embedded_hal::delay::DelayNs;

/// Microsecond instant.
pub type Instant = fugit::TimerInstantU64<1_000_000>;

/// A clock the polling loops can sample, and a way to yield between polls.
pub trait Monotonic {
    fn now(&mut self) -> Instant;

    /// Called once per unsuccessful poll.
    fn relax(&mut self) {
        core::hint::spin_loop();
    }
}

impl<T: Monotonic + ?Sized> Monotonic for &mut T {
    #[inline]
    fn now(&mut self) -> Instant {
        (**self).now()
    }

    #[inline]
    fn relax(&mut self) {
        (**self).relax()
    }
}

/// Builds a clock out of any [`DelayNs`] provider.
///
/// Each relax sleeps for `step_us` and advances the clock by the same amount,
/// so time spent reading registers is not counted. Suitable for targets with
/// no free-running counter.
pub struct DelayClock<D> {
    delay: D,
    step_us: u32,
    elapsed_us: u64,
}

impl<D: DelayNs> DelayClock<D> {
    pub fn new(delay: D, step_us: u32) -> Self {
        Self {
            delay,
            step_us: step_us.max(1),
            elapsed_us: 0,
        }
    }

    pub fn release(self) -> D {
        self.delay
    }
}

impl<D: DelayNs> Monotonic for DelayClock<D> {
    fn now(&mut self) -> Instant {
        Instant::from_ticks(self.elapsed_us)
    }

    fn relax(&mut self) {
        self.delay.delay_us(self.step_us);
        self.elapsed_us = self.elapsed_us.wrapping_add(u64::from(self.step_us));
    }
}

/// Clock backed by the embassy time driver.
#[cfg(feature = "embassy")]
#[derive(Default, Clone, Copy)]
pub struct EmbassyClock;

#[cfg(feature = "embassy")]
impl Monotonic for EmbassyClock {
    fn now(&mut self) -> Instant {
        Instant::from_ticks(embassy_time::Instant::now().as_micros())
    }
}
