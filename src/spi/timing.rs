//! Polling deadlines

use fugit::{HertzU32 as Hertz, MillisDurationU32};

use super::config::{ClockDivider, WordLength};

/// Bound on SYSSTATUS.RESETDONE after a soft reset
pub const RESET_TIMEOUT: MillisDurationU32 = MillisDurationU32::from_ticks(100);

/// McSPI functional clock on the AM335x
pub const FUNCTIONAL_CLOCK: Hertz = Hertz::from_raw(48_000_000);

/// Deadline for a single word: twice the divider times the word length, in
/// functional clock kilohertz, never below 1 ms.
pub fn word_timeout(divider: ClockDivider, word_length: WordLength, fclk: Hertz) -> MillisDurationU32 {
    let khz = u64::from(fclk.to_kHz()).max(1);
    let ms = u64::from(divider.value()) * 2 * u64::from(word_length.bits()) / khz;

    MillisDurationU32::from_ticks(ms.clamp(1, u64::from(u32::MAX)) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_below_one_millisecond() {
        for wl in [WordLength::Bits8, WordLength::Bits16, WordLength::Bits32] {
            for div in ClockDivider::ALL {
                assert!(word_timeout(div, wl, FUNCTIONAL_CLOCK).ticks() >= 1);
            }
        }
    }

    #[test]
    fn scales_with_slow_clocks() {
        // 32768 * 2 * 32 / 48000
        assert_eq!(
            word_timeout(ClockDivider::Div32768, WordLength::Bits32, FUNCTIONAL_CLOCK).ticks(),
            43
        );
        assert_eq!(
            word_timeout(ClockDivider::Div2, WordLength::Bits8, FUNCTIONAL_CLOCK).ticks(),
            1
        );
    }

    #[test]
    fn sub_kilohertz_clock_does_not_divide_by_zero() {
        let t = word_timeout(ClockDivider::Div4, WordLength::Bits8, Hertz::from_raw(500));
        assert_eq!(t.ticks(), 64);
    }
}
