//! McSPI, polling mode

/*
Four independent channels sharing one functional clock
Master and slave modes
Word length of 8, 16 or 32 bits
Functional clock divided by powers of two, 1 to 32768
Programmable clock phase and polarity
Chip select polarity, per-word chip select toggling
Transmit-only, receive-only or full-duplex transfers
Either data line may be used for reception
*/

use fugit::{HertzU32 as Hertz, MillisDurationU32};

use crate::mmio::{self, wait_for_bits, Mmio};
use crate::time::Monotonic;

mod config;
pub mod regs;
pub mod timing;

pub use config::*;
pub use regs::Channel;
use regs::{mask, ChConf, ChCtrl, ChStat, ModulCtrl, SysConfig, MODULCTRL, SYSCONFIG, SYSSTATUS};

/// Fields in the order they were written.
pub type FieldList = heapless::Vec<Field, { Field::COUNT }>;

/// What the applier does with a value outside its field's domain.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Validation {
    /// Role, pin direction, phase and polarity abort. Invalid transfer mode,
    /// clock divider, word length and chip select values are replaced by
    /// their reset value and reported in [`ApplyReport::skipped`]. A reset
    /// timeout is only logged.
    Tolerant,
    /// The whole record is checked before the first register write, and a
    /// reset timeout aborts.
    Strict,
}

#[non_exhaustive]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Config {
    pub functional_clock: Hertz,
    pub validation: Validation,
    pub reset_timeout: MillisDurationU32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            functional_clock: timing::FUNCTIONAL_CLOCK,
            validation: Validation::Tolerant,
            reset_timeout: timing::RESET_TIMEOUT,
        }
    }
}

impl Config {
    pub fn strict() -> Self {
        Self {
            validation: Validation::Strict,
            ..Default::default()
        }
    }
}

/// Where a transfer stalled.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    /// CHxSTAT.TXS
    Transmit,
    /// CHxSTAT.RXS
    Receive,
    /// CHxSTAT.EOT
    EndOfTransfer,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A status bit did not come up in time. `transferred` words completed
    /// before the stall and stay on the wire.
    Timeout { transferred: usize, stage: Stage },
    UnmappedRegister,
    /// The channel is configured transmit-only
    ReceiveDisabled,
}

impl Error {
    fn stalled(stage: Stage, transferred: usize) -> impl FnOnce(mmio::Error) -> Error {
        move |e| match e {
            mmio::Error::Timeout => Error::Timeout { transferred, stage },
            mmio::Error::Unmapped => Error::UnmappedRegister,
        }
    }

    // plain reads and writes only fail on an unmapped offset
    fn access(_: mmio::Error) -> Error {
        Error::UnmappedRegister
    }
}

impl embedded_hal::spi::Error for Error {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        embedded_hal::spi::ErrorKind::Other
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// `field` held a value outside its domain. Everything in `applied` is
    /// already in hardware.
    InvalidField { field: Field, applied: FieldList },
    ChannelOutOfRange(u8),
    /// SYSSTATUS.RESETDONE never rose, only raised by strict validation
    ResetTimeout,
    UnmappedRegister { applied: FieldList },
    /// Clock or pad setup failed
    BringUp(mmio::Error),
    /// [`Spi::open`] called twice without [`Spi::close`]
    AlreadyOpen,
}

impl ConfigError {
    /// Fields written before the failure, in order.
    pub fn applied(&self) -> &[Field] {
        match self {
            ConfigError::InvalidField { applied, .. } | ConfigError::UnmappedRegister { applied } => {
                applied.as_slice()
            }
            _ => &[],
        }
    }
}

/// Outcome of a successful [`Spi::apply_configuration`].
#[derive(Debug, Default, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ApplyReport {
    pub applied: FieldList,
    /// Fields whose requested value (or the chip select polarity they
    /// depend on) was invalid. Their reset value was written instead and
    /// they are listed in `applied` as well.
    pub skipped: FieldList,
    pub reset_timed_out: bool,
}

impl ApplyReport {
    fn applied(&mut self, field: Field) {
        trace!("applied {:?}", field);
        // one entry per field, capacity cannot be exceeded
        let _ = self.applied.push(field);
    }

    fn skipped(&mut self, field: Field) {
        let _ = self.skipped.push(field);
    }
}

enum Abort {
    Invalid(Field),
    ResetTimeout,
    Unmapped,
}

impl From<mmio::Error> for Abort {
    fn from(_: mmio::Error) -> Self {
        Abort::Unmapped
    }
}

/// Platform side of opening a channel: functional clock and pads.
pub trait BringUp {
    fn enable_clock(&mut self) -> Result<(), mmio::Error>;
    fn disable_clock(&mut self) -> Result<(), mmio::Error>;
    fn configure_pins(&mut self) -> Result<(), mmio::Error>;
}

/// One McSPI module driving a single active channel.
///
/// The driver owns the register window and the active [`ChannelConfig`];
/// the transfer deadline is recomputed every time configuration is applied.
pub struct Spi<M, C> {
    regs: M,
    clock: C,
    config: Config,
    channel: ChannelConfig,
    timeout: MillisDurationU32,
    opened: bool,
}

impl<M: Mmio, C: Monotonic> Spi<M, C> {
    /// Does not touch hardware. Call [`Spi::open`] or
    /// [`Spi::apply_configuration`] before transferring.
    pub fn new(regs: M, clock: C, config: Config) -> Self {
        let channel = ChannelConfig::default();
        let timeout = timing::word_timeout(channel.clock_divider, channel.word_length, config.functional_clock);
        Self {
            regs,
            clock,
            config,
            channel,
            timeout,
            opened: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn channel_config(&self) -> &ChannelConfig {
        &self.channel
    }

    /// Per-word deadline derived from the active divider and word length.
    pub fn timeout(&self) -> MillisDurationU32 {
        self.timeout
    }

    pub fn regs(&mut self) -> &mut M {
        &mut self.regs
    }

    pub fn release(self) -> (M, C) {
        (self.regs, self.clock)
    }

    /// Soft reset the module and wait for RESETDONE.
    pub fn reset(&mut self) -> Result<(), mmio::Error> {
        self.regs.modify(SYSCONFIG, |w: &mut SysConfig| w.set_softreset(true))?;
        wait_for_bits(
            &mut self.regs,
            &mut self.clock,
            SYSSTATUS,
            mask::SYSSTATUS_RESETDONE,
            true,
            self.config.reset_timeout,
        )
    }

    /// Reset the module, then write `raw` into the channel it selects.
    ///
    /// Writes happen in a fixed order: role, transfer mode, clock divider,
    /// word length, chip select, then phase, polarity and pin direction in a
    /// single CHxCONF update. There is no rollback; on error the hardware
    /// holds exactly the fields listed by [`ConfigError::applied`] on top of
    /// the reset state, and the active configuration reads the same way:
    /// fields never reached report their [`ChannelConfig::after_reset`]
    /// values.
    pub fn apply_configuration(&mut self, raw: &RawChannelConfig) -> Result<ApplyReport, ConfigError> {
        let Some(channel) = Channel::from_index(raw.channel) else {
            error!("channel {} out of range", raw.channel);
            return Err(ConfigError::ChannelOutOfRange(raw.channel));
        };

        if self.config.validation == Validation::Strict {
            if let Err(field) = ChannelConfig::try_from(raw) {
                error!("rejected {:?}", field);
                return Err(ConfigError::InvalidField {
                    field,
                    applied: FieldList::new(),
                });
            }
        }

        let mut report = ApplyReport::default();
        let mut next = self.channel;
        let res = self.apply_fields(channel, raw, &mut next, &mut report);

        self.channel = next;
        self.timeout = timing::word_timeout(next.clock_divider, next.word_length, self.config.functional_clock);

        match res {
            Ok(()) => {
                debug!("channel {} configured, timeout {} ms", channel.index(), self.timeout.ticks());
                Ok(report)
            }
            Err(Abort::Invalid(field)) => Err(ConfigError::InvalidField {
                field,
                applied: report.applied,
            }),
            Err(Abort::ResetTimeout) => Err(ConfigError::ResetTimeout),
            Err(Abort::Unmapped) => Err(ConfigError::UnmappedRegister {
                applied: report.applied,
            }),
        }
    }

    /// Apply a typed configuration.
    pub fn configure(&mut self, config: ChannelConfig) -> Result<ApplyReport, ConfigError> {
        self.apply_configuration(&config.into())
    }

    fn apply_fields(
        &mut self,
        channel: Channel,
        raw: &RawChannelConfig,
        next: &mut ChannelConfig,
        report: &mut ApplyReport,
    ) -> Result<(), Abort> {
        let strict = self.config.validation == Validation::Strict;

        match self.reset() {
            Ok(()) => {}
            Err(mmio::Error::Timeout) if strict => {
                error!("soft reset timed out");
                return Err(Abort::ResetTimeout);
            }
            Err(mmio::Error::Timeout) => {
                warn!("soft reset timed out, continuing");
                report.reset_timed_out = true;
            }
            Err(mmio::Error::Unmapped) => return Err(Abort::Unmapped),
        }

        // registers are back at their reset values from here on
        *next = ChannelConfig::after_reset(channel);
        let reset = *next;

        let role = Role::try_from(raw.role).map_err(|v| {
            error!("invalid role {}", v);
            Abort::Invalid(Field::Role)
        })?;
        self.regs.modify(MODULCTRL, |w: &mut ModulCtrl| w.set_ms(role == Role::Slave))?;
        next.role = role;
        report.applied(Field::Role);

        let conf = channel.conf();

        let mode = TransferMode::try_from(raw.transfer_mode)
            .or_else(|v| tolerate(strict, Field::TransferMode, v, reset.transfer_mode, report))?;
        self.regs.modify(conf, |w: &mut ChConf| w.set_trm(u32::from(mode) as u8))?;
        next.transfer_mode = mode;
        report.applied(Field::TransferMode);

        let divider = ClockDivider::try_from(raw.clock_divider)
            .or_else(|v| tolerate(strict, Field::ClockDivider, v, reset.clock_divider, report))?;
        self.write_clock_divider(channel, divider)?;
        next.clock_divider = divider;
        report.applied(Field::ClockDivider);

        let wl = WordLength::try_from(raw.word_length)
            .or_else(|v| tolerate(strict, Field::WordLength, v, reset.word_length, report))?;
        self.regs.modify(conf, |w: &mut ChConf| w.set_wl(u32::from(wl) as u8))?;
        next.word_length = wl;
        report.applied(Field::WordLength);

        let (cs_polarity, sensitivity) = match ChipSelectPolarity::try_from(raw.cs_polarity) {
            Ok(cs_polarity) => {
                let sensitivity = ChipSelectSensitivity::try_from(raw.cs_sensitivity).or_else(|v| {
                    tolerate(strict, Field::ChipSelectSensitivity, v, reset.cs_sensitivity, report)
                })?;
                (cs_polarity, sensitivity)
            }
            Err(v) => {
                let cs_polarity = tolerate(strict, Field::ChipSelectPolarity, v, reset.cs_polarity, report)?;
                report.skipped(Field::ChipSelectSensitivity);
                (cs_polarity, reset.cs_sensitivity)
            }
        };
        self.regs.modify(conf, |w: &mut ChConf| {
            w.set_epol(cs_polarity == ChipSelectPolarity::ActiveLow)
        })?;
        next.cs_polarity = cs_polarity;
        report.applied(Field::ChipSelectPolarity);
        self.regs.modify(MODULCTRL, |w: &mut ModulCtrl| {
            w.set_pin34(sensitivity == ChipSelectSensitivity::Disabled)
        })?;
        next.cs_sensitivity = sensitivity;
        report.applied(Field::ChipSelectSensitivity);

        let pin_direction = PinDirection::try_from(raw.pin_direction).map_err(|v| {
            error!("invalid pin direction {}", v);
            Abort::Invalid(Field::PinDirection)
        })?;
        let phase = Phase::try_from(raw.phase).map_err(|v| {
            error!("invalid phase {}", v);
            Abort::Invalid(Field::Phase)
        })?;
        let polarity = Polarity::try_from(raw.polarity).map_err(|v| {
            error!("invalid polarity {}", v);
            Abort::Invalid(Field::Polarity)
        })?;

        self.regs.modify(conf, |w: &mut ChConf| {
            w.set_pha(phase == Phase::Even);
            w.set_pol(polarity == Polarity::ActiveLow);
            let d1_in = pin_direction == PinDirection::D1InD0Out;
            w.set_is(d1_in);
            w.set_dpe1(d1_in);
            w.set_dpe0(!d1_in);
        })?;
        next.pin_direction = pin_direction;
        next.phase = phase;
        next.polarity = polarity;
        report.applied(Field::PinDirection);
        report.applied(Field::Phase);
        report.applied(Field::Polarity);

        Ok(())
    }

    // CLKD must not change under an enabled channel
    fn write_clock_divider(&mut self, channel: Channel, divider: ClockDivider) -> Result<(), mmio::Error> {
        let ctrl = channel.ctrl();
        let was_enabled = self.regs.read_as::<ChCtrl>(ctrl)?.en();
        if was_enabled {
            self.regs.clear_bits(ctrl, mask::CHCTRL_EN)?;
        }
        self.regs
            .modify(channel.conf(), |w: &mut ChConf| w.set_clkd(u32::from(divider) as u8))?;
        if was_enabled {
            self.regs.set_bits(ctrl, mask::CHCTRL_EN)?;
        }
        Ok(())
    }

    /// Change the divider of the active channel without a reset. The channel
    /// is paused for the update if it was enabled.
    pub fn set_clock_divider(&mut self, divider: ClockDivider) -> Result<(), Error> {
        self.write_clock_divider(self.channel.channel, divider)
            .map_err(Error::access)?;
        self.channel.clock_divider = divider;
        self.timeout = timing::word_timeout(divider, self.channel.word_length, self.config.functional_clock);
        debug!("divider {}, timeout {} ms", divider.value(), self.timeout.ticks());
        Ok(())
    }

    pub fn is_enabled(&mut self) -> Result<bool, Error> {
        let ctrl: ChCtrl = self
            .regs
            .read_as(self.channel.channel.ctrl())
            .map_err(Error::access)?;
        Ok(ctrl.en())
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), Error> {
        let ctrl = self.channel.channel.ctrl();
        let res = if enabled {
            self.regs.set_bits(ctrl, mask::CHCTRL_EN)
        } else {
            self.regs.clear_bits(ctrl, mask::CHCTRL_EN)
        };
        res.map_err(Error::access)
    }

    pub fn enable(&mut self) -> Result<(), Error> {
        self.set_enabled(true)
    }

    pub fn disable(&mut self) -> Result<(), Error> {
        self.set_enabled(false)
    }

    /// Clock on, reset and configure, pads, channel enable.
    pub fn open<B: BringUp + ?Sized>(
        &mut self,
        raw: &RawChannelConfig,
        bring_up: &mut B,
    ) -> Result<ApplyReport, ConfigError> {
        if self.opened {
            return Err(ConfigError::AlreadyOpen);
        }
        bring_up.enable_clock().map_err(ConfigError::BringUp)?;
        match self.start(raw, bring_up) {
            Ok(report) => {
                self.opened = true;
                info!("channel {} open", self.channel.channel.index());
                Ok(report)
            }
            Err(e) => {
                if bring_up.disable_clock().is_err() {
                    warn!("clock left on after failed open");
                }
                Err(e)
            }
        }
    }

    fn start<B: BringUp + ?Sized>(
        &mut self,
        raw: &RawChannelConfig,
        bring_up: &mut B,
    ) -> Result<ApplyReport, ConfigError> {
        let report = self.apply_configuration(raw)?;
        bring_up.configure_pins().map_err(ConfigError::BringUp)?;
        if self.enable().is_err() {
            return Err(ConfigError::UnmappedRegister {
                applied: report.applied,
            });
        }
        Ok(report)
    }

    /// Disable the channel and gate its clock.
    pub fn close<B: BringUp + ?Sized>(&mut self, bring_up: &mut B) -> Result<(), ConfigError> {
        if self.disable().is_err() {
            return Err(ConfigError::UnmappedRegister {
                applied: FieldList::new(),
            });
        }
        self.opened = false;
        bring_up.disable_clock().map_err(ConfigError::BringUp)
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    fn wait_status(&mut self, mask: u32) -> Result<(), mmio::Error> {
        let stat = self.channel.channel.stat();
        wait_for_bits(&mut self.regs, &mut self.clock, stat, mask, true, self.timeout)
    }

    /// Send one word, and collect the reply when the channel receives.
    fn transfer_word(&mut self, index: usize, word: u8) -> Result<Option<u8>, Error> {
        let ch = self.channel.channel;
        self.regs.write(ch.tx(), u32::from(word)).map_err(Error::access)?;
        self.wait_status(mask::CHSTAT_TXS)
            .map_err(Error::stalled(Stage::Transmit, index))?;

        if !self.channel.transfer_mode.receives() {
            return Ok(None);
        }

        self.wait_status(mask::CHSTAT_RXS)
            .map_err(Error::stalled(Stage::Receive, index))?;
        let rx = self.regs.read(ch.rx()).map_err(Error::access)?;
        Ok(Some(rx as u8))
    }

    fn end_of_transfer(&mut self, count: usize) -> Result<usize, Error> {
        self.wait_status(mask::CHSTAT_EOT)
            .map_err(Error::stalled(Stage::EndOfTransfer, count))?;
        trace!("moved {} bytes", count);
        Ok(count)
    }

    /// Full-duplex transfer in place.
    ///
    /// Each byte of `buf` is sent, and overwritten with the received byte
    /// when the channel receives. Returns the number of bytes moved.
    pub fn transfer(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        for (i, byte) in buf.iter_mut().enumerate() {
            let rx = self
                .transfer_word(i, *byte)
                .inspect_err(|e| warn!("transfer stalled: {:?}", e))?;
            if let Some(rx) = rx {
                *byte = rx;
            }
        }
        self.end_of_transfer(buf.len())
    }

    /// Send `data`, discarding whatever comes back.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, Error> {
        if data.is_empty() {
            return Ok(0);
        }

        for (i, byte) in data.iter().enumerate() {
            self.transfer_word(i, *byte)?;
        }
        self.end_of_transfer(data.len())
    }

    /// Clock out zeros and store the received bytes.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if !self.channel.transfer_mode.receives() {
            return Err(Error::ReceiveDisabled);
        }
        buf.fill(0);
        self.transfer(buf)
    }

    /// Runs for `max(read.len(), write.len())` bytes. Missing write bytes are
    /// sent as zero, extra received bytes are dropped.
    pub fn transfer_split(&mut self, read: &mut [u8], write: &[u8]) -> Result<usize, Error> {
        if !read.is_empty() && !self.channel.transfer_mode.receives() {
            return Err(Error::ReceiveDisabled);
        }

        let len = read.len().max(write.len());
        if len == 0 {
            return Ok(0);
        }

        for i in 0..len {
            let word = write.get(i).copied().unwrap_or_default();
            if let (Some(rx), Some(slot)) = (self.transfer_word(i, word)?, read.get_mut(i)) {
                *slot = rx;
            }
        }
        self.end_of_transfer(len)
    }
}

/// Tolerant mode swaps an out-of-domain value for `fallback`.
fn tolerate<T>(strict: bool, field: Field, value: u32, fallback: T, report: &mut ApplyReport) -> Result<T, Abort> {
    if strict {
        error!("invalid {:?} {}", field, value);
        return Err(Abort::Invalid(field));
    }
    warn!("invalid {:?} {}, writing the reset value", field, value);
    report.skipped(field);
    Ok(fallback)
}

impl<M, C> embedded_hal::spi::ErrorType for Spi<M, C> {
    type Error = Error;
}

impl<M: Mmio, C: Monotonic> embedded_hal::spi::SpiBus<u8> for Spi<M, C> {
    fn flush(&mut self) -> Result<(), Self::Error> {
        // every operation waits for EOT before returning
        Ok(())
    }

    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        Spi::read(self, words).map(drop)
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        Spi::write(self, words).map(drop)
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.transfer_split(read, write).map(drop)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        if !words.is_empty() && !self.channel.transfer_mode.receives() {
            return Err(Error::ReceiveDisabled);
        }
        Spi::transfer(self, words).map(drop)
    }
}

impl<M: Mmio, C: Monotonic> embedded_hal_nb::spi::FullDuplex<u8> for Spi<M, C> {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        let ch = self.channel.channel;
        let stat: ChStat = self.regs.read_as(ch.stat()).map_err(Error::access)?;
        if !stat.rxs() {
            return Err(nb::Error::WouldBlock);
        }
        let rx = self.regs.read(ch.rx()).map_err(Error::access)?;
        Ok(rx as u8)
    }

    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        let ch = self.channel.channel;
        let stat: ChStat = self.regs.read_as(ch.stat()).map_err(Error::access)?;
        if !stat.txs() {
            return Err(nb::Error::WouldBlock);
        }
        self.regs.write(ch.tx(), u32::from(word)).map_err(Error::access)?;
        Ok(())
    }
}
