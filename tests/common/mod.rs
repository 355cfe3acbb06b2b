#![allow(dead_code)]

use mcspi_hal::mmio::{self, Mmio};
use mcspi_hal::spi::regs::{Channel, MODULCTRL, SYSCONFIG, SYSSTATUS};
use mcspi_hal::time::{Instant, Monotonic};

const WINDOW: usize = 0x1000;

const RXS: u32 = 1 << 0;
const TXS: u32 = 1 << 1;
const EOT: u32 = 1 << 2;

/// Register-level model of one McSPI module.
///
/// Soft reset clears the register file and raises RESETDONE. A write to a
/// channel's TX register raises TXS, places `echo(word)` in RX with RXS set,
/// and raises EOT. Each step can be stalled.
pub struct SimPeripheral {
    regs: Vec<u32>,
    /// Accesses at or past this offset are unmapped
    pub window: usize,
    pub writes: Vec<(usize, u32)>,
    pub sent: Vec<(Channel, u8)>,
    pub echo: fn(u8) -> u8,
    /// TXS stops rising once this many words were accepted
    pub tx_limit: Option<usize>,
    pub stall_rx: bool,
    pub stall_eot: bool,
    pub reset_stuck: bool,
}

impl Default for SimPeripheral {
    fn default() -> Self {
        Self {
            regs: vec![0; WINDOW / 4],
            window: WINDOW,
            writes: Vec::new(),
            sent: Vec::new(),
            echo: |b| b,
            tx_limit: None,
            stall_rx: false,
            stall_eot: false,
            reset_stuck: false,
        }
    }
}

impl SimPeripheral {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model whose mapping ends at `bytes`.
    pub fn with_window(bytes: usize) -> Self {
        Self {
            window: bytes.min(WINDOW),
            ..Self::default()
        }
    }

    pub fn peek(&self, offset: usize) -> u32 {
        self.regs[offset / 4]
    }

    pub fn poke(&mut self, offset: usize, value: u32) {
        self.regs[offset / 4] = value;
    }

    /// Offsets written, in order.
    pub fn written_offsets(&self) -> Vec<usize> {
        self.writes.iter().map(|(o, _)| *o).collect()
    }

    fn tx_channel(offset: usize) -> Option<Channel> {
        Channel::ALL.into_iter().find(|ch| ch.tx() == offset)
    }

    fn rx_channel(offset: usize) -> Option<Channel> {
        Channel::ALL.into_iter().find(|ch| ch.rx() == offset)
    }

    fn soft_reset(&mut self) {
        self.regs.iter_mut().for_each(|r| *r = 0);
        if !self.reset_stuck {
            self.regs[SYSSTATUS / 4] = 1;
        }
    }

    fn accept(&mut self, ch: Channel, word: u8) {
        let stat = ch.stat() / 4;
        self.regs[stat] &= !(TXS | EOT);

        if self.tx_limit.is_some_and(|limit| self.sent.len() >= limit) {
            return;
        }
        self.sent.push((ch, word));
        self.regs[stat] |= TXS;

        if !self.stall_rx {
            self.regs[ch.rx() / 4] = u32::from((self.echo)(word));
            self.regs[stat] |= RXS;
        }
        if !self.stall_eot {
            self.regs[stat] |= EOT;
        }
    }
}

impl Mmio for SimPeripheral {
    fn read(&mut self, offset: usize) -> Result<u32, mmio::Error> {
        if offset % 4 != 0 || offset >= self.window {
            return Err(mmio::Error::Unmapped);
        }
        let value = self.regs[offset / 4];
        if let Some(ch) = Self::rx_channel(offset) {
            self.regs[ch.stat() / 4] &= !RXS;
        }
        Ok(value)
    }

    fn write(&mut self, offset: usize, value: u32) -> Result<(), mmio::Error> {
        if offset % 4 != 0 || offset >= self.window {
            return Err(mmio::Error::Unmapped);
        }
        self.writes.push((offset, value));

        if offset == SYSCONFIG && value & 0b10 != 0 {
            self.soft_reset();
            return Ok(());
        }
        if let Some(ch) = Self::tx_channel(offset) {
            self.accept(ch, value as u8);
            return Ok(());
        }
        self.regs[offset / 4] = value;
        Ok(())
    }
}

/// Clock that only moves when the driver relaxes.
pub struct MockClock {
    pub now_us: u64,
    pub step_us: u64,
    pub relaxed: usize,
}

impl MockClock {
    pub fn new(step_us: u64) -> Self {
        Self {
            now_us: 0,
            step_us,
            relaxed: 0,
        }
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Monotonic for MockClock {
    fn now(&mut self) -> Instant {
        Instant::from_ticks(self.now_us)
    }

    fn relax(&mut self) {
        self.now_us += self.step_us;
        self.relaxed += 1;
    }
}

pub fn modulctrl(sim: &SimPeripheral) -> u32 {
    sim.peek(MODULCTRL)
}
