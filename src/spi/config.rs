//! Channel configuration record
//!
//! [`ChannelConfig`] is the validated form. [`RawChannelConfig`] carries the
//! numeric encodings handed over by a control surface and may hold values
//! outside every field's domain; the applier decides what to do with those.

use super::regs::Channel;

macro_rules! raw_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, PartialEq, Eq, Clone, Copy)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl TryFrom<u32> for $name {
            type Error = u32;

            fn try_from(raw: u32) -> Result<Self, u32> {
                match raw {
                    $($value => Ok(Self::$variant),)+
                    other => Err(other),
                }
            }
        }

        impl From<$name> for u32 {
            #[inline]
            fn from(value: $name) -> u32 {
                value as u32
            }
        }
    };
}

raw_enum! {
    pub enum Role {
        Master = 0,
        Slave = 1,
    }
}

raw_enum! {
    /// Encoded as the word length minus one, which is what CHxCONF.WL holds.
    pub enum WordLength {
        Bits8 = 0x07,
        Bits16 = 0x0F,
        Bits32 = 0x1F,
    }
}

impl WordLength {
    pub const fn bits(self) -> u32 {
        self as u32 + 1
    }
}

raw_enum! {
    pub enum TransferMode {
        TransmitAndReceive = 0,
        ReceiveOnly = 1,
        TransmitOnly = 2,
    }
}

impl TransferMode {
    pub const fn receives(self) -> bool {
        !matches!(self, TransferMode::TransmitOnly)
    }
}

raw_enum! {
    pub enum PinDirection {
        /// Receive on D0, transmit on D1
        D0InD1Out = 0,
        /// Receive on D1, transmit on D0
        D1InD0Out = 1,
    }
}

raw_enum! {
    pub enum ChipSelectPolarity {
        ActiveLow = 0,
        ActiveHigh = 1,
    }
}

raw_enum! {
    pub enum ChipSelectSensitivity {
        /// Chip select left static
        Disabled = 0,
        /// Chip select asserted for every word
        Enabled = 1,
    }
}

raw_enum! {
    /// Functional clock divider, CHxCONF.CLKD
    pub enum ClockDivider {
        Div1 = 0,
        Div2 = 1,
        Div4 = 2,
        Div8 = 3,
        Div16 = 4,
        Div32 = 5,
        Div64 = 6,
        Div128 = 7,
        Div256 = 8,
        Div512 = 9,
        Div1024 = 10,
        Div2048 = 11,
        Div4096 = 12,
        Div8192 = 13,
        Div16384 = 14,
        Div32768 = 15,
    }
}

impl ClockDivider {
    pub const ALL: [ClockDivider; 16] = [
        ClockDivider::Div1,
        ClockDivider::Div2,
        ClockDivider::Div4,
        ClockDivider::Div8,
        ClockDivider::Div16,
        ClockDivider::Div32,
        ClockDivider::Div64,
        ClockDivider::Div128,
        ClockDivider::Div256,
        ClockDivider::Div512,
        ClockDivider::Div1024,
        ClockDivider::Div2048,
        ClockDivider::Div4096,
        ClockDivider::Div8192,
        ClockDivider::Div16384,
        ClockDivider::Div32768,
    ];

    /// The actual ratio, `2^code`.
    pub const fn value(self) -> u32 {
        1 << self as u32
    }
}

raw_enum! {
    pub enum Phase {
        /// Data latched on odd-numbered edges
        Odd = 0,
        /// Data latched on even-numbered edges
        Even = 1,
    }
}

raw_enum! {
    pub enum Polarity {
        /// Clock idles low
        ActiveHigh = 0,
        /// Clock idles high
        ActiveLow = 1,
    }
}

/// Names one field of a channel configuration.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    Channel,
    Role,
    TransferMode,
    ClockDivider,
    WordLength,
    ChipSelectPolarity,
    ChipSelectSensitivity,
    PinDirection,
    Phase,
    Polarity,
}

impl Field {
    pub const COUNT: usize = 10;
}

#[non_exhaustive]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    pub channel: Channel,
    pub role: Role,
    pub transfer_mode: TransferMode,
    pub clock_divider: ClockDivider,
    pub word_length: WordLength,
    pub cs_polarity: ChipSelectPolarity,
    pub cs_sensitivity: ChipSelectSensitivity,
    pub pin_direction: PinDirection,
    pub phase: Phase,
    pub polarity: Polarity,
}

impl Default for ChannelConfig {
    /// Channel 0 master, 8-bit words, transmit only, SPI mode 0, clock / 2
    fn default() -> Self {
        Self {
            channel: Channel::Ch0,
            role: Role::Master,
            transfer_mode: TransferMode::TransmitOnly,
            clock_divider: ClockDivider::Div2,
            word_length: WordLength::Bits8,
            cs_polarity: ChipSelectPolarity::ActiveLow,
            cs_sensitivity: ChipSelectSensitivity::Enabled,
            pin_direction: PinDirection::D0InD1Out,
            phase: Phase::Odd,
            polarity: Polarity::ActiveHigh,
        }
    }
}

impl ChannelConfig {
    /// What a channel holds right after a soft reset, with the registers
    /// cleared. CHxCONF.WL resets to a reserved encoding and is reported as
    /// 8-bit words; the applier always rewrites it.
    pub const fn after_reset(channel: Channel) -> Self {
        Self {
            channel,
            role: Role::Master,
            transfer_mode: TransferMode::TransmitAndReceive,
            clock_divider: ClockDivider::Div1,
            word_length: WordLength::Bits8,
            cs_polarity: ChipSelectPolarity::ActiveHigh,
            cs_sensitivity: ChipSelectSensitivity::Enabled,
            pin_direction: PinDirection::D0InD1Out,
            phase: Phase::Odd,
            polarity: Polarity::ActiveHigh,
        }
    }
}

/// Unvalidated configuration, one integer per field.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawChannelConfig {
    pub channel: u8,
    pub role: u32,
    pub transfer_mode: u32,
    pub clock_divider: u32,
    pub word_length: u32,
    pub cs_polarity: u32,
    pub cs_sensitivity: u32,
    pub pin_direction: u32,
    pub phase: u32,
    pub polarity: u32,
}

impl Default for RawChannelConfig {
    fn default() -> Self {
        ChannelConfig::default().into()
    }
}

impl From<ChannelConfig> for RawChannelConfig {
    fn from(c: ChannelConfig) -> Self {
        Self {
            channel: c.channel.index(),
            role: c.role.into(),
            transfer_mode: c.transfer_mode.into(),
            clock_divider: c.clock_divider.into(),
            word_length: c.word_length.into(),
            cs_polarity: c.cs_polarity.into(),
            cs_sensitivity: c.cs_sensitivity.into(),
            pin_direction: c.pin_direction.into(),
            phase: c.phase.into(),
            polarity: c.polarity.into(),
        }
    }
}

impl TryFrom<&RawChannelConfig> for ChannelConfig {
    /// The first invalid field, in application order.
    type Error = Field;

    fn try_from(raw: &RawChannelConfig) -> Result<Self, Field> {
        fn field<T: TryFrom<u32>>(raw: u32, field: Field) -> Result<T, Field> {
            T::try_from(raw).map_err(|_| field)
        }

        let channel = Channel::from_index(raw.channel).ok_or(Field::Channel)?;
        Ok(Self {
            channel,
            role: field(raw.role, Field::Role)?,
            transfer_mode: field(raw.transfer_mode, Field::TransferMode)?,
            clock_divider: field(raw.clock_divider, Field::ClockDivider)?,
            word_length: field(raw.word_length, Field::WordLength)?,
            cs_polarity: field(raw.cs_polarity, Field::ChipSelectPolarity)?,
            cs_sensitivity: field(raw.cs_sensitivity, Field::ChipSelectSensitivity)?,
            pin_direction: field(raw.pin_direction, Field::PinDirection)?,
            phase: field(raw.phase, Field::Phase)?,
            polarity: field(raw.polarity, Field::Polarity)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dividers_are_powers_of_two() {
        for (code, div) in ClockDivider::ALL.iter().enumerate() {
            assert_eq!(u32::from(*div), code as u32);
            assert_eq!(div.value(), 1 << code);
        }
        assert_eq!(ClockDivider::Div32768.value(), 32768);
        assert_eq!(ClockDivider::try_from(16), Err(16));
    }

    #[test]
    fn word_length_encoding() {
        assert_eq!(WordLength::try_from(0x0F), Ok(WordLength::Bits16));
        assert_eq!(WordLength::Bits32.bits(), 32);
        assert_eq!(WordLength::try_from(8), Err(8));
    }

    #[test]
    fn default_round_trips_through_raw() {
        let raw = RawChannelConfig::default();
        assert_eq!(raw.transfer_mode, 2);
        assert_eq!(raw.clock_divider, 1);
        assert_eq!(ChannelConfig::try_from(&raw), Ok(ChannelConfig::default()));
    }

    #[test]
    fn first_invalid_field_wins() {
        let raw = RawChannelConfig {
            word_length: 3,
            phase: 9,
            ..Default::default()
        };
        assert_eq!(ChannelConfig::try_from(&raw), Err(Field::WordLength));

        let raw = RawChannelConfig {
            channel: 4,
            role: 7,
            ..Default::default()
        };
        assert_eq!(ChannelConfig::try_from(&raw), Err(Field::Channel));
    }

    #[test]
    fn receive_capable_modes() {
        assert!(TransferMode::TransmitAndReceive.receives());
        assert!(TransferMode::ReceiveOnly.receives());
        assert!(!TransferMode::TransmitOnly.receives());
    }
}
