//! Numbered control requests
//!
//! Mirrors the character device command set: type `'k'`, numbers 1 to 14,
//! odd numbers store a setting and even numbers read it back. A store
//! re-applies the whole channel configuration and re-enables the channel.

use crate::mmio::Mmio;
use crate::spi::{
    ChannelConfig, ChipSelectSensitivity, ClockDivider, ConfigError, Field, PinDirection, Phase, Polarity,
    RawChannelConfig, Role, Spi, TransferMode,
};
use crate::time::Monotonic;

/// Request type byte
pub const MAGIC: u8 = b'k';
/// Upper bound of the command numbering, never a request itself
pub const MAX_REQUEST: u8 = 15;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Setting {
    Role,
    Polarity,
    Phase,
    PinDirection,
    ClockDivider,
    ChipSelect,
    TransferMode,
}

impl Setting {
    const ORDER: [Setting; 7] = [
        Setting::Role,
        Setting::Polarity,
        Setting::Phase,
        Setting::PinDirection,
        Setting::ClockDivider,
        Setting::ChipSelect,
        Setting::TransferMode,
    ];

    pub const fn field(self) -> Field {
        match self {
            Setting::Role => Field::Role,
            Setting::Polarity => Field::Polarity,
            Setting::Phase => Field::Phase,
            Setting::PinDirection => Field::PinDirection,
            Setting::ClockDivider => Field::ClockDivider,
            Setting::ChipSelect => Field::ChipSelectSensitivity,
            Setting::TransferMode => Field::TransferMode,
        }
    }

    fn get(self, config: &ChannelConfig) -> u32 {
        match self {
            Setting::Role => config.role.into(),
            Setting::Polarity => config.polarity.into(),
            Setting::Phase => config.phase.into(),
            Setting::PinDirection => config.pin_direction.into(),
            Setting::ClockDivider => config.clock_divider.into(),
            Setting::ChipSelect => config.cs_sensitivity.into(),
            Setting::TransferMode => config.transfer_mode.into(),
        }
    }

    /// Store `value` into `raw` if it is in the setting's domain.
    fn set(self, raw: &mut RawChannelConfig, value: u32) -> Result<(), RequestError> {
        fn check<T: TryFrom<u32>>(value: u32, setting: Setting) -> Result<u32, RequestError> {
            T::try_from(value)
                .map(|_| value)
                .map_err(|_| RequestError::InvalidArgument(setting.field()))
        }

        match self {
            Setting::Role => raw.role = check::<Role>(value, self)?,
            Setting::Polarity => raw.polarity = check::<Polarity>(value, self)?,
            Setting::Phase => raw.phase = check::<Phase>(value, self)?,
            Setting::PinDirection => raw.pin_direction = check::<PinDirection>(value, self)?,
            Setting::ClockDivider => raw.clock_divider = check::<ClockDivider>(value, self)?,
            Setting::ChipSelect => raw.cs_sensitivity = check::<ChipSelectSensitivity>(value, self)?,
            Setting::TransferMode => raw.transfer_mode = check::<TransferMode>(value, self)?,
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    Set(Setting, u32),
    Get(Setting),
}

impl Request {
    /// Decode a request number and its argument. The argument is ignored for
    /// reads.
    pub fn decode(number: u8, arg: u32) -> Result<Self, RequestError> {
        if number == 0 || number > MAX_REQUEST {
            return Err(RequestError::UnknownRequest(number));
        }
        let setting = Setting::ORDER
            .get(usize::from((number - 1) / 2))
            .copied()
            .ok_or(RequestError::UnknownRequest(number))?;

        if number % 2 == 1 {
            Ok(Request::Set(setting, arg))
        } else {
            Ok(Request::Get(setting))
        }
    }

    pub fn number(&self) -> u8 {
        let (setting, base) = match *self {
            Request::Set(s, _) => (s, 1),
            Request::Get(s) => (s, 2),
        };
        let index = Setting::ORDER.iter().position(|s| *s == setting).unwrap_or(0) as u8;
        index * 2 + base
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    Done,
    Value(u32),
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestError {
    UnknownRequest(u8),
    /// Argument outside the setting's domain, nothing was changed
    InvalidArgument(Field),
    /// Reconfiguration failed
    Config(ConfigError),
    UnmappedRegister,
}

impl From<ConfigError> for RequestError {
    fn from(e: ConfigError) -> Self {
        RequestError::Config(e)
    }
}

impl<M: Mmio, C: Monotonic> Spi<M, C> {
    /// Serve one request against the active channel configuration.
    pub fn handle(&mut self, request: Request) -> Result<Response, RequestError> {
        match request {
            Request::Get(setting) => {
                let value = setting.get(self.channel_config());
                debug!("get {:?} = {}", setting, value);
                Ok(Response::Value(value))
            }
            Request::Set(setting, value) => {
                let mut raw = RawChannelConfig::from(*self.channel_config());
                setting.set(&mut raw, value).inspect_err(|_| {
                    warn!("rejected {:?} = {}", setting, value);
                })?;

                self.apply_configuration(&raw)?;
                self.enable().map_err(|_| RequestError::UnmappedRegister)?;
                debug!("set {:?} = {}", setting, value);
                Ok(Response::Done)
            }
        }
    }

    /// Decode and serve a numbered request.
    pub fn handle_raw(&mut self, number: u8, arg: u32) -> Result<Response, RequestError> {
        self.handle(Request::decode(number, arg)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering() {
        assert_eq!(Request::decode(1, 1), Ok(Request::Set(Setting::Role, 1)));
        assert_eq!(Request::decode(4, 99), Ok(Request::Get(Setting::Polarity)));
        assert_eq!(Request::decode(9, 4), Ok(Request::Set(Setting::ClockDivider, 4)));
        assert_eq!(Request::decode(12, 0), Ok(Request::Get(Setting::ChipSelect)));
        assert_eq!(Request::decode(14, 0), Ok(Request::Get(Setting::TransferMode)));
        assert_eq!(Request::decode(0, 0), Err(RequestError::UnknownRequest(0)));
        assert_eq!(Request::decode(15, 0), Err(RequestError::UnknownRequest(15)));
        assert_eq!(Request::decode(16, 0), Err(RequestError::UnknownRequest(16)));

        for n in 1..=14 {
            assert_eq!(Request::decode(n, 0).unwrap().number(), n);
        }
    }

    #[test]
    fn set_checks_the_domain() {
        let mut raw = RawChannelConfig::default();
        assert_eq!(
            Setting::ClockDivider.set(&mut raw, 16),
            Err(RequestError::InvalidArgument(Field::ClockDivider))
        );
        assert_eq!(raw, RawChannelConfig::default());

        Setting::Polarity.set(&mut raw, 1).unwrap();
        assert_eq!(raw.polarity, 1);
    }
}
