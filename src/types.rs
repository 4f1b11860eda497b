use std::fmt;

use crate::hmi::{HmiVector, index};
use crate::{Error, Result};

/// Temperature in device units (tenths of a degree Celsius).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Temperature(i32);

impl Temperature {
    pub fn from_tenths(tenths: i32) -> Self {
        Self(tenths)
    }

    /// Rounds to the nearest tenth.
    pub fn from_celsius(c: f64) -> Self {
        Self((c * 10.0).round() as i32)
    }

    pub fn celsius(&self) -> f64 {
        f64::from(self.0) / 10.0
    }

    pub fn tenths(&self) -> i32 {
        self.0
    }

    /// Saturates at the bounds of the device range instead of wrapping.
    pub fn offset_by(&self, delta_c: f64) -> Self {
        Self(self.0.saturating_add((delta_c * 10.0).round() as i32))
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.celsius())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    Cool,
    Dry,
    Heat,
    Fan,
    Auto,
}

impl OperationMode {
    pub fn as_hmi(&self) -> i32 {
        match self {
            OperationMode::Cool => 1,
            OperationMode::Dry => 2,
            OperationMode::Heat => 3,
            OperationMode::Fan => 4,
            OperationMode::Auto => 5,
        }
    }

    pub fn from_hmi(v: i32) -> Option<Self> {
        match v {
            1 => Some(OperationMode::Cool),
            2 => Some(OperationMode::Dry),
            3 => Some(OperationMode::Heat),
            4 => Some(OperationMode::Fan),
            5 => Some(OperationMode::Auto),
            _ => None,
        }
    }
}

/// Fan speed, 0 (auto) through 6 (highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FanSpeed(u8);

impl FanSpeed {
    pub const AUTO: FanSpeed = FanSpeed(0);
    pub const MAX: u8 = 6;

    pub fn new(speed: u8) -> Result<Self> {
        if speed > Self::MAX {
            return Err(Error::InvalidValue {
                field: "fan speed",
                value: i32::from(speed),
            });
        }
        Ok(Self(speed))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_auto(&self) -> bool {
        self.0 == 0
    }

    fn from_hmi(v: i32) -> Option<Self> {
        u8::try_from(v).ok().and_then(|s| Self::new(s).ok())
    }
}

/// Eco, turbo and night are mutually exclusive on the unit even though the
/// wire format carries them in three separate slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpecialMode {
    #[default]
    None,
    Eco,
    Turbo,
    Night,
}

impl SpecialMode {
    pub(crate) fn from_flags(eco: bool, turbo: bool, night: bool) -> Self {
        match (eco, turbo, night) {
            (true, _, _) => SpecialMode::Eco,
            (_, true, _) => SpecialMode::Turbo,
            (_, _, true) => SpecialMode::Night,
            _ => SpecialMode::None,
        }
    }

    /// `(index, value)` for each of the three wire slots.
    pub(crate) fn hmi_fields(&self) -> [(usize, i32); 3] {
        let flag = |m: SpecialMode| i32::from(*self == m);
        [
            (index::ECO, flag(SpecialMode::Eco)),
            (index::TURBO, flag(SpecialMode::Turbo)),
            (index::NIGHT, flag(SpecialMode::Night)),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Inactive,
    Idle,
    Cooling,
    Heating,
}

/// State reported by the unit, decoded from its HMI string.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub target_temperature: Option<Temperature>,
    pub current_temperature: Option<Temperature>,
    pub power: Option<bool>,
    pub mode: Option<OperationMode>,
    pub fan_speed: Option<FanSpeed>,
    pub special_mode: SpecialMode,
    pub firmware: Option<i32>,
    pub raw: HmiVector,
}

impl DeviceState {
    pub fn from_hmi(hmi: &HmiVector) -> Self {
        let flag = |i| hmi.value(i).map(|v| v == 1);
        Self {
            target_temperature: hmi
                .value(index::TARGET_TEMPERATURE)
                .map(Temperature::from_tenths),
            current_temperature: hmi
                .value(index::CURRENT_TEMPERATURE)
                .map(Temperature::from_tenths),
            power: flag(index::POWER),
            mode: hmi
                .value(index::OPERATION_MODE)
                .and_then(OperationMode::from_hmi),
            fan_speed: hmi.value(index::FAN_SPEED).and_then(FanSpeed::from_hmi),
            special_mode: SpecialMode::from_flags(
                flag(index::ECO).unwrap_or(false),
                flag(index::TURBO).unwrap_or(false),
                flag(index::NIGHT).unwrap_or(false),
            ),
            firmware: hmi.value(index::FIRMWARE),
            raw: hmi.clone(),
        }
    }

    pub fn is_on(&self) -> bool {
        self.power == Some(true)
    }

    pub fn activity(&self) -> Activity {
        if !self.is_on() {
            return Activity::Inactive;
        }
        let (Some(current), Some(target)) = (self.current_temperature, self.target_temperature)
        else {
            return Activity::Idle;
        };
        match self.mode {
            Some(OperationMode::Heat) if current < target => Activity::Heating,
            Some(OperationMode::Heat) => Activity::Idle,
            _ if current > target => Activity::Cooling,
            _ => Activity::Idle,
        }
    }
}

/// Emitted for each field that changed between two consecutive reports.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PowerChanged { on: bool },
    TargetTemperatureChanged { temp: Temperature },
    CurrentTemperatureChanged { temp: Temperature },
    ModeChanged { mode: OperationMode },
    FanSpeedChanged { speed: FanSpeed },
    SpecialModeChanged { mode: SpecialMode },
    FirmwareChanged { revision: i32 },
}
