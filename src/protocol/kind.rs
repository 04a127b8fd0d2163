//! Data kinds carried by the `typeCode` byte.

use std::fmt;

/// How a kind's payload bytes are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueEncoding {
    /// UTF-8 text.
    Text,
    /// Signed big-endian 16-bit integer.
    Int16,
    /// Two signed bytes: whole part, then hundredths.
    Decimal,
    /// Opaque bytes (unknown kinds).
    Raw,
}

/// Semantic kind of a frame, derived from its type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Immobilize,
    RpmPreset,
    Gps,
    BusCurrent,
    BusVoltage,
    Rpm,
    DeviceTemperature,
    NetworkStrength,
    Torque,
    Soc,
    Throttle,
    MotorTemperature,
    /// Any code outside the table. Carries the code so it can be echoed back.
    Unknown(u8),
}

impl DataKind {
    /// All known kinds, in type code order.
    pub const KNOWN: [DataKind; 12] = [
        DataKind::Immobilize,
        DataKind::RpmPreset,
        DataKind::Gps,
        DataKind::BusCurrent,
        DataKind::BusVoltage,
        DataKind::Rpm,
        DataKind::DeviceTemperature,
        DataKind::NetworkStrength,
        DataKind::Torque,
        DataKind::Soc,
        DataKind::Throttle,
        DataKind::MotorTemperature,
    ];

    /// Map a type code to its kind. Never fails.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Immobilize,
            2 => Self::RpmPreset,
            3 => Self::Gps,
            4 => Self::BusCurrent,
            5 => Self::BusVoltage,
            6 => Self::Rpm,
            7 => Self::DeviceTemperature,
            8 => Self::NetworkStrength,
            9 => Self::Torque,
            10 => Self::Soc,
            11 => Self::Throttle,
            12 => Self::MotorTemperature,
            other => Self::Unknown(other),
        }
    }

    /// The wire type code.
    pub fn code(self) -> u8 {
        match self {
            Self::Immobilize => 1,
            Self::RpmPreset => 2,
            Self::Gps => 3,
            Self::BusCurrent => 4,
            Self::BusVoltage => 5,
            Self::Rpm => 6,
            Self::DeviceTemperature => 7,
            Self::NetworkStrength => 8,
            Self::Torque => 9,
            Self::Soc => 10,
            Self::Throttle => 11,
            Self::MotorTemperature => 12,
            Self::Unknown(code) => code,
        }
    }

    /// Name as it appears on the operator console and in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Immobilize => "immobilize",
            Self::RpmPreset => "rpmPreset",
            Self::Gps => "gps",
            Self::BusCurrent => "busCurrent",
            Self::BusVoltage => "busVoltage",
            Self::Rpm => "rpm",
            Self::DeviceTemperature => "deviceTemperature",
            Self::NetworkStrength => "networkStrength",
            Self::Torque => "torque",
            Self::Soc => "SOC",
            Self::Throttle => "throttle",
            Self::MotorTemperature => "motorTemperature",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Payload convention for this kind, used in both directions.
    pub fn encoding(self) -> ValueEncoding {
        match self {
            Self::Gps => ValueEncoding::Text,
            Self::BusCurrent | Self::BusVoltage | Self::Soc | Self::Throttle => {
                ValueEncoding::Decimal
            }
            Self::Immobilize
            | Self::RpmPreset
            | Self::Rpm
            | Self::DeviceTemperature
            | Self::NetworkStrength
            | Self::Torque
            | Self::MotorTemperature => ValueEncoding::Int16,
            Self::Unknown(_) => ValueEncoding::Raw,
        }
    }

    /// Whether the operator console may send this kind.
    ///
    /// Immobilize and RPM preset are device-bound commands; the console only
    /// observes them.
    pub fn is_sendable(self) -> bool {
        matches!(self.code(), 3..=12) && !self.is_unknown()
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown(_))
    }

    /// Kinds the operator console offers.
    pub fn sendable() -> impl Iterator<Item = DataKind> {
        Self::KNOWN.into_iter().filter(|k| k.is_sendable())
    }
}

impl fmt::Display for ValueEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueEncoding::Text => write!(f, "text"),
            ValueEncoding::Int16 => write!(f, "int16"),
            ValueEncoding::Decimal => write!(f, "whole.hundredths"),
            ValueEncoding::Raw => write!(f, "raw"),
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<u8> for DataKind {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}
