//! Typed payload values.
//!
//! The representation is chosen by the caller (or by the kind's
//! [`ValueEncoding`]) before a frame is built; the codec itself only sees bytes.

use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder};

use super::kind::{DataKind, ValueEncoding};
use super::MAX_PAYLOAD_SIZE;
use crate::error::InputError;

/// Fixed-point value sent as two signed bytes: whole part, then hundredths.
///
/// Both parts carry the sign of the value, so `-0.25` is `(0, -25)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decimal {
    whole: i8,
    hundredths: i8,
}

impl Decimal {
    /// Create a decimal, rejecting mixed signs and hundredths outside ±99.
    pub fn new(whole: i8, hundredths: i8) -> Option<Self> {
        if !(-99..=99).contains(&hundredths) {
            return None;
        }
        if (whole > 0 && hundredths < 0) || (whole < 0 && hundredths > 0) {
            return None;
        }
        Some(Self { whole, hundredths })
    }

    pub fn whole(self) -> i8 {
        self.whole
    }

    pub fn hundredths(self) -> i8 {
        self.hundredths
    }

    pub fn to_f64(self) -> f64 {
        f64::from(self.whole) + f64::from(self.hundredths) / 100.0
    }

    pub fn to_bytes(self) -> [u8; 2] {
        [self.whole as u8, self.hundredths as u8]
    }

    pub fn from_bytes(bytes: [u8; 2]) -> Option<Self> {
        Self::new(bytes[0] as i8, bytes[1] as i8)
    }

    fn is_negative(self) -> bool {
        self.whole < 0 || self.hundredths < 0
    }
}

/// Reasons a decimal string is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecimalParseError {
    /// Not of the form `[-]whole[.fraction]`.
    Malformed,
    /// More than two fractional digits.
    TooPrecise,
    /// Whole part outside -128..=127.
    OutOfRange,
}

impl fmt::Display for DecimalParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => f.write_str("expected a number like 12.5"),
            Self::TooPrecise => f.write_str("at most two decimal places"),
            Self::OutOfRange => f.write_str("whole part must be within -128..=127"),
        }
    }
}

impl FromStr for Decimal {
    type Err = DecimalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (whole_str, frac_str) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole_str.is_empty() && frac_str.is_empty()
            || !all_digits(whole_str)
            || !all_digits(frac_str)
        {
            return Err(DecimalParseError::Malformed);
        }
        if frac_str.len() > 2 {
            return Err(DecimalParseError::TooPrecise);
        }

        let magnitude: i16 = if whole_str.is_empty() {
            0
        } else {
            whole_str
                .parse()
                .map_err(|_| DecimalParseError::OutOfRange)?
        };
        let mut hundredths: i16 = match frac_str.len() {
            0 => 0,
            1 => frac_str.parse::<i16>().map_err(|_| DecimalParseError::Malformed)? * 10,
            _ => frac_str.parse::<i16>().map_err(|_| DecimalParseError::Malformed)?,
        };

        let whole = if negative { -magnitude } else { magnitude };
        if negative {
            hundredths = -hundredths;
        }

        let whole = i8::try_from(whole).map_err(|_| DecimalParseError::OutOfRange)?;
        Decimal::new(whole, hundredths as i8).ok_or(DecimalParseError::Malformed)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        write!(
            f,
            "{sign}{}.{:02}",
            self.whole.unsigned_abs(),
            self.hundredths.unsigned_abs()
        )
    }
}

/// A payload value, tagged by representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Integer(i16),
    Decimal(Decimal),
    Raw(Vec<u8>),
}

impl Value {
    /// Parse operator input for `kind` using the kind's encoding.
    pub fn parse(kind: DataKind, input: &str) -> Result<Self, InputError> {
        match kind.encoding() {
            ValueEncoding::Text => {
                if input.len() > MAX_PAYLOAD_SIZE {
                    return Err(InputError::InvalidValue {
                        kind,
                        reason: format!("longer than {MAX_PAYLOAD_SIZE} bytes"),
                    });
                }
                Ok(Self::Text(input.to_string()))
            }
            ValueEncoding::Int16 => {
                let trimmed = input.trim();
                let wide: i64 = trimmed.parse().map_err(|_| InputError::InvalidValue {
                    kind,
                    reason: format!("'{trimmed}' is not an integer"),
                })?;
                let value = i16::try_from(wide).map_err(|_| InputError::OutOfRange {
                    kind,
                    value: trimmed.to_string(),
                })?;
                Ok(Self::Integer(value))
            }
            ValueEncoding::Decimal => {
                let trimmed = input.trim();
                trimmed
                    .parse::<Decimal>()
                    .map(Self::Decimal)
                    .map_err(|e| match e {
                        DecimalParseError::OutOfRange => InputError::OutOfRange {
                            kind,
                            value: trimmed.to_string(),
                        },
                        other => InputError::InvalidValue {
                            kind,
                            reason: other.to_string(),
                        },
                    })
            }
            ValueEncoding::Raw => {
                let bytes = hex::decode(input.trim()).map_err(|e| InputError::InvalidValue {
                    kind,
                    reason: format!("expected hex bytes: {e}"),
                })?;
                if bytes.len() > MAX_PAYLOAD_SIZE {
                    return Err(InputError::InvalidValue {
                        kind,
                        reason: format!("longer than {MAX_PAYLOAD_SIZE} bytes"),
                    });
                }
                Ok(Self::Raw(bytes))
            }
        }
    }

    /// Interpret payload bytes using `kind`'s encoding.
    ///
    /// Bytes that do not fit the convention come back as [`Value::Raw`].
    pub fn from_payload(kind: DataKind, payload: &[u8]) -> Self {
        match kind.encoding() {
            ValueEncoding::Text => match std::str::from_utf8(payload) {
                Ok(text) => Self::Text(text.to_string()),
                Err(_) => Self::Raw(payload.to_vec()),
            },
            ValueEncoding::Int16 if payload.len() == 2 => {
                Self::Integer(BigEndian::read_i16(payload))
            }
            ValueEncoding::Decimal if payload.len() == 2 => {
                match Decimal::from_bytes([payload[0], payload[1]]) {
                    Some(d) => Self::Decimal(d),
                    None => Self::Raw(payload.to_vec()),
                }
            }
            _ => Self::Raw(payload.to_vec()),
        }
    }

    /// Raw payload bytes for this value.
    pub fn to_payload(&self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.as_bytes().to_vec(),
            Self::Integer(n) => n.to_be_bytes().to_vec(),
            Self::Decimal(d) => d.to_bytes().to_vec(),
            Self::Raw(bytes) => bytes.clone(),
        }
    }

    /// Numeric view, if the value has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(f64::from(*n)),
            Self::Decimal(d) => Some(d.to_f64()),
            Self::Text(_) | Self::Raw(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Raw(bytes) => write!(f, "0x{}", hex::encode(bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_parse() {
        assert_eq!("12.5".parse::<Decimal>().unwrap().to_bytes(), [12, 50]);
        assert_eq!("12.05".parse::<Decimal>().unwrap().to_bytes(), [12, 5]);
        assert_eq!("90".parse::<Decimal>().unwrap().to_bytes(), [90, 0]);
        assert_eq!("12.".parse::<Decimal>().unwrap().to_bytes(), [12, 0]);
        assert_eq!(".75".parse::<Decimal>().unwrap().to_bytes(), [0, 75]);

        let neg = "-0.25".parse::<Decimal>().unwrap();
        assert_eq!(neg.whole(), 0);
        assert_eq!(neg.hundredths(), -25);
        assert_eq!(neg.to_bytes(), [0, (-25i8) as u8]);

        let neg = "-12.34".parse::<Decimal>().unwrap();
        assert_eq!((neg.whole(), neg.hundredths()), (-12, -34));
    }

    #[test]
    fn test_decimal_parse_errors() {
        assert_eq!("12.345".parse::<Decimal>(), Err(DecimalParseError::TooPrecise));
        assert_eq!("abc".parse::<Decimal>(), Err(DecimalParseError::Malformed));
        assert_eq!("1.2.3".parse::<Decimal>(), Err(DecimalParseError::Malformed));
        assert_eq!("".parse::<Decimal>(), Err(DecimalParseError::Malformed));
        assert_eq!("-".parse::<Decimal>(), Err(DecimalParseError::Malformed));
        assert_eq!("128.0".parse::<Decimal>(), Err(DecimalParseError::OutOfRange));
        assert!("-128.99".parse::<Decimal>().is_ok());
    }

    #[test]
    fn test_decimal_display() {
        assert_eq!("12.5".parse::<Decimal>().unwrap().to_string(), "12.50");
        assert_eq!("-0.25".parse::<Decimal>().unwrap().to_string(), "-0.25");
        assert_eq!(Decimal::new(0, 90).unwrap().to_string(), "0.90");
    }

    #[test]
    fn test_decimal_rejects_mixed_sign() {
        assert!(Decimal::new(5, -20).is_none());
        assert!(Decimal::new(-5, 20).is_none());
        assert!(Decimal::new(0, 100).is_none());
        assert!(Decimal::from_bytes([5, 150]).is_none());
    }

    #[test]
    fn test_value_parse_per_kind() {
        assert_eq!(
            Value::parse(DataKind::Gps, "12.9,77.6").unwrap(),
            Value::Text("12.9,77.6".into())
        );
        assert_eq!(
            Value::parse(DataKind::Rpm, " 1500 ").unwrap(),
            Value::Integer(1500)
        );
        assert_eq!(
            Value::parse(DataKind::BusVoltage, "48.25").unwrap().to_payload(),
            vec![48, 25]
        );
        assert_eq!(
            Value::parse(DataKind::Unknown(99), "dead").unwrap(),
            Value::Raw(vec![0xde, 0xad])
        );
    }

    #[test]
    fn test_value_parse_errors() {
        assert!(matches!(
            Value::parse(DataKind::Rpm, "fast"),
            Err(InputError::InvalidValue { .. })
        ));
        assert!(matches!(
            Value::parse(DataKind::Rpm, "40000"),
            Err(InputError::OutOfRange { .. })
        ));
        assert!(matches!(
            Value::parse(DataKind::Soc, "300.5"),
            Err(InputError::OutOfRange { .. })
        ));
        assert!(matches!(
            Value::parse(DataKind::Gps, &"x".repeat(256)),
            Err(InputError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_value_from_payload() {
        assert_eq!(
            Value::from_payload(DataKind::BusVoltage, &[0x00, 0x5A]),
            Value::Decimal(Decimal::new(0, 90).unwrap())
        );
        assert_eq!(
            Value::from_payload(DataKind::Rpm, &[0xFF, 0x38]),
            Value::Integer(-200)
        );
        // Wrong width falls back to raw bytes
        assert_eq!(
            Value::from_payload(DataKind::Rpm, &[0x01]),
            Value::Raw(vec![0x01])
        );
        assert_eq!(
            Value::from_payload(DataKind::Gps, &[0xff, 0xfe]),
            Value::Raw(vec![0xff, 0xfe])
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Integer(-7).to_string(), "-7");
        assert_eq!(Value::Raw(vec![0xab, 0x01]).to_string(), "0xab01");
        assert_eq!(Value::Decimal(Decimal::new(3, 50).unwrap()).as_f64(), Some(3.5));
    }
}
