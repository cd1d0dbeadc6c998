//! Unit-bearing configuration values: memory sizes and durations.
//!
//! Sizes are written like `32GiB`, durations like `3600s` or `1h`. Both
//! serialize back into a form that parses to the same value.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::UnitError;

const BINARY_UNITS: [(&str, u32); 4] = [("TiB", 40), ("GiB", 30), ("MiB", 20), ("KiB", 10)];

/// A memory size in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub const fn bytes(n: u64) -> Self {
        Self(n)
    }

    pub const fn kib(n: u64) -> Self {
        Self(n << 10)
    }

    pub const fn mib(n: u64) -> Self {
        Self(n << 20)
    }

    pub const fn gib(n: u64) -> Self {
        Self(n << 30)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        for (unit, shift) in BINARY_UNITS {
            let scale = 1u64 << shift;
            if n != 0 && n % scale == 0 {
                return write!(f, "{}{}", n / scale, unit);
            }
        }
        write!(f, "{n}B")
    }
}

impl FromStr for ByteSize {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| UnitError::InvalidSize {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let input = s.trim();
        let split = input
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(input.len());
        let (number, unit) = input.split_at(split);
        if number.is_empty() {
            return Err(err("missing number"));
        }

        let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kib" => 1 << 10,
            "m" | "mib" => 1 << 20,
            "g" | "gib" => 1 << 30,
            "t" | "tib" => 1 << 40,
            "kb" => 1_000,
            "mb" => 1_000_000,
            "gb" => 1_000_000_000,
            "tb" => 1_000_000_000_000,
            _ => return Err(err("unknown unit")),
        };

        if number.contains('.') {
            let value: f64 = number.parse().map_err(|_| err("malformed number"))?;
            let bytes = value * multiplier as f64;
            if !bytes.is_finite() || bytes > u64::MAX as f64 {
                return Err(err("out of range"));
            }
            Ok(ByteSize(bytes.round() as u64))
        } else {
            let value: u64 = number.parse().map_err(|_| err("malformed number"))?;
            value
                .checked_mul(multiplier)
                .map(ByteSize)
                .ok_or_else(|| err("out of range"))
        }
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ByteSizeVisitor;

        impl Visitor<'_> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a memory size such as `32GiB`, or a byte count")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ByteSize, E> {
                Ok(ByteSize(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ByteSize, E> {
                u64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom("memory size must not be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ByteSize, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

/// Parse a duration such as `60s`, `1h` or `1m 30s`.
pub fn parse_duration(s: &str) -> Result<Duration, UnitError> {
    humantime::parse_duration(s.trim()).map_err(|e| UnitError::InvalidDuration {
        input: s.to_string(),
        reason: e.to_string(),
    })
}

/// Format a duration in the grammar accepted by [`parse_duration`].
pub fn format_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }
    humantime::format_duration(d).to_string()
}

/// Serde adapter for `Duration` fields written as human-readable strings.
pub mod duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binary_units() {
        assert_eq!("32GiB".parse::<ByteSize>().unwrap(), ByteSize::gib(32));
        assert_eq!("512MiB".parse::<ByteSize>().unwrap(), ByteSize::mib(512));
        assert_eq!("1KiB".parse::<ByteSize>().unwrap(), ByteSize(1024));
        assert_eq!("7".parse::<ByteSize>().unwrap(), ByteSize(7));
        assert_eq!("1 gib".parse::<ByteSize>().unwrap(), ByteSize::gib(1));
    }

    #[test]
    fn test_parse_decimal_units() {
        assert_eq!("2GB".parse::<ByteSize>().unwrap(), ByteSize(2_000_000_000));
        assert_eq!("1.5KiB".parse::<ByteSize>().unwrap(), ByteSize(1536));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("GiB".parse::<ByteSize>().is_err());
        assert!("12 parsecs".parse::<ByteSize>().is_err());
        assert!("1.2.3GiB".parse::<ByteSize>().is_err());
        assert!("99999999999TiB".parse::<ByteSize>().is_err());
    }

    #[test]
    fn test_display_uses_largest_exact_unit() {
        assert_eq!(ByteSize::gib(32).to_string(), "32GiB");
        assert_eq!(ByteSize::mib(1536).to_string(), "1536MiB");
        assert_eq!(ByteSize(1536).to_string(), "1536B");
        assert_eq!(ByteSize(1000).to_string(), "1000B");
        assert_eq!(ByteSize(0).to_string(), "0B");
    }

    #[test]
    fn test_display_reparses_to_same_value() {
        for size in [ByteSize(0), ByteSize(3), ByteSize::kib(5), ByteSize(1536), ByteSize::gib(64)] {
            assert_eq!(size.to_string().parse::<ByteSize>().unwrap(), size);
        }
    }

    #[test]
    fn test_durations() {
        assert_eq!(parse_duration("3600s").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(
            parse_duration(&format_duration(Duration::from_secs(90))).unwrap(),
            Duration::from_secs(90)
        );
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert!(parse_duration("forever").is_err());
    }
}
