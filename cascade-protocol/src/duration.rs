//! Duration literals and the stable `DurationMs` wire type.
//!
//! Carried over from `layer0::duration` verbatim (transparent `u64`
//! milliseconds, stable JSON serialization) with one addition: parsing
//! the `<integer><unit>` literal grammar (§3), since the donor
//! crate never needed to parse durations from user-facing strings.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Duration in milliseconds with a stable JSON serialization format.
///
/// Serializes as a plain `u64` integer, not serde's internal
/// `{"secs": N, "nanos": N}` shape — this is the wire format every
/// duration field in the cascade protocol uses (`tierTimeouts`,
/// `totalTimeout`, `durationMs`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationMs(u64);

impl DurationMs {
    /// Zero duration.
    pub const ZERO: Self = Self(0);

    /// Create from milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Create from seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Get the value in milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Convert to `std::time::Duration`.
    pub fn to_std(&self) -> Duration {
        Duration::from_millis(self.0)
    }

    /// Saturating subtraction; never goes negative.
    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// True when this duration would leave nothing to work with — used
    /// at cascade escalation boundaries (spec §4.G step 3b, "if
    /// non-positive, record `skipped`").
    pub fn is_non_positive(&self) -> bool {
        self.0 == 0
    }

    /// Parse a duration literal: either a bare integer (milliseconds)
    /// or `<integer><unit>` where unit is one of `ms`, `s`, `m`, `h`,
    /// `d` or their long forms (`ms`, `sec`/`secs`/`second`/`seconds`,
    /// `min`/`mins`/`minute`/`minutes`, `hr`/`hrs`/`hour`/`hours`,
    /// `day`/`days`). Always normalized to milliseconds.
    pub fn parse(literal: &str) -> Result<Self, ProtocolError> {
        let literal = literal.trim();
        if literal.is_empty() {
            return Err(ProtocolError::InvalidDuration(
                "empty duration literal".into(),
            ));
        }
        let split_at = literal
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(literal.len());
        let (num, unit) = literal.split_at(split_at);
        let num: u64 = num.parse().map_err(|_| {
            ProtocolError::InvalidDuration(format!("not an integer: {literal:?}"))
        })?;
        let multiplier = match unit.trim() {
            "" | "ms" => 1,
            "s" | "sec" | "secs" | "second" | "seconds" => 1_000,
            "m" | "min" | "mins" | "minute" | "minutes" => 60_000,
            "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000,
            "d" | "day" | "days" => 86_400_000,
            other => {
                return Err(ProtocolError::InvalidDuration(format!(
                    "unknown unit {other:?}"
                )));
            }
        };
        Ok(Self(num.saturating_mul(multiplier)))
    }
}

impl From<Duration> for DurationMs {
    fn from(d: Duration) -> Self {
        Self(d.as_millis() as u64)
    }
}

impl From<DurationMs> for Duration {
    fn from(d: DurationMs) -> Self {
        Duration::from_millis(d.0)
    }
}

impl Default for DurationMs {
    fn default() -> Self {
        Self::ZERO
    }
}

impl std::fmt::Display for DurationMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_integer_is_milliseconds() {
        assert_eq!(DurationMs::parse("1500").unwrap().as_millis(), 1500);
    }

    #[test]
    fn short_units() {
        assert_eq!(DurationMs::parse("30s").unwrap().as_millis(), 30_000);
        assert_eq!(DurationMs::parse("5m").unwrap().as_millis(), 300_000);
        assert_eq!(DurationMs::parse("2h").unwrap().as_millis(), 7_200_000);
        assert_eq!(DurationMs::parse("1d").unwrap().as_millis(), 86_400_000);
        assert_eq!(DurationMs::parse("10ms").unwrap().as_millis(), 10);
    }

    #[test]
    fn long_units() {
        assert_eq!(DurationMs::parse("2hours").unwrap().as_millis(), 7_200_000);
        assert_eq!(DurationMs::parse("3minutes").unwrap().as_millis(), 180_000);
        assert_eq!(DurationMs::parse("1day").unwrap().as_millis(), 86_400_000);
    }

    #[test]
    fn unknown_unit_is_invalid_duration() {
        let err = DurationMs::parse("5weeks").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidDuration(_)));
    }

    #[test]
    fn non_integer_magnitude_is_invalid() {
        assert!(DurationMs::parse("abc").is_err());
        assert!(DurationMs::parse("").is_err());
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&DurationMs::from_millis(1500)).unwrap();
        assert_eq!(json, "1500");
    }

    #[test]
    fn non_positive_budget_detection() {
        assert!(DurationMs::ZERO.is_non_positive());
        assert!(!DurationMs::from_millis(1).is_non_positive());
    }
}
