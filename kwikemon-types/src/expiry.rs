//! Expiry policy for monitors.

use std::fmt;
use std::time::Duration;

/// Default time to live for monitors that never asked for one: one day.
pub const DEFAULT_TTL_SECS: i64 = 86_400;

/// Value used on the wire (and by Redis `TTL`) for "never expires".
pub const NEVER_EXPIRES: i64 = -1;

/// How long a monitor survives without being written.
///
/// Positive second counts expire the monitor; zero and negative counts mean
/// the monitor is kept until it is removed. A TTL of zero is never treated
/// as "expire immediately".
///
/// # Example
///
/// ```rust
/// use kwikemon_types::Expiry;
///
/// assert_eq!(Expiry::from_seconds(60), Expiry::After(60));
/// assert_eq!(Expiry::from_seconds(0), Expiry::Never);
/// assert_eq!(Expiry::from_seconds(-5), Expiry::Never);
/// assert_eq!(Expiry::Never.as_seconds(), -1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "i64", into = "i64")
)]
pub enum Expiry {
    /// Removed automatically this many seconds after the last write.
    After(u64),
    /// Kept until explicitly removed.
    Never,
}

impl Expiry {
    /// Interpret a signed second count, `<= 0` meaning never.
    pub fn from_seconds(seconds: i64) -> Self {
        if seconds > 0 {
            Expiry::After(seconds as u64)
        } else {
            Expiry::Never
        }
    }

    /// The signed representation: the second count, or `-1` for never.
    pub fn as_seconds(&self) -> i64 {
        match self {
            Expiry::After(secs) => i64::try_from(*secs).unwrap_or(i64::MAX),
            Expiry::Never => NEVER_EXPIRES,
        }
    }

    /// The expiry as a duration, `None` when the monitor never expires.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Expiry::After(secs) => Some(Duration::from_secs(*secs)),
            Expiry::Never => None,
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Expiry::Never)
    }
}

impl Default for Expiry {
    fn default() -> Self {
        Expiry::from_seconds(DEFAULT_TTL_SECS)
    }
}

impl From<i64> for Expiry {
    fn from(seconds: i64) -> Self {
        Expiry::from_seconds(seconds)
    }
}

impl From<Expiry> for i64 {
    fn from(expiry: Expiry) -> Self {
        expiry.as_seconds()
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiry::After(secs) => write!(f, "{}s", secs),
            Expiry::Never => write!(f, "never"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_and_negative_never_expire() {
        assert_eq!(Expiry::from_seconds(0), Expiry::Never);
        assert_eq!(Expiry::from_seconds(-1), Expiry::Never);
        assert_eq!(Expiry::from_seconds(i64::MIN), Expiry::Never);
    }

    #[test]
    fn test_default_is_one_day() {
        assert_eq!(Expiry::default(), Expiry::After(86_400));
        assert_eq!(
            Expiry::default().as_duration(),
            Some(Duration::from_secs(86_400))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Expiry::After(30).to_string(), "30s");
        assert_eq!(Expiry::Never.to_string(), "never");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_as_integer() {
        assert_eq!(serde_json::to_string(&Expiry::After(10)).unwrap(), "10");
        assert_eq!(serde_json::to_string(&Expiry::Never).unwrap(), "-1");
        let parsed: Expiry = serde_json::from_str("0").unwrap();
        assert_eq!(parsed, Expiry::Never);
    }
}
