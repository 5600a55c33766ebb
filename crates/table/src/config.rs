use crate::compare::Collation;
use std::time::Duration;

/// Table [`Options`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub struct Options {
    /// How long a session waits for a table lock before giving up
    /// with [`crate::TableError::LockTimeout`].
    ///
    /// Default: 1s
    #[cfg_attr(feature = "serde", serde(with = "humantime_duration"))]
    #[cfg_attr(feature = "serde", serde(default = "Options::default_lock_timeout"))]
    pub lock_timeout: Duration,
    /// Whether the database runs under multi-version concurrency control.
    ///
    /// In that mode, non-forced locks are relaxed:
    /// shared lock requests are granted without locking,
    /// and exclusive requests only take a shared lock.
    ///
    /// Default: false
    #[cfg_attr(feature = "serde", serde(default))]
    pub multi_version: bool,
    /// The collation new tables compare text with.
    ///
    /// Default: [`Collation::Binary`]
    #[cfg_attr(feature = "serde", serde(default))]
    pub collation: Collation,
}

impl Default for Options {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Options {
    const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

    const DEFAULT: Self = Self {
        lock_timeout: Self::DEFAULT_LOCK_TIMEOUT,
        multi_version: false,
        collation: Collation::Binary,
    };

    #[cfg(feature = "serde")]
    const fn default_lock_timeout() -> Duration {
        Self::DEFAULT_LOCK_TIMEOUT
    }

    /// Parses options from a TOML fragment.
    /// Missing keys take their default.
    #[cfg(feature = "serde")]
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

#[cfg(feature = "serde")]
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(&humantime::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(de)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn options_toml_roundtrip() {
        let options = Options::default();
        let toml = toml::to_string(&options).unwrap();
        assert_eq!(options, Options::from_toml_str(&toml).unwrap());
    }

    #[test]
    fn options_from_partial_toml() {
        let toml = r#"
            lock-timeout = "2s 500ms"
            collation = "ignore-case"
"#;
        let expected = Options {
            lock_timeout: Duration::from_millis(2500),
            collation: Collation::IgnoreCase,
            ..<_>::default()
        };
        assert_eq!(expected, Options::from_toml_str(toml).unwrap());
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(Options::default(), Options::from_toml_str("").unwrap());
    }
}
